//! Canned identity of the dummy neighbor
//!
//! Every request the neighbor sends and every reply it gives is built here
//! from the configured identity, nickname and advertised address.

use neighbor_core::{
    Endpoint, GreetReply, GreetRequest, HeartbeatReply, HeartbeatRequest, Method, NarrateReply,
    NarrateRequest, NeighborConfig, Reply, SequenceNumber, TellReply, TellRequest, Timestamp,
};

/// Who the neighbor claims to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerProfile {
    pub identity: String,
    pub nickname: String,
    /// Address advertised in Greet messages
    pub address: Endpoint,
    /// Items per Narrate stream
    pub narrate_messages: u32,
}

impl PeerProfile {
    pub fn from_config(config: &NeighborConfig, address: Endpoint) -> Self {
        Self {
            identity: config.identity.clone(),
            nickname: config.nickname.clone(),
            address,
            narrate_messages: config.narrate_messages,
        }
    }

    // ------------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------------

    /// The acknowledgement sent for a call of `method`
    pub fn reply_for(&self, method: Method) -> Reply {
        match method {
            Method::Heartbeat => Reply::Heartbeat(HeartbeatReply {
                identity: self.identity.clone(),
            }),
            Method::Greet => Reply::Greet(GreetReply {
                nickname: self.nickname.clone(),
                identity: self.identity.clone(),
                ip_address_and_port: self.address.to_string(),
            }),
            Method::Tell => Reply::Tell(TellReply {
                identity: self.identity.clone(),
            }),
            Method::Narrate => Reply::Narrate(NarrateReply {
                identity: self.identity.clone(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    pub fn heartbeat_request(&self) -> HeartbeatRequest {
        HeartbeatRequest {
            identity: self.identity.clone(),
        }
    }

    pub fn greet_request(&self) -> GreetRequest {
        GreetRequest {
            nickname: self.nickname.clone(),
            identity: self.identity.clone(),
            ip_address_and_port: self.address.to_string(),
        }
    }

    pub fn tell_request(&self, sequence: SequenceNumber) -> TellRequest {
        TellRequest {
            identity: self.identity.clone(),
            message: format!("tell {} from {}", sequence.value(), self.nickname),
            sequence,
            timestamp: Timestamp::now(),
        }
    }

    /// One Narrate stream; item `i` carries sequence number `first + i`
    pub fn narrate_stream(&self, first: SequenceNumber) -> Vec<NarrateRequest> {
        let mut sequence = first;
        let mut stream = Vec::with_capacity(self.narrate_messages as usize);
        for line in 1..=self.narrate_messages {
            stream.push(NarrateRequest {
                identity: self.identity.clone(),
                message: format!("narrate line {} of {}", line, self.narrate_messages),
                sequence,
                timestamp: Timestamp::now(),
            });
            sequence = sequence.next();
        }
        stream
    }
}
