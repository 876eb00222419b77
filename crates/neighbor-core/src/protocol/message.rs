//! Protocol messages
//!
//! The four request/reply pairs spoken between two neighbors:
//! discovery (`Heartbeat`, `Greet`) and chat (`Tell`, client-streaming
//! `Narrate`). Messages are plain values carried by a single call.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::types::{SequenceNumber, Timestamp};

// ----------------------------------------------------------------------------
// Method
// ----------------------------------------------------------------------------

/// One of the four protocol methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    Heartbeat,
    Greet,
    Tell,
    Narrate,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::Heartbeat,
        Method::Greet,
        Method::Tell,
        Method::Narrate,
    ];

    /// Whether the method carries sequence numbers
    pub fn is_sequenced(&self) -> bool {
        matches!(self, Method::Tell | Method::Narrate)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Heartbeat => "Heartbeat",
            Method::Greet => "Greet",
            Method::Tell => "Tell",
            Method::Narrate => "Narrate",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Discovery Messages
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatReply {
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetRequest {
    pub nickname: String,
    pub identity: String,
    pub ip_address_and_port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetReply {
    pub nickname: String,
    pub identity: String,
    pub ip_address_and_port: String,
}

// ----------------------------------------------------------------------------
// Chat Messages
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TellRequest {
    pub identity: String,
    pub message: String,
    pub sequence: SequenceNumber,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TellReply {
    pub identity: String,
}

/// One item of a client-streamed Narrate call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrateRequest {
    pub identity: String,
    pub message: String,
    pub sequence: SequenceNumber,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrateReply {
    pub identity: String,
}

// ----------------------------------------------------------------------------
// Server-side Call Envelope
// ----------------------------------------------------------------------------

/// A complete inbound call as seen by a reply handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Heartbeat(HeartbeatRequest),
    Greet(GreetRequest),
    Tell(TellRequest),
    /// The whole client stream, in arrival order
    Narrate(Vec<NarrateRequest>),
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Request::Heartbeat(_) => Method::Heartbeat,
            Request::Greet(_) => Method::Greet,
            Request::Tell(_) => Method::Tell,
            Request::Narrate(_) => Method::Narrate,
        }
    }

    /// Sequence number used for duplicate detection
    ///
    /// Tell carries one; a Narrate stream is keyed by its first item. Discovery
    /// calls and empty streams have none.
    pub fn sequence(&self) -> Option<SequenceNumber> {
        match self {
            Request::Tell(tell) => Some(tell.sequence),
            Request::Narrate(items) => items.first().map(|item| item.sequence),
            Request::Heartbeat(_) | Request::Greet(_) => None,
        }
    }
}

/// A reply for one of the four methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Heartbeat(HeartbeatReply),
    Greet(GreetReply),
    Tell(TellReply),
    Narrate(NarrateReply),
}

impl Reply {
    pub fn method(&self) -> Method {
        match self {
            Reply::Heartbeat(_) => Method::Heartbeat,
            Reply::Greet(_) => Method::Greet,
            Reply::Tell(_) => Method::Tell,
            Reply::Narrate(_) => Method::Narrate,
        }
    }
}

/// What the server does with one inbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Answer with this reply
    Reply(Reply),
    /// Close the call without answering
    Withhold,
    /// No handler is registered for the method
    Unimplemented(Method),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tell(sequence: u64) -> TellRequest {
        TellRequest {
            identity: "engine".to_string(),
            message: "hello".to_string(),
            sequence: SequenceNumber::new(sequence),
            timestamp: Timestamp::new(0),
        }
    }

    #[test]
    fn test_request_sequence_keys() {
        assert_eq!(
            Request::Tell(tell(7)).sequence(),
            Some(SequenceNumber::new(7))
        );

        let stream = vec![
            NarrateRequest {
                identity: "engine".to_string(),
                message: "a".to_string(),
                sequence: SequenceNumber::new(4),
                timestamp: Timestamp::new(0),
            },
            NarrateRequest {
                identity: "engine".to_string(),
                message: "b".to_string(),
                sequence: SequenceNumber::new(5),
                timestamp: Timestamp::new(0),
            },
        ];
        assert_eq!(
            Request::Narrate(stream).sequence(),
            Some(SequenceNumber::new(4))
        );
        assert_eq!(Request::Narrate(Vec::new()).sequence(), None);

        let heartbeat = Request::Heartbeat(HeartbeatRequest {
            identity: "engine".to_string(),
        });
        assert_eq!(heartbeat.sequence(), None);
        assert_eq!(heartbeat.method(), Method::Heartbeat);
    }

    #[test]
    fn test_sequenced_methods() {
        let sequenced: Vec<_> = Method::ALL.iter().filter(|m| m.is_sequenced()).collect();
        assert_eq!(sequenced, vec![&Method::Tell, &Method::Narrate]);
    }
}
