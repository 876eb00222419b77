//! Test utilities for driving scenarios without sockets
//!
//! `RecordingClient` stands in for the remote peer's transport: every call is
//! recorded with its paused-clock timestamp and answered with a scripted
//! outcome.

#![allow(dead_code)]

use async_trait::async_trait;
use neighbor_core::{
    GreetReply, GreetRequest, HeartbeatReply, HeartbeatRequest, Method, NarrateReply,
    NarrateRequest, NeighborsClient, SequenceNumber, TellReply, TellRequest, TransportError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

/// One call as seen by the fake peer
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    /// Tell sequence number, or every item's sequence number for Narrate
    pub sequences: Vec<SequenceNumber>,
    pub at: Instant,
}

/// Scripted answer for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    Withhold,
    Unreachable,
    /// The call never resolves
    Hang,
}

// ----------------------------------------------------------------------------
// Recording Client
// ----------------------------------------------------------------------------

/// In-memory [`NeighborsClient`] that records every call
#[derive(Debug, Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<RecordedCall>>,
    scripted: Mutex<HashMap<Method, VecDeque<Outcome>>>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue outcomes for the next calls of `method`; unscripted calls are acked
    pub fn script(&self, method: Method, outcomes: &[Outcome]) {
        self.scripted
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .extend(outcomes.iter().copied());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, method: Method) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }

    async fn record(
        &self,
        method: Method,
        sequences: Vec<SequenceNumber>,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            sequences,
            at: Instant::now(),
        });

        let outcome = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&method)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Outcome::Ack);

        match outcome {
            Outcome::Ack => Ok(()),
            Outcome::Withhold => Err(TransportError::ReplyWithheld { method }),
            Outcome::Unreachable => Err(TransportError::ConnectionFailed {
                address: "peer".to_string(),
                reason: "connection refused".to_string(),
            }),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl NeighborsClient for RecordingClient {
    async fn heartbeat(
        &self,
        _request: HeartbeatRequest,
    ) -> Result<HeartbeatReply, TransportError> {
        self.record(Method::Heartbeat, Vec::new()).await?;
        Ok(HeartbeatReply {
            identity: "engine".to_string(),
        })
    }

    async fn greet(&self, request: GreetRequest) -> Result<GreetReply, TransportError> {
        self.record(Method::Greet, Vec::new()).await?;
        Ok(GreetReply {
            nickname: "engine".to_string(),
            identity: "engine".to_string(),
            ip_address_and_port: request.ip_address_and_port,
        })
    }

    async fn tell(&self, request: TellRequest) -> Result<TellReply, TransportError> {
        self.record(Method::Tell, vec![request.sequence]).await?;
        Ok(TellReply {
            identity: "engine".to_string(),
        })
    }

    async fn narrate(&self, stream: Vec<NarrateRequest>) -> Result<NarrateReply, TransportError> {
        let sequences = stream.iter().map(|item| item.sequence).collect();
        self.record(Method::Narrate, sequences).await?;
        Ok(NarrateReply {
            identity: "engine".to_string(),
        })
    }
}
