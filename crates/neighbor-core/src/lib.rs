//! Dummy Neighbor Core
//!
//! This crate provides the foundational pieces of the dummy neighbor, a
//! scriptable test peer for the neighbors protocol: protocol messages and
//! their wire framing, endpoint/sequence types, the decision policies that
//! scenarios are built from, configuration, and the error taxonomy. It has
//! no sockets; the runtime crate supplies those.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod policy;
pub mod protocol;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::NeighborConfig;
pub use errors::{ConfigError, NeighborError, NeighborResult, TransportError, WireError};
pub use policy::{
    Always, BoundedCounter, CounterDecision, EveryNth, Never, Policy, SequenceDecision,
    SequenceDedup,
};
pub use protocol::{
    ClientFrame, GreetReply, GreetRequest, HeartbeatReply, HeartbeatRequest, Method,
    NarrateReply, NarrateRequest, Reply, Request, Response, ServerFrame, TellReply, TellRequest,
    WireFormat,
};
pub use transport::{NeighborsClient, ReplyHandler};
pub use types::{Endpoint, SequenceNumber, Timestamp};
