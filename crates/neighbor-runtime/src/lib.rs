//! Dummy Neighbor Runtime
//!
//! This crate contains the scenario engine of the dummy neighbor:
//! - `PolicyReplyHandler`: answers one method according to a reply policy
//! - `RequestLoop`: calls one method on a periodic, bounded, single-shot or
//!   triggered cadence
//! - The scenario registry mapping "major.minor" identifiers to wiring
//! - `LifecycleController`: start, wait for the stop signal, drain, stop
//! - The TCP transport (server and client)
//!
//! `neighbor-core` provides the protocol types and policy primitives this
//! crate composes.

pub mod builder;
pub mod handlers;
pub mod lifecycle;
pub mod loops;
pub mod profile;
pub mod scenarios;
pub mod service;
pub mod transport;

pub use builder::RuntimeBuilder;
pub use handlers::{PolicyReplyHandler, ReceiveHook, ReplyPolicy, ReplyVariant};
pub use lifecycle::{LifecycleController, LifecycleState, RunReport, StopReason, StopSignal};
pub use loops::{LoopEnd, LoopReport, OnExhausted, RequestCadence, RequestLoop};
pub use profile::PeerProfile;
pub use scenarios::{catalog, lookup, Role, ScenarioId, ScenarioPlan};
pub use service::ServiceTable;
pub use transport::{NeighborServer, TcpNeighborsClient};

// Re-export core types for convenience
pub use neighbor_core::{
    ConfigError, Endpoint, Method, NeighborConfig, NeighborError, NeighborResult, NeighborsClient,
    TransportError,
};
