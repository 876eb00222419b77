//! Neighbor Protocol Module
//!
//! - `message`: the four request/reply pairs and the server-side call envelope
//! - `wire`: length-prefixed frame codec used by the TCP transport

pub mod message;
pub mod wire;

pub use message::{
    GreetReply, GreetRequest, HeartbeatReply, HeartbeatRequest, Method, NarrateReply,
    NarrateRequest, Reply, Request, Response, TellReply, TellRequest,
};
pub use wire::{ClientFrame, ServerFrame, WireFormat, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
