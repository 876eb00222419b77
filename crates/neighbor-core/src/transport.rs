//! Transport seam for neighbor calls
//!
//! The scenario engine only ever sees these two traits: the client side
//! issues one call at a time and gets a reply or a [`TransportError`]; the
//! server side hands each complete inbound call to a [`ReplyHandler`].
//! Framing and sockets live behind them.

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::protocol::{
    GreetReply, GreetRequest, HeartbeatReply, HeartbeatRequest, Method, NarrateReply,
    NarrateRequest, Request, Response, TellReply, TellRequest,
};

// ----------------------------------------------------------------------------
// Client Side
// ----------------------------------------------------------------------------

/// Outbound calls to the remote peer
#[async_trait]
pub trait NeighborsClient: Send + Sync {
    async fn heartbeat(&self, request: HeartbeatRequest) -> Result<HeartbeatReply, TransportError>;

    async fn greet(&self, request: GreetRequest) -> Result<GreetReply, TransportError>;

    async fn tell(&self, request: TellRequest) -> Result<TellReply, TransportError>;

    /// Client-streaming call; `stream` is written in order, then closed
    async fn narrate(&self, stream: Vec<NarrateRequest>) -> Result<NarrateReply, TransportError>;
}

// ----------------------------------------------------------------------------
// Server Side
// ----------------------------------------------------------------------------

/// Server-side behavior of one protocol method
///
/// Handlers are invoked concurrently from many connections and must not
/// block.
pub trait ReplyHandler: Send + Sync {
    /// The method this handler answers
    fn method(&self) -> Method;

    /// Decide the response to one complete inbound call
    fn handle(&self, request: &Request) -> Response;
}
