//! Calling side of the TCP transport

use async_trait::async_trait;
use neighbor_core::{
    ClientFrame, Endpoint, GreetReply, GreetRequest, HeartbeatReply, HeartbeatRequest, Method,
    NarrateReply, NarrateRequest, NeighborsClient, Reply, ServerFrame, TellReply, TellRequest,
    TransportError,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::trace;

use super::{read_frame, write_frame};

/// [`NeighborsClient`] opening one TCP connection per call
#[derive(Debug, Clone)]
pub struct TcpNeighborsClient {
    peer: Endpoint,
    call_timeout: Duration,
}

impl TcpNeighborsClient {
    pub fn new(peer: Endpoint, call_timeout: Duration) -> Self {
        Self { peer, call_timeout }
    }

    pub fn peer(&self) -> &Endpoint {
        &self.peer
    }

    /// Send `frames` and wait for the single reply, bounded by the call timeout
    async fn call(
        &self,
        method: Method,
        frames: Vec<ClientFrame>,
    ) -> Result<Reply, TransportError> {
        match timeout(self.call_timeout, self.exchange(method, frames)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                duration_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }

    async fn exchange(
        &self,
        method: Method,
        frames: Vec<ClientFrame>,
    ) -> Result<Reply, TransportError> {
        let mut stream = TcpStream::connect(self.peer.to_string())
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                address: self.peer.to_string(),
                reason: e.to_string(),
            })?;

        trace!("{} call to {}: {} frame(s)", method, self.peer, frames.len());
        for frame in &frames {
            write_frame(&mut stream, frame).await?;
        }
        stream.flush().await?;

        match read_frame::<_, ServerFrame>(&mut stream).await? {
            Some(ServerFrame::Reply(reply)) if reply.method() == method => Ok(reply),
            Some(ServerFrame::Reply(reply)) => Err(unexpected(method, reply.method())),
            Some(ServerFrame::Unimplemented(method)) => {
                Err(TransportError::Unimplemented { method })
            }
            None => Err(TransportError::ReplyWithheld { method }),
        }
    }
}

fn unexpected(expected: Method, actual: Method) -> TransportError {
    TransportError::UnexpectedReply {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

#[async_trait]
impl NeighborsClient for TcpNeighborsClient {
    async fn heartbeat(&self, request: HeartbeatRequest) -> Result<HeartbeatReply, TransportError> {
        match self
            .call(Method::Heartbeat, vec![ClientFrame::Heartbeat(request)])
            .await?
        {
            Reply::Heartbeat(reply) => Ok(reply),
            other => Err(unexpected(Method::Heartbeat, other.method())),
        }
    }

    async fn greet(&self, request: GreetRequest) -> Result<GreetReply, TransportError> {
        match self
            .call(Method::Greet, vec![ClientFrame::Greet(request)])
            .await?
        {
            Reply::Greet(reply) => Ok(reply),
            other => Err(unexpected(Method::Greet, other.method())),
        }
    }

    async fn tell(&self, request: TellRequest) -> Result<TellReply, TransportError> {
        match self
            .call(Method::Tell, vec![ClientFrame::Tell(request)])
            .await?
        {
            Reply::Tell(reply) => Ok(reply),
            other => Err(unexpected(Method::Tell, other.method())),
        }
    }

    async fn narrate(&self, stream: Vec<NarrateRequest>) -> Result<NarrateReply, TransportError> {
        let mut frames: Vec<ClientFrame> =
            stream.into_iter().map(ClientFrame::NarrateChunk).collect();
        frames.push(ClientFrame::NarrateEnd);

        match self.call(Method::Narrate, frames).await? {
            Reply::Narrate(reply) => Ok(reply),
            other => Err(unexpected(Method::Narrate, other.method())),
        }
    }
}
