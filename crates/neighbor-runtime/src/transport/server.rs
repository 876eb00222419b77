//! Serving side of the TCP transport
//!
//! Accepts connections until the stop signal fires, reads one complete call
//! from each, dispatches it through the [`ServiceTable`] and writes the
//! response (or nothing, for a withheld reply). On stop the listener is
//! released first, then open connections are left to finish.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use neighbor_core::{
    ClientFrame, Endpoint, Method, NeighborError, NeighborResult, Request, Response, ServerFrame,
    TransportError,
};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::{read_frame, write_frame};
use crate::lifecycle::StopSignal;
use crate::service::ServiceTable;

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters updated by connection tasks
#[derive(Debug, Default)]
pub struct ServerStats {
    connections: AtomicU64,
    replied: AtomicU64,
    withheld: AtomicU64,
    unimplemented: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerStatsSnapshot {
    pub connections: u64,
    pub replied: u64,
    pub withheld: u64,
    pub unimplemented: u64,
    pub failed: u64,
}

impl ServerStats {
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            connections: self.connections.load(Ordering::Acquire),
            replied: self.replied.load(Ordering::Acquire),
            withheld: self.withheld.load(Ordering::Acquire),
            unimplemented: self.unimplemented.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

// ----------------------------------------------------------------------------
// Neighbor Server
// ----------------------------------------------------------------------------

/// A bound listener plus the handlers it serves
pub struct NeighborServer {
    listener: TcpListener,
    local_endpoint: Endpoint,
    table: Arc<ServiceTable>,
    stats: Arc<ServerStats>,
}

impl NeighborServer {
    /// Bind `endpoint`; port 0 picks a free port
    pub async fn bind(endpoint: &Endpoint, table: ServiceTable) -> NeighborResult<Self> {
        let listener = TcpListener::bind(endpoint.to_string())
            .await
            .map_err(|e| NeighborError::Bind {
                address: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        let local = listener.local_addr()?;
        let local_endpoint = endpoint.with_port(local.port());

        info!("Serving {:?} on {}", table.methods(), local_endpoint);

        Ok(Self {
            listener,
            local_endpoint,
            table: Arc::new(table),
            stats: Arc::new(ServerStats::default()),
        })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local_endpoint
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        self.stats.clone()
    }

    /// Accept and answer calls until `stop` fires, then drain open connections
    pub async fn serve(self, stop: StopSignal) {
        let NeighborServer {
            listener,
            local_endpoint,
            table,
            stats,
        } = self;
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = stop.wait() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        stats.connections.fetch_add(1, Ordering::AcqRel);
                        connections.spawn(serve_connection(
                            stream,
                            remote,
                            table.clone(),
                            stats.clone(),
                        ));
                    }
                    Err(e) => warn!("Accept on {} failed: {}", local_endpoint, e),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        error!("Connection task ended abnormally: {}", e);
                    }
                }
            }
        }

        drop(listener);
        info!(
            "Listener on {} released, draining {} connection(s)",
            local_endpoint,
            connections.len()
        );

        while let Some(finished) = connections.join_next().await {
            if let Err(e) = finished {
                error!("Connection task ended abnormally: {}", e);
            }
        }
        debug!("All connections on {} closed", local_endpoint);
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    remote: SocketAddr,
    table: Arc<ServiceTable>,
    stats: Arc<ServerStats>,
) {
    match answer_call(&mut stream, &table, &stats).await {
        Ok(Some(method)) => debug!("Finished {} call from {}", method, remote),
        Ok(None) => debug!("{} closed without a call", remote),
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::AcqRel);
            warn!("Call from {} failed: {}", remote, e);
        }
    }
    let _ = stream.shutdown().await;
}

async fn answer_call(
    stream: &mut TcpStream,
    table: &ServiceTable,
    stats: &ServerStats,
) -> Result<Option<Method>, TransportError> {
    let request = match read_request(stream).await? {
        Some(request) => request,
        None => return Ok(None),
    };
    let method = request.method();

    match table.dispatch(&request) {
        Response::Reply(reply) => {
            write_frame(stream, &ServerFrame::Reply(reply)).await?;
            stats.replied.fetch_add(1, Ordering::AcqRel);
        }
        Response::Unimplemented(method) => {
            write_frame(stream, &ServerFrame::Unimplemented(method)).await?;
            stats.unimplemented.fetch_add(1, Ordering::AcqRel);
        }
        Response::Withhold => {
            stats.withheld.fetch_add(1, Ordering::AcqRel);
        }
    }
    stream.flush().await?;
    Ok(Some(method))
}

/// Read one complete call, collecting a Narrate stream up to its end marker
async fn read_request(stream: &mut TcpStream) -> Result<Option<Request>, TransportError> {
    let first: ClientFrame = match read_frame(stream).await? {
        Some(frame) => frame,
        None => return Ok(None),
    };

    let request = match first {
        ClientFrame::Heartbeat(request) => Request::Heartbeat(request),
        ClientFrame::Greet(request) => Request::Greet(request),
        ClientFrame::Tell(request) => Request::Tell(request),
        ClientFrame::NarrateEnd => Request::Narrate(Vec::new()),
        ClientFrame::NarrateChunk(item) => {
            let mut items = vec![item];
            loop {
                match read_frame(stream).await? {
                    Some(ClientFrame::NarrateChunk(item)) => items.push(item),
                    Some(ClientFrame::NarrateEnd) => break,
                    Some(other) => {
                        return Err(TransportError::MalformedCall {
                            method: Method::Narrate,
                            reason: format!("{} frame inside the stream", other.method()),
                        })
                    }
                    None => {
                        return Err(TransportError::MalformedCall {
                            method: Method::Narrate,
                            reason: "stream closed before its end marker".to_string(),
                        })
                    }
                }
            }
            Request::Narrate(items)
        }
    };
    Ok(Some(request))
}
