//! TCP transport
//!
//! One call per connection. Frames are length-prefixed `bincode` bodies as
//! defined by [`neighbor_core::protocol::wire`].

pub mod client;
pub mod server;

pub use client::TcpNeighborsClient;
pub use server::{NeighborServer, ServerStats, ServerStatsSnapshot};

use neighbor_core::protocol::FRAME_HEADER_SIZE;
use neighbor_core::{TransportError, WireFormat};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ----------------------------------------------------------------------------
// Frame I/O
// ----------------------------------------------------------------------------

pub(crate) async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = WireFormat::encode(frame)?;
    writer.write_all(&bytes).await?;
    Ok(())
}

/// Read one frame; `None` when the peer closed before a new frame started
///
/// A close part way through the header is an error, not a clean end.
pub(crate) async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, TransportError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    if reader.read(&mut header[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..]).await?;

    let len = WireFormat::body_len(header)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(WireFormat::decode_body(&body)?))
}
