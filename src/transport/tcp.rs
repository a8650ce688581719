//! TCP socket transport for LAN-attached instruments.

use super::Transport;
use crate::error::CommResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Largest single receive buffer. Reads larger than this are served in
/// multiple chunks.
const RECV_BUF: usize = 8192;

/// Transport over a TCP connection.
///
/// # Example
///
/// ```no_run
/// use instr_comm::{MessageChannel, TcpTransport};
///
/// # async fn example() -> anyhow::Result<()> {
/// let transport = TcpTransport::connect("192.168.1.50:5025").await?;
/// let mut channel = MessageChannel::new("PM100@lan", Box::new(transport));
/// let id = channel.query("*IDN?").await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    stream: TcpStream,
    peer: String,
}

impl TcpTransport {
    /// Connect to `addr` (e.g. `"192.168.1.50:5025"`).
    ///
    /// # Errors
    /// Returns an error if resolution or connection fails.
    pub async fn connect(addr: &str) -> CommResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            peer: addr.to_string(),
        })
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.stream.write_all(bytes).await?;
        Ok(bytes.len())
    }

    async fn receive(&mut self, max_len: usize) -> io::Result<Option<Bytes>> {
        let mut buf = vec![0u8; max_len.min(RECV_BUF)];
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }

    fn descriptor(&self) -> String {
        format!("tcp://{}", self.peer)
    }
}
