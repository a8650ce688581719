//! Serial port transport for RS-232/USB-serial instruments.

use super::Transport;
use crate::error::CommResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

pub use tokio_serial::FlowControl;

/// Largest single receive buffer. Serial replies are short; larger reads
/// are served in multiple chunks.
const RECV_BUF: usize = 1024;

/// Transport over a serial port.
///
/// Ports are opened 8N1, which covers the common instrument protocols
/// (ESP300, MaiTai, Elliptec). Use [`SerialTransport::open_with_flow_control`]
/// for devices that need XON/XOFF or RTS/CTS.
///
/// # Example
///
/// ```no_run
/// use instr_comm::{MessageChannel, SerialTransport};
///
/// # async fn example() -> anyhow::Result<()> {
/// let transport = SerialTransport::open("/dev/ttyUSB0", 19200)?;
/// let mut channel = MessageChannel::new("ESP300@/dev/ttyUSB0", Box::new(transport));
/// channel.write("1PA5.0").await?;
/// # Ok(())
/// # }
/// ```
pub struct SerialTransport {
    port: SerialStream,
    path: String,
}

impl SerialTransport {
    /// Open `path` at `baud`, 8 data bits, no parity, one stop bit, no flow
    /// control.
    ///
    /// # Errors
    /// Returns an error if the port cannot be opened.
    pub fn open(path: &str, baud: u32) -> CommResult<Self> {
        Self::open_with_flow_control(path, baud, FlowControl::None)
    }

    /// Open with explicit flow control (e.g. `FlowControl::Software` for
    /// XON/XOFF devices).
    ///
    /// # Errors
    /// Returns an error if the port cannot be opened.
    pub fn open_with_flow_control(path: &str, baud: u32, flow: FlowControl) -> CommResult<Self> {
        let port = tokio_serial::new(path, baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(flow)
            .open_native_async()
            .map_err(io::Error::from)?;

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.port.write_all(bytes).await?;
        self.port.flush().await?;
        Ok(bytes.len())
    }

    async fn receive(&mut self, max_len: usize) -> io::Result<Option<Bytes>> {
        let mut buf = vec![0u8; max_len.min(RECV_BUF)];
        let n = self.port.read(&mut buf).await?;
        if n == 0 {
            // Serial lines have no close handshake; a 0-byte read means the
            // device deasserted ready.
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }

    fn descriptor(&self) -> String {
        format!("serial://{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_fails_on_missing_port() {
        assert!(SerialTransport::open("/definitely/not/a/port", 9600).is_err());
    }
}
