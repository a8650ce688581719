//! Byte transports that a [`MessageChannel`](crate::MessageChannel)
//! delegates to.
//!
//! The channel never talks to hardware directly: it owns a boxed
//! [`Transport`] and pushes framing, encoding, and timeout policy on top of
//! it. Implementations exist for TCP sockets ([`TcpTransport`]), serial
//! ports ([`SerialTransport`], feature `serial`), and scripted tests
//! ([`MockTransport`]).

use async_trait::async_trait;
use bytes::Bytes;
use std::io;

pub mod mock;
pub use mock::MockTransport;

pub mod tcp;
pub use tcp::TcpTransport;

#[cfg(feature = "serial")]
pub mod serial;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

/// A byte-oriented communication endpoint (serial port, socket, GPIB
/// session).
///
/// Errors are plain `io::Error` so the channel can recognize
/// `ErrorKind::TimedOut` from transports that enforce their own deadlines;
/// everything else is passed through to the caller unchanged.
#[async_trait]
pub trait Transport: Send {
    /// Transmit `bytes`, returning the number of bytes written.
    async fn send(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Receive the next chunk of at most `max_len` bytes.
    ///
    /// A returned chunk always contains at least one byte. `Ok(None)`
    /// reports end of stream: the device stopped sending or the peer closed
    /// the connection. When no data is available yet the future stays
    /// pending; deadlines are the caller's concern.
    async fn receive(&mut self, max_len: usize) -> io::Result<Option<Bytes>>;

    /// Human-readable identity of this endpoint, for logs.
    fn descriptor(&self) -> String;
}
