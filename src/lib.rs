//! # instr-comm
//!
//! Message-based communication layer for laboratory instruments: motion
//! controllers, lasers, power meters, and anything else that speaks a
//! termination-delimited text protocol over a byte stream.
//!
//! The crate provides one abstraction, [`MessageChannel`], which owns the
//! framing policy (termination sequences, text encoding, read-size guard,
//! timeout) and delegates physical I/O to an exchangeable [`Transport`]
//! (serial port, TCP socket, scripted mock). Instrument drivers are written
//! against the channel and stay ignorant of the wire underneath.
//!
//! ## Crate Structure
//!
//! - **`channel`**: the [`MessageChannel`] core with `write`/`read`/`query`
//!   and the validated configuration setters, plus the fluent
//!   [`MessageChannelBuilder`].
//! - **`transport`**: the [`Transport`] capability trait and its
//!   implementations: [`TcpTransport`], [`SerialTransport`] (feature
//!   `serial`, on by default), and [`MockTransport`] for tests.
//! - **`encoding`**: [`TextEncoding`], validated named codecs for the
//!   text/byte conversion.
//! - **`config`**: [`ChannelConfig`], the serde-deserializable per-device
//!   settings block.
//! - **`error`**: the [`CommError`] taxonomy and [`CommResult`] alias.
//!
//! ## Example
//!
//! ```
//! use instr_comm::{MessageChannel, MockTransport};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let mock = MockTransport::new();
//! mock.push_text("MODEL-42\n");
//!
//! let mut channel = MessageChannel::new("demo@mock", Box::new(mock.clone()));
//! channel.set_timeout(Some(Duration::from_secs(1)));
//!
//! let identity = channel.query("*IDN?").await.unwrap();
//! assert_eq!(identity, "MODEL-42");
//! assert_eq!(mock.sent_text(), vec!["*IDN?\r\n"]);
//! # })
//! ```

pub mod channel;
pub mod config;
pub mod encoding;
pub mod error;
pub mod transport;

pub use channel::{MessageChannel, MessageChannelBuilder, CR, DEFAULT_MAX_READ_SIZE, LF};
pub use config::ChannelConfig;
pub use encoding::TextEncoding;
pub use error::{CommError, CommResult};
#[cfg(feature = "serial")]
pub use transport::SerialTransport;
pub use transport::{MockTransport, TcpTransport, Transport};
