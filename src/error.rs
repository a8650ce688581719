//! Custom error types for the crate.
//!
//! This module defines the primary error type, `CommError`, for the whole
//! communication layer. Using the `thiserror` crate, it provides a
//! centralized and consistent way to classify the failures a channel can
//! surface, from configuration validation to transport I/O.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidArgument`**: a configuration setter received an
//!   out-of-contract value (a zero read limit, a negative timeout). These
//!   are always synchronous and reject the mutation before any state
//!   changes.
//! - **`Encoding`**: a codec name failed the round-trip self-test, or
//!   message data could not be represented or decoded in the active
//!   encoding. Kept separate from `InvalidArgument` because detecting it
//!   requires an active encode/decode probe rather than a range check.
//! - **`Timeout`**: an I/O operation did not complete within the configured
//!   timeout. Carries the timeout value, the device identity, and the
//!   operation name for diagnostics. Never retried internally.
//! - **`ResponseTooLong`**: the read limit was exhausted without observing
//!   the configured termination sequence. Returning the truncated buffer
//!   silently would hand the caller a message that only looks complete.
//! - **`Transport`**: propagated verbatim from the transport delegate via
//!   `#[from]`; this layer does not reinterpret it.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type CommResult<T> = std::result::Result<T, CommError>;

/// Errors surfaced by a [`MessageChannel`](crate::MessageChannel) and its
/// collaborators.
#[derive(Error, Debug)]
pub enum CommError {
    /// A configuration setter received an out-of-contract value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A codec failed validation, or data was not representable in the
    /// active encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// An I/O operation did not complete within the configured timeout.
    #[error("{device}: timeout occurred after {timeout:?} during {operation}")]
    Timeout {
        /// Human-readable identity of the device the channel talks to.
        device: String,
        /// The timeout that elapsed.
        timeout: Duration,
        /// The operation that timed out ("read" or "write").
        operation: &'static str,
    },

    /// The read limit was reached without a termination match.
    #[error("{device}: response exceeded {limit} bytes without the termination sequence")]
    ResponseTooLong {
        /// Human-readable identity of the device the channel talks to.
        device: String,
        /// The byte limit that was exhausted.
        limit: usize,
    },

    /// An error reported by the underlying transport, passed through
    /// unchanged.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_carries_device_and_value() {
        let err = CommError::Timeout {
            device: "ESP300@/dev/ttyUSB0".to_string(),
            timeout: Duration::from_millis(250),
            operation: "read",
        };
        let msg = err.to_string();
        assert!(msg.contains("ESP300@/dev/ttyUSB0"));
        assert!(msg.contains("250ms"));
        assert!(msg.contains("read"));
    }

    #[test]
    fn transport_errors_convert_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device unplugged");
        let err: CommError = io.into();
        match err {
            CommError::Transport(inner) => {
                assert_eq!(inner.kind(), std::io::ErrorKind::BrokenPipe);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn response_too_long_display_names_limit() {
        let err = CommError::ResponseTooLong {
            device: "mock".to_string(),
            limit: 64,
        };
        assert!(err.to_string().contains("64 bytes"));
    }
}
