//! Termination-delimited message channel over a byte transport.
//!
//! [`MessageChannel`] is the request/response surface that instrument
//! drivers build on: it owns the termination sequences, the text encoding,
//! the read-size guard, and the timeout policy, and delegates the physical
//! byte movement to a [`Transport`]. One channel per device connection;
//! every operation takes `&mut self`, so ordering on a single device is
//! guaranteed by the borrow checker rather than by convention.

use crate::config::ChannelConfig;
use crate::encoding::TextEncoding;
use crate::error::{CommError, CommResult};
use crate::transport::Transport;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tracing::{error, trace};

/// The carriage-return character.
pub const CR: &str = "\r";

/// The line-feed character.
pub const LF: &str = "\n";

/// Default upper bound on bytes consumed by a single read.
pub const DEFAULT_MAX_READ_SIZE: usize = 65536;

/// Why a read loop stopped accumulating.
enum ReadStop {
    /// The buffer tail matched the termination sequence (already stripped).
    Terminated,
    /// The transport reported end of stream.
    EndOfStream,
    /// The byte limit was reached without a termination match.
    LimitReached,
}

/// A text-oriented request/response channel to one device.
///
/// Defaults on construction: read termination LF, write termination CR LF,
/// UTF-8 encoding, 65536-byte read limit, no timeout.
///
/// # Example
///
/// ```
/// use instr_comm::{MessageChannel, MockTransport};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let mock = MockTransport::new();
/// mock.push_text("1.2345\n");
///
/// let mut channel = MessageChannel::new("1830-C@mock", Box::new(mock));
/// channel.set_timeout(Some(Duration::from_secs(1)));
///
/// let power: f64 = channel.query("PM:Power?").await.unwrap().parse().unwrap();
/// assert!((power - 1.2345).abs() < 1e-9);
/// # })
/// ```
pub struct MessageChannel {
    transport: Box<dyn Transport>,
    device: String,
    read_termination: Option<String>,
    write_termination: Option<String>,
    encoding: TextEncoding,
    max_read_size: usize,
    timeout: Option<Duration>,
}

impl MessageChannel {
    /// Create a channel with default framing over `transport`.
    ///
    /// `device` is the human-readable identity used in logs and errors,
    /// e.g. `"ESP300@/dev/ttyUSB0"`.
    pub fn new(device: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            device: device.into(),
            read_termination: Some(LF.to_string()),
            write_termination: Some(format!("{CR}{LF}")),
            encoding: TextEncoding::default(),
            max_read_size: DEFAULT_MAX_READ_SIZE,
            timeout: None,
        }
    }

    /// Create a channel and apply a deserialized configuration.
    ///
    /// # Errors
    /// Fails if the configured encoding or read limit is invalid; the
    /// transport is dropped in that case.
    pub fn with_config(
        device: impl Into<String>,
        transport: Box<dyn Transport>,
        config: &ChannelConfig,
    ) -> CommResult<Self> {
        let mut channel = Self::new(device, transport);
        channel.set_read_termination(config.read_termination.as_deref());
        channel.set_write_termination(config.write_termination.as_deref());
        channel.set_encoding(&config.encoding)?;
        channel.set_max_read_size(config.max_read_size)?;
        channel.set_timeout(config.timeout);
        Ok(channel)
    }

    /// The device identity this channel reports in logs and errors.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Identity of the underlying transport endpoint.
    pub fn transport_descriptor(&self) -> String {
        self.transport.descriptor()
    }

    /// The termination sequence that ends an incoming message, if any.
    pub fn read_termination(&self) -> Option<&str> {
        self.read_termination.as_deref()
    }

    /// Set the read termination. Empty sequences normalize to `None`: a
    /// zero-length terminator can never be observed at a buffer tail.
    pub fn set_read_termination(&mut self, termination: Option<&str>) {
        self.read_termination = termination
            .filter(|t| !t.is_empty())
            .map(str::to_string);
    }

    /// The termination sequence appended to outgoing messages, if any.
    pub fn write_termination(&self) -> Option<&str> {
        self.write_termination.as_deref()
    }

    /// Set the write termination. Empty sequences normalize to `None`.
    pub fn set_write_termination(&mut self, termination: Option<&str>) {
        self.write_termination = termination
            .filter(|t| !t.is_empty())
            .map(str::to_string);
    }

    /// The encoding used for [`read`](Self::read) and
    /// [`write`](Self::write) operations.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Set the encoding by WHATWG label, validated with a round-trip
    /// self-test.
    ///
    /// # Errors
    /// Returns [`CommError::Encoding`] and leaves the previous encoding in
    /// place if the label is unknown or fails the self-test.
    pub fn set_encoding(&mut self, label: &str) -> CommResult<()> {
        self.encoding = TextEncoding::new(label)?;
        Ok(())
    }

    /// The maximum number of bytes a single read may consume.
    pub fn max_read_size(&self) -> usize {
        self.max_read_size
    }

    /// Set the read limit. Does not affect a read already in progress.
    ///
    /// # Errors
    /// Returns [`CommError::InvalidArgument`] for a zero limit, leaving the
    /// previous limit unchanged.
    pub fn set_max_read_size(&mut self, size: usize) -> CommResult<()> {
        if size == 0 {
            return Err(CommError::InvalidArgument(
                "the maximum read size must be at least 1 byte".to_string(),
            ));
        }
        self.max_read_size = size;
        Ok(())
    }

    /// The timeout for I/O operations, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the I/O timeout. `Some(Duration::ZERO)` normalizes to `None`
    /// (wait forever). This only records policy; no timer starts here.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.filter(|t| !t.is_zero());
    }

    /// Set the I/O timeout from a float-seconds value, the shape timeout
    /// fields take in equipment records.
    ///
    /// `0.0` clears the timeout; negative or non-finite values are
    /// rejected, leaving the previous value unchanged.
    ///
    /// # Errors
    /// Returns [`CommError::InvalidArgument`] for negative or non-finite
    /// values.
    pub fn set_timeout_secs(&mut self, seconds: f64) -> CommResult<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(CommError::InvalidArgument(format!(
                "not a valid timeout value: {seconds}"
            )));
        }
        self.set_timeout(Some(Duration::from_secs_f64(seconds)));
        Ok(())
    }

    /// Write a message to the device.
    ///
    /// The write termination (if set) is appended, the result is encoded
    /// with the active encoding and transmitted. Returns the number of
    /// bytes transmitted.
    ///
    /// # Errors
    /// [`CommError::Encoding`] if the message is not representable,
    /// [`CommError::Timeout`] if the transmission does not complete within
    /// the configured timeout, [`CommError::Transport`] on I/O failure.
    pub async fn write(&mut self, message: &str) -> CommResult<usize> {
        let mut outgoing = String::with_capacity(message.len() + 2);
        outgoing.push_str(message);
        if let Some(term) = &self.write_termination {
            outgoing.push_str(term);
        }
        let bytes = self.encoding.encode(&outgoing)?;

        trace!("{}: sending '{}'", self.device, outgoing.escape_default());

        let sent = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.transport.send(&bytes)).await {
                Ok(result) => result,
                Err(_) => return Err(self.timeout_error("write")),
            },
            None => self.transport.send(&bytes).await,
        };

        match sent {
            Ok(count) => Ok(count),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                Err(self.timeout_error("write"))
            }
            Err(err) => Err(CommError::Transport(err)),
        }
    }

    /// Read a response from the device.
    ///
    /// Accumulates transport chunks until the buffer tail matches the read
    /// termination (stripped from the result), the transport reports end of
    /// stream, or `size` bytes (default: the channel's read limit) have
    /// been consumed. The whole accumulation runs under the configured
    /// timeout.
    ///
    /// # Errors
    /// [`CommError::Timeout`] when no complete response arrives in time,
    /// [`CommError::ResponseTooLong`] when the limit is reached while a
    /// termination is configured, [`CommError::InvalidArgument`] for an
    /// explicit size of 0, [`CommError::Encoding`] on undecodable bytes,
    /// [`CommError::Transport`] on I/O failure.
    pub async fn read(&mut self, size: Option<usize>) -> CommResult<String> {
        if size == Some(0) {
            return Err(CommError::InvalidArgument(
                "the number of bytes to read must be at least 1".to_string(),
            ));
        }
        let limit = size.unwrap_or(self.max_read_size);
        let termination = match &self.read_termination {
            Some(term) => Some(self.encoding.encode(term)?),
            None => None,
        };

        let outcome = match self.timeout {
            Some(deadline) => {
                let accumulation =
                    accumulate(self.transport.as_mut(), limit, termination.as_deref());
                match tokio::time::timeout(deadline, accumulation).await {
                    Ok(result) => result,
                    Err(_) => return Err(self.timeout_error("read")),
                }
            }
            None => accumulate(self.transport.as_mut(), limit, termination.as_deref()).await,
        };

        let (buffer, stop) = match outcome {
            Ok(accumulated) => accumulated,
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                return Err(self.timeout_error("read"))
            }
            Err(err) => return Err(CommError::Transport(err)),
        };

        if matches!(stop, ReadStop::LimitReached) && termination.is_some() {
            return Err(CommError::ResponseTooLong {
                device: self.device.clone(),
                limit,
            });
        }

        let text = self.encoding.decode(&buffer)?;
        trace!("{}: received '{}'", self.device, text.escape_default());
        Ok(text)
    }

    /// Write `message`, then read the response.
    ///
    /// # Errors
    /// Whatever [`write`](Self::write) or [`read`](Self::read) failed with;
    /// a write failure short-circuits and the read is not attempted.
    pub async fn query(&mut self, message: &str) -> CommResult<String> {
        self.query_with(message, None, None).await
    }

    /// [`query`](Self::query) with an inter-operation delay and a read-size
    /// override.
    ///
    /// The write fully completes before the delay starts; the delay fully
    /// elapses (suspending the task, not blocking a thread) before the read
    /// starts.
    ///
    /// # Errors
    /// Whatever [`write`](Self::write) or [`read`](Self::read) failed with.
    pub async fn query_with(
        &mut self,
        message: &str,
        delay: Option<Duration>,
        size: Option<usize>,
    ) -> CommResult<String> {
        self.write(message).await?;
        if let Some(delay) = delay.filter(|d| !d.is_zero()) {
            tokio::time::sleep(delay).await;
        }
        self.read(size).await
    }

    /// Log and build the timeout error for `operation`.
    fn timeout_error(&self, operation: &'static str) -> CommError {
        let timeout = self.timeout.unwrap_or(Duration::ZERO);
        error!(
            "{}: timeout occurred after {:?} during {}",
            self.device, timeout, operation
        );
        CommError::Timeout {
            device: self.device.clone(),
            timeout,
            operation,
        }
    }
}

impl std::fmt::Debug for MessageChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageChannel")
            .field("device", &self.device)
            .field("transport", &self.transport.descriptor())
            .field("read_termination", &self.read_termination)
            .field("write_termination", &self.write_termination)
            .field("encoding", &self.encoding)
            .field("max_read_size", &self.max_read_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Pull chunks from the transport until the termination matches at the
/// buffer tail, the stream ends, or `limit` bytes are consumed. A matched
/// termination is stripped before returning.
async fn accumulate(
    transport: &mut dyn Transport,
    limit: usize,
    termination: Option<&[u8]>,
) -> io::Result<(BytesMut, ReadStop)> {
    let mut buffer = BytesMut::with_capacity(limit.min(4096));
    loop {
        if let Some(term) = termination {
            // The tail check spans chunk boundaries by looking at the whole
            // accumulated buffer.
            if buffer.len() >= term.len() && buffer.ends_with(term) {
                buffer.truncate(buffer.len() - term.len());
                return Ok((buffer, ReadStop::Terminated));
            }
        }
        let remaining = limit - buffer.len();
        if remaining == 0 {
            return Ok((buffer, ReadStop::LimitReached));
        }
        match transport.receive(remaining).await? {
            Some(chunk) => buffer.extend_from_slice(&chunk),
            None => return Ok((buffer, ReadStop::EndOfStream)),
        }
    }
}

/// Fluent construction for channels, validating at `build`.
///
/// ```no_run
/// use instr_comm::{MessageChannelBuilder, SerialTransport};
/// use std::time::Duration;
///
/// # fn example() -> anyhow::Result<()> {
/// let transport = SerialTransport::open("/dev/ttyUSB0", 9600)?;
/// let channel = MessageChannelBuilder::new("MaiTai@/dev/ttyUSB0", Box::new(transport))
///     .with_write_termination(Some("\r"))
///     .with_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct MessageChannelBuilder {
    device: String,
    transport: Box<dyn Transport>,
    config: ChannelConfig,
}

impl MessageChannelBuilder {
    /// Start a builder with the channel defaults.
    pub fn new(device: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            device: device.into(),
            transport,
            config: ChannelConfig::default(),
        }
    }

    /// Set the read termination (default: LF).
    pub fn with_read_termination(mut self, termination: Option<&str>) -> Self {
        self.config.read_termination = termination.map(str::to_string);
        self
    }

    /// Set the write termination (default: CR LF).
    pub fn with_write_termination(mut self, termination: Option<&str>) -> Self {
        self.config.write_termination = termination.map(str::to_string);
        self
    }

    /// Set the encoding label (default: "utf-8"). Validated at `build`.
    pub fn with_encoding(mut self, label: &str) -> Self {
        self.config.encoding = label.to_string();
        self
    }

    /// Set the read limit (default: 65536). Validated at `build`.
    pub fn with_max_read_size(mut self, size: usize) -> Self {
        self.config.max_read_size = size;
        self
    }

    /// Set the I/O timeout (default: none).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Build the channel, validating the configured encoding and limits.
    ///
    /// # Errors
    /// Returns the first validation failure.
    pub fn build(self) -> CommResult<MessageChannel> {
        MessageChannel::with_config(self.device, self.transport, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn channel() -> MessageChannel {
        MessageChannel::new("test-device", Box::new(MockTransport::new()))
    }

    #[test]
    fn construction_defaults() {
        let channel = channel();
        assert_eq!(channel.read_termination(), Some("\n"));
        assert_eq!(channel.write_termination(), Some("\r\n"));
        assert_eq!(channel.encoding().name(), "UTF-8");
        assert_eq!(channel.max_read_size(), DEFAULT_MAX_READ_SIZE);
        assert_eq!(channel.timeout(), None);
        assert_eq!(channel.device(), "test-device");
    }

    #[test]
    fn empty_termination_normalizes_to_none() {
        let mut channel = channel();
        channel.set_read_termination(Some(""));
        assert_eq!(channel.read_termination(), None);
        channel.set_write_termination(Some(""));
        assert_eq!(channel.write_termination(), None);
    }

    #[test]
    fn invalid_encoding_keeps_previous() {
        let mut channel = channel();
        channel.set_encoding("latin1").unwrap();
        let err = channel.set_encoding("not-a-real-codec").unwrap_err();
        assert!(matches!(err, CommError::Encoding(_)));
        assert_eq!(channel.encoding().name(), "windows-1252");
    }

    #[test]
    fn zero_read_size_keeps_previous() {
        let mut channel = channel();
        channel.set_max_read_size(512).unwrap();
        let err = channel.set_max_read_size(0).unwrap_err();
        assert!(matches!(err, CommError::InvalidArgument(_)));
        assert_eq!(channel.max_read_size(), 512);
    }

    #[test]
    fn timeout_normalization() {
        let mut channel = channel();

        channel.set_timeout_secs(0.25).unwrap();
        assert_eq!(channel.timeout(), Some(Duration::from_millis(250)));

        channel.set_timeout_secs(0.0).unwrap();
        assert_eq!(channel.timeout(), None);

        channel.set_timeout(Some(Duration::ZERO));
        assert_eq!(channel.timeout(), None);

        channel.set_timeout_secs(1.0).unwrap();
        assert!(channel.set_timeout_secs(-0.5).is_err());
        assert!(channel.set_timeout_secs(f64::NAN).is_err());
        assert_eq!(channel.timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn debug_shows_settings_without_transport_internals() {
        let rendered = format!("{:?}", channel());
        assert!(rendered.contains("test-device"));
        assert!(rendered.contains("mock"));
    }
}
