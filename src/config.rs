//! Channel configuration.
//!
//! [`ChannelConfig`] carries the framing, encoding, and timeout settings
//! for one device connection, usually deserialized from the instruments
//! section of a TOML file. Values are validated when the configuration is
//! applied by [`MessageChannel::with_config`](crate::MessageChannel::with_config),
//! not during deserialization, so a bad codec name fails channel
//! construction with a proper error.

use crate::channel::{CR, DEFAULT_MAX_READ_SIZE, LF};
use serde::Deserialize;
use std::time::Duration;

/// Settings for one message channel.
///
/// Termination sequences set to the empty string normalize to "no
/// termination" when applied; TOML has no way to spell an explicit absence
/// for a defaulted field.
///
/// ```
/// use instr_comm::ChannelConfig;
///
/// let config: ChannelConfig = toml::from_str(
///     r#"
///     write_termination = "\r"
///     timeout = "500ms"
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.write_termination.as_deref(), Some("\r"));
/// assert_eq!(config.timeout, Some(std::time::Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Sequence that ends an incoming message.
    pub read_termination: Option<String>,
    /// Sequence appended to every outgoing message.
    pub write_termination: Option<String>,
    /// WHATWG codec label for the text conversion.
    pub encoding: String,
    /// Upper bound on bytes consumed by a single read.
    pub max_read_size: usize,
    /// I/O timeout; absent means wait forever.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_termination: Some(LF.to_string()),
            write_termination: Some(format!("{CR}{LF}")),
            encoding: "utf-8".to_string(),
            max_read_size: DEFAULT_MAX_READ_SIZE,
            timeout: None,
        }
    }
}
