//! Named text encodings for the character-based channel API.
//!
//! Instrument protocols are text-oriented, but the transport moves bytes.
//! [`TextEncoding`] bridges the two using the WHATWG encoding registry
//! provided by `encoding_rs`. A codec is validated once, at construction,
//! by an encode-then-decode round trip of a fixed probe string, so an
//! invalid name fails immediately rather than on first use.
//!
//! The conversion is strict in both directions: characters that the codec
//! cannot represent, and byte sequences the codec cannot decode, are
//! reported as [`CommError::Encoding`] instead of being replaced silently.
//!
//! `encoding_rs` only encodes to ASCII-compatible encodings, so UTF-16
//! labels resolve but fail the round-trip self-test and are rejected.

use crate::error::{CommError, CommResult};
use encoding_rs::Encoding;

/// Fixed string used for the round-trip self-test. ASCII only, so it is
/// representable in every encoding the registry can encode to.
const PROBE: &str = "encoding self-test 0123456789";

/// A validated, named text encoding.
///
/// Cheap to copy; holds a reference into the static registry.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding {
    inner: &'static Encoding,
}

impl TextEncoding {
    /// Resolve a codec by WHATWG label (e.g. `"utf-8"`, `"latin1"`,
    /// `"shift_jis"`) and validate it with a round-trip self-test.
    ///
    /// # Errors
    /// Returns [`CommError::Encoding`] if the label is unknown or the codec
    /// cannot reproduce the probe string byte-for-byte.
    pub fn new(label: &str) -> CommResult<Self> {
        let inner = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| CommError::Encoding(format!("unknown encoding label '{label}'")))?;
        let candidate = Self { inner };
        let encoded = candidate.encode(PROBE)?;
        let decoded = candidate.decode(&encoded)?;
        if decoded != PROBE {
            return Err(CommError::Encoding(format!(
                "encoding '{label}' failed the round-trip self-test"
            )));
        }
        Ok(candidate)
    }

    /// The canonical name of the resolved encoding.
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Encode text to bytes.
    ///
    /// # Errors
    /// Returns [`CommError::Encoding`] if any character is not representable
    /// in this encoding.
    pub fn encode(&self, text: &str) -> CommResult<Vec<u8>> {
        let (bytes, used, had_errors) = self.inner.encode(text);
        // `encode` substitutes a different output encoding for codecs it
        // cannot encode to (UTF-16 family).
        if had_errors || used != self.inner {
            return Err(CommError::Encoding(format!(
                "text is not representable in {}",
                self.inner.name()
            )));
        }
        Ok(bytes.into_owned())
    }

    /// Decode bytes to text, without BOM sniffing.
    ///
    /// # Errors
    /// Returns [`CommError::Encoding`] on malformed byte sequences.
    pub fn decode(&self, bytes: &[u8]) -> CommResult<String> {
        let (text, had_errors) = self.inner.decode_without_bom_handling(bytes);
        if had_errors {
            return Err(CommError::Encoding(format!(
                "received bytes are not valid {}",
                self.inner.name()
            )));
        }
        Ok(text.into_owned())
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self {
            inner: encoding_rs::UTF_8,
        }
    }
}

impl std::fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
