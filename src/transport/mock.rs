//! Mock transport for testing channels without hardware.
//!
//! The mock plays back a scripted sequence of replies and records
//! everything the channel transmits. It provides:
//! - Scripted response chunks, an end-of-stream marker, and a "silence"
//!   marker that never resolves (for timeout tests)
//! - Simulated receive latency
//! - Controllable one-shot failure injection
//! - A transmit log for test verification
//!
//! The state lives behind an `Arc`, so tests keep a cloned handle while the
//! channel owns its own clone.

use super::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Reply {
    Chunk(Vec<u8>),
    End,
    Silence,
}

#[derive(Default)]
struct Inner {
    replies: VecDeque<Reply>,
    sent: Vec<Vec<u8>>,
    latency: Duration,
    fail_next_send: bool,
    fail_next_receive: bool,
}

/// Scripted in-memory transport.
///
/// # Example
///
/// ```
/// use instr_comm::{MessageChannel, MockTransport};
///
/// # tokio_test::block_on(async {
/// let mock = MockTransport::new();
/// mock.push_text("MODEL-42\n");
///
/// let mut channel = MessageChannel::new("demo", Box::new(mock.clone()));
/// assert_eq!(channel.query("*IDN?").await.unwrap(), "MODEL-42");
/// assert_eq!(mock.sent_text(), vec!["*IDN?\r\n"]);
/// # })
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    /// Create an empty mock. With no scripted replies it behaves like a
    /// device that never answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set simulated latency applied before each receive.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.lock().unwrap().latency = latency;
        self
    }

    /// Queue a chunk of reply bytes. Chunks must be non-empty.
    pub fn push_chunk(&self, chunk: impl Into<Vec<u8>>) {
        let chunk = chunk.into();
        debug_assert!(!chunk.is_empty(), "scripted chunks must be non-empty");
        self.inner.lock().unwrap().replies.push_back(Reply::Chunk(chunk));
    }

    /// Queue a chunk of reply text.
    pub fn push_text(&self, text: &str) {
        self.push_chunk(text.as_bytes().to_vec());
    }

    /// Queue an end-of-stream marker: the device stops sending.
    pub fn push_end(&self) {
        self.inner.lock().unwrap().replies.push_back(Reply::End);
    }

    /// Queue a marker that blocks the next receive forever.
    pub fn push_silence(&self) {
        self.inner.lock().unwrap().replies.push_back(Reply::Silence);
    }

    /// Fail the next `send` with an injected transport error.
    pub fn fail_next_send(&self) {
        self.inner.lock().unwrap().fail_next_send = true;
    }

    /// Fail the next `receive` with an injected transport error.
    pub fn fail_next_receive(&self) {
        self.inner.lock().unwrap().fail_next_receive = true;
    }

    /// Everything transmitted so far, one entry per `send` call.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// The transmit log decoded as UTF-8 (lossy), for assertions on text
    /// protocols.
    pub fn sent_text(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    /// Clear the transmit log.
    pub fn clear_sent(&self) {
        self.inner.lock().unwrap().sent.clear();
    }

    /// Number of scripted replies not yet consumed.
    pub fn remaining_replies(&self) -> usize {
        self.inner.lock().unwrap().replies.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next_send {
            inner.fail_next_send = false;
            return Err(io::Error::other("injected send failure"));
        }
        inner.sent.push(bytes.to_vec());
        Ok(bytes.len())
    }

    async fn receive(&mut self, max_len: usize) -> io::Result<Option<Bytes>> {
        let (latency, reply) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_next_receive {
                inner.fail_next_receive = false;
                return Err(io::Error::other("injected receive failure"));
            }
            (inner.latency, inner.replies.pop_front())
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match reply {
            Some(Reply::Chunk(mut chunk)) => {
                if chunk.len() > max_len {
                    // Hand back what fits; requeue the remainder.
                    let rest = chunk.split_off(max_len);
                    self.inner
                        .lock()
                        .unwrap()
                        .replies
                        .push_front(Reply::Chunk(rest));
                }
                Ok(Some(Bytes::from(chunk)))
            }
            Some(Reply::End) => Ok(None),
            // Silence, or an exhausted script: a device that never answers.
            Some(Reply::Silence) | None => std::future::pending().await,
        }
    }

    fn descriptor(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_play_back_in_order() {
        let mock = MockTransport::new();
        mock.push_text("first");
        mock.push_text("second");
        mock.push_end();

        let mut transport = mock.clone();
        assert_eq!(
            transport.receive(64).await.unwrap().unwrap().as_ref(),
            b"first"
        );
        assert_eq!(
            transport.receive(64).await.unwrap().unwrap().as_ref(),
            b"second"
        );
        assert!(transport.receive(64).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_chunk_is_split_at_max_len() {
        let mock = MockTransport::new();
        mock.push_text("0123456789");

        let mut transport = mock.clone();
        assert_eq!(
            transport.receive(4).await.unwrap().unwrap().as_ref(),
            b"0123"
        );
        assert_eq!(
            transport.receive(64).await.unwrap().unwrap().as_ref(),
            b"456789"
        );
    }

    #[tokio::test]
    async fn send_records_and_failure_is_one_shot() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();

        mock.fail_next_send();
        assert!(transport.send(b"lost").await.is_err());
        assert!(mock.sent().is_empty(), "failed send must not be recorded");

        transport.send(b"kept").await.unwrap();
        assert_eq!(mock.sent_text(), vec!["kept"]);
    }

    #[tokio::test]
    async fn latency_delays_receive() {
        let mock = MockTransport::new().with_latency(Duration::from_millis(30));
        mock.push_text("slow");

        let mut transport = mock.clone();
        let start = std::time::Instant::now();
        transport.receive(64).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
