//! Message source abstraction.
//!
//! Every source yields raw JSON payload strings, one per message. Parsing
//! happens in the monitor so that a malformed record can be reported with
//! its field and device and then skipped without touching detector state.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{BufReader, Stdin};

use super::line_client::{read_frame, LineClient};
use super::SourceError;

/// Events produced by a message source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// One raw payload.
    Message(String),
    /// No more data (EOF for files/stdin, permanent disconnect for TCP).
    Eof,
}

/// Where raw payloads come from.
///
/// Implementations handle framing, reconnection and pacing internally. The
/// processing loop calls [`next_message`](Self::next_message) in a `select!`
/// with cancellation and the flush tick, so it must be cancel safe: a dropped
/// call may not lose input already read.
#[async_trait]
pub trait MessageSource: Send + 'static {
    /// Read the next message.
    ///
    /// Returns `Err` only for unrecoverable failures (e.g. reconnection
    /// exhausted).
    async fn next_message(&mut self) -> Result<SourceEvent, SourceError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

#[async_trait]
impl MessageSource for Box<dyn MessageSource> {
    async fn next_message(&mut self) -> Result<SourceEvent, SourceError> {
        (**self).next_message().await
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}

// ============================================================================
// Replay Source (file of JSON lines)
// ============================================================================

/// Replays pre-loaded messages with an optional inter-message delay.
pub struct ReplaySource {
    messages: std::vec::IntoIter<String>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(messages: Vec<String>, delay_ms: u64) -> Self {
        Self {
            messages: messages.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }

    /// Load every non-blank line of `path`.
    pub async fn from_file(path: &Path, delay_ms: u64) -> Result<Self, SourceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::Replay {
                path: path.display().to_string(),
                source: e,
            })?;
        let messages: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        tracing::info!(path = %path.display(), messages = messages.len(), "Replay file loaded");
        Ok(Self::new(messages, delay_ms))
    }

    pub fn remaining(&self) -> usize {
        self.messages.len()
    }
}

#[async_trait]
impl MessageSource for ReplaySource {
    async fn next_message(&mut self) -> Result<SourceEvent, SourceError> {
        // no delay before the first message
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        match self.messages.next() {
            Some(message) => {
                self.yielded_first = true;
                Ok(SourceEvent::Message(message))
            }
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (JSON payloads, one per line)
// ============================================================================

/// Reads payloads from stdin.
///
/// Used with the simulator: `simulation electrical | linewatch electrical --stdin`
pub struct StdinSource {
    reader: BufReader<Stdin>,
    line_buffer: Vec<u8>,
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            line_buffer: Vec::with_capacity(4096),
        }
    }
}

#[async_trait]
impl MessageSource for StdinSource {
    async fn next_message(&mut self) -> Result<SourceEvent, SourceError> {
        match read_frame(&mut self.reader, &mut self.line_buffer).await? {
            Some(line) => Ok(SourceEvent::Message(line)),
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// TCP Source (line-delimited JSON)
// ============================================================================

/// Reads payloads from a TCP line server.
///
/// Wraps [`LineClient`], which handles reconnection and timeouts internally.
pub struct TcpSource {
    client: LineClient,
}

impl TcpSource {
    /// Connect and return a ready source.
    pub async fn connect(host: &str, port: u16) -> Result<Self, SourceError> {
        let mut client = LineClient::new(host, port);
        client.connect().await?;
        Ok(Self { client })
    }

    /// Parse `HOST:PORT`.
    pub fn parse_address(address: &str) -> Result<(String, u16), SourceError> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| SourceError::InvalidAddress(address.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| SourceError::InvalidAddress(address.to_string()))?;
        if host.is_empty() {
            return Err(SourceError::InvalidAddress(address.to_string()));
        }
        Ok((host.to_string(), port))
    }
}

#[async_trait]
impl MessageSource for TcpSource {
    async fn next_message(&mut self) -> Result<SourceEvent, SourceError> {
        // read_line() reconnects internally; an error here means it gave up
        match self.client.read_line().await {
            Ok(line) => Ok(SourceEvent::Message(line)),
            Err(SourceError::ConnectionClosed) => Ok(SourceEvent::Eof),
            Err(e) => Err(e),
        }
    }

    fn source_name(&self) -> &str {
        "tcp"
    }
}
