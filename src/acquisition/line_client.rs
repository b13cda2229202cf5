//! Line-delimited JSON over TCP.
//!
//! Each newline-terminated line is one payload. The client owns connection
//! resilience: connect timeout, TCP keep-alive, per-line read timeout,
//! stale-connection detection and exponential-backoff reconnection.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::SourceError;

/// Default read timeout per line (seconds).
const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;

/// Connect timeout (seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Maximum reconnection attempts before giving up.
const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Initial reconnection delay (doubles each attempt).
const INITIAL_RECONNECT_DELAY_SECS: u64 = 2;

/// Reconnection delay cap.
const MAX_RECONNECT_DELAY_SECS: u64 = 60;

/// No data for this long forces a reconnect.
const STALE_CONNECTION_SECS: u64 = 300;

/// Backoff delay before reconnection attempt `attempt` (1-based).
pub fn reconnect_delay_secs(attempt: u32) -> u64 {
    INITIAL_RECONNECT_DELAY_SECS
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_RECONNECT_DELAY_SECS)
}

pub struct LineClient {
    host: String,
    port: u16,
    stream: Option<BufReader<TcpStream>>,
    /// Bytes of a line not yet terminated; survives dropped read futures.
    line_buffer: Vec<u8>,
    read_timeout_secs: u64,
    /// Unix secs of the last line received
    last_data_time: u64,
    lines_received: u64,
    reconnections: u64,
    timeouts: u64,
}

impl LineClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            stream: None,
            line_buffer: Vec::with_capacity(4096),
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            last_data_time: 0,
            lines_received: 0,
            reconnections: 0,
            timeouts: 0,
        }
    }

    /// Set the read timeout (seconds). Default is 120s.
    pub fn with_read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn lines_received(&self) -> u64 {
        self.lines_received
    }

    pub async fn connect(&mut self) -> Result<(), SourceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = self.address();
        tracing::info!(address = %addr, "Connecting to line server");

        let stream = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| SourceError::Timeout)?
        .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;

        // Keep-alive so a silently dead peer is noticed
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(Duration::from_secs(30))
            .with_interval(Duration::from_secs(10));
        if let Err(e) = sock_ref.set_tcp_keepalive(&keepalive) {
            tracing::warn!(error = %e, "Could not enable TCP keep-alive");
        }

        self.stream = Some(BufReader::new(stream));
        self.last_data_time = current_unix_secs();

        tracing::info!(address = %addr, "Line server connection established");
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        // a partial line from the old connection never completes
        self.line_buffer.clear();
        if let Some(mut reader) = self.stream.take() {
            let _ = reader.get_mut().shutdown().await;
            tracing::info!("Line server connection closed");
        }
    }

    /// Reconnect with exponential backoff; errors once attempts are exhausted.
    pub async fn reconnect(&mut self) -> Result<(), SourceError> {
        self.disconnect().await;

        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            let delay_secs = reconnect_delay_secs(attempt);
            tracing::warn!(
                attempt,
                max_attempts = MAX_RECONNECT_ATTEMPTS,
                delay_secs,
                "Reconnecting to line server"
            );
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;

            match self.connect().await {
                Ok(()) => {
                    self.reconnections += 1;
                    tracing::info!(
                        attempt,
                        total_reconnections = self.reconnections,
                        "Reconnection successful"
                    );
                    return Ok(());
                }
                Err(e) => tracing::warn!(attempt, error = %e, "Reconnection attempt failed"),
            }
        }

        tracing::error!(max_attempts = MAX_RECONNECT_ATTEMPTS, "Reconnection exhausted");
        Err(SourceError::ReconnectExhausted(MAX_RECONNECT_ATTEMPTS))
    }

    /// Next non-empty line, reconnecting on timeout, drop or staleness.
    pub async fn read_line(&mut self) -> Result<String, SourceError> {
        let now = current_unix_secs();
        if self.stream.is_some()
            && self.last_data_time > 0
            && now.saturating_sub(self.last_data_time) > STALE_CONNECTION_SECS
        {
            tracing::warn!(
                silent_secs = now - self.last_data_time,
                threshold = STALE_CONNECTION_SECS,
                "Connection stale, forcing reconnect"
            );
            self.reconnect().await?;
        }

        if self.stream.is_none() {
            self.connect().await?;
        }

        let result = match self.read_line_inner().await {
            Err(SourceError::Timeout) => {
                self.timeouts += 1;
                tracing::warn!(
                    timeout_secs = self.read_timeout_secs,
                    total_timeouts = self.timeouts,
                    "Read timeout, attempting reconnect"
                );
                self.reconnect().await?;
                self.read_line_inner().await
            }
            Err(SourceError::ConnectionClosed) => {
                tracing::warn!("Connection closed by server, attempting reconnect");
                self.reconnect().await?;
                self.read_line_inner().await
            }
            other => other,
        };

        if result.is_ok() {
            self.last_data_time = current_unix_secs();
            self.lines_received += 1;
        }
        result
    }

    async fn read_line_inner(&mut self) -> Result<String, SourceError> {
        let reader = self
            .stream
            .as_mut()
            .ok_or_else(|| SourceError::ConnectionFailed("Not connected".to_string()))?;
        let read_timeout = Duration::from_secs(self.read_timeout_secs);

        let result = tokio::time::timeout(read_timeout, read_frame(reader, &mut self.line_buffer)).await;
        match result {
            Ok(Ok(Some(line))) => Ok(line),
            Ok(Ok(None)) => {
                self.stream = None;
                Err(SourceError::ConnectionClosed)
            }
            Ok(Err(e)) => Err(SourceError::ConnectionFailed(e.to_string())),
            Err(_) => Err(SourceError::Timeout),
        }
    }
}

/// Next non-blank, trimmed line from `reader`, or `None` at end of stream.
///
/// Partial input accumulates in `buf`, which the caller keeps between calls,
/// so the returned future may be dropped mid-line (by `select!` or a timeout)
/// and the next call resumes the same line. An unterminated final line is
/// returned at end of stream.
pub(crate) async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    loop {
        // read_until appends, so bytes from a cancelled call are kept
        let bytes = reader.read_until(b'\n', buf).await?;
        if bytes == 0 && buf.is_empty() {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(buf).trim().to_string();
        buf.clear();
        if !line.is_empty() {
            return Ok(Some(line));
        }
        if bytes == 0 {
            return Ok(None);
        }
    }
}

fn current_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
