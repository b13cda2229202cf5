//! Batched writes to an InfluxDB v2 `/api/v2/write` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};

use super::{Point, PointSink, SinkError};

/// Connection and batching parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluxSettings {
    /// Base URL, e.g. `http://influxdb:8086`
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    /// Upper bound of the random delay added before each flush.
    pub jitter_interval_ms: u64,
}

pub struct InfluxSink {
    http: reqwest::Client,
    settings: InfluxSettings,
    write_url: String,
    batch: Vec<String>,
    points_written: u64,
    points_dropped: u64,
}

impl InfluxSink {
    pub fn new(settings: InfluxSettings) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let write_url = format!("{}/api/v2/write", settings.url.trim_end_matches('/'));
        info!(
            url = %write_url,
            bucket = %settings.bucket,
            batch_size = settings.batch_size,
            "InfluxDB sink configured"
        );
        Ok(Self {
            http,
            batch: Vec::with_capacity(settings.batch_size),
            settings,
            write_url,
            points_written: 0,
            points_dropped: 0,
        })
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn points_written(&self) -> u64 {
        self.points_written
    }

    pub fn points_dropped(&self) -> u64 {
        self.points_dropped
    }

    fn jitter(&self) -> Duration {
        if self.settings.jitter_interval_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(0..=self.settings.jitter_interval_ms);
        Duration::from_millis(ms)
    }
}

#[async_trait]
impl PointSink for InfluxSink {
    async fn write(&mut self, point: Point) -> Result<(), SinkError> {
        self.batch.push(point.to_line_protocol()?);
        if self.batch.len() >= self.settings.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let jitter = self.jitter();
        if !jitter.is_zero() {
            tokio::time::sleep(jitter).await;
        }

        // taken up front: a failed batch is not retried
        let batch = std::mem::take(&mut self.batch);
        let count = batch.len() as u64;

        let result = self
            .http
            .post(&self.write_url)
            .query(&[
                ("org", self.settings.org.as_str()),
                ("bucket", self.settings.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header("Authorization", format!("Token {}", self.settings.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(batch.join("\n"))
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                self.points_dropped += count;
                warn!(points = count, error = %e, "InfluxDB write failed, batch dropped");
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_success() {
            self.points_written += count;
            debug!(points = count, "InfluxDB batch written");
            Ok(())
        } else {
            self.points_dropped += count;
            let body = response.text().await.unwrap_or_default();
            warn!(points = count, status = status.as_u16(), "InfluxDB rejected batch");
            Err(SinkError::ServerError {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn flush_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.settings.flush_interval_ms.max(1)))
    }

    fn name(&self) -> &str {
        "influxdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn settings(url: String, batch_size: usize) -> InfluxSettings {
        InfluxSettings {
            url,
            org: "plant".to_string(),
            bucket: "analytics".to_string(),
            token: "secret".to_string(),
            batch_size,
            flush_interval_ms: 1000,
            jitter_interval_ms: 0,
        }
    }

    /// Accept one HTTP request, capture it, answer with `status`.
    async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_batch_posted_when_full() {
        let (url, server) = one_shot_server("204 No Content").await;
        let mut sink = InfluxSink::new(settings(url, 2)).unwrap();

        sink.write(Point::new("m", 1).field("a", 1.0)).await.unwrap();
        assert_eq!(sink.pending(), 1);
        sink.write(Point::new("m", 2).field("a", 2.0)).await.unwrap();
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.points_written(), 2);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/v2/write?org=plant&bucket=analytics&precision=ms"));
        assert!(request.contains("Token secret"));
        assert!(request.ends_with("m a=1 1\nm a=2 2"));
    }

    #[tokio::test]
    async fn test_rejected_batch_is_dropped() {
        let (url, server) = one_shot_server("400 Bad Request").await;
        let mut sink = InfluxSink::new(settings(url, 10)).unwrap();
        sink.write(Point::new("m", 1).field("a", 1.0)).await.unwrap();

        let err = sink.flush().await.unwrap_err();
        assert!(matches!(err, SinkError::ServerError { status: 400, .. }));
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.points_dropped(), 1);
        server.await.unwrap();

        // nothing left to send
        sink.flush().await.unwrap();
    }

    #[test]
    fn test_flush_interval_reported() {
        let sink = InfluxSink::new(settings("http://localhost:8086/".to_string(), 10)).unwrap();
        assert_eq!(sink.flush_interval(), Some(Duration::from_millis(1000)));
        assert_eq!(sink.write_url, "http://localhost:8086/api/v2/write");
    }
}
