//! Point persistence
//!
//! Monitors emit [`Point`]s; a [`PointSink`] delivers them. Delivery is
//! at-most-once: a batch that fails to write is logged and dropped.

mod influx;
mod point;
mod writer;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use influx::{InfluxSettings, InfluxSink};
pub use point::{FieldValue, Point};
pub use writer::WriterSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Point '{0}' has no writable fields")]
    EmptyPoint(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for emitted points.
#[async_trait]
pub trait PointSink: Send + 'static {
    /// Queue or write one point.
    async fn write(&mut self, point: Point) -> Result<(), SinkError>;

    /// Push out anything buffered.
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// How often the processing loop should call [`flush`](Self::flush) while
    /// idle. `None` for sinks that never buffer.
    fn flush_interval(&self) -> Option<Duration> {
        None
    }

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

#[async_trait]
impl PointSink for Box<dyn PointSink> {
    async fn write(&mut self, point: Point) -> Result<(), SinkError> {
        (**self).write(point).await
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush().await
    }

    fn flush_interval(&self) -> Option<Duration> {
        (**self).flush_interval()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
