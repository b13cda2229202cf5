//! Reading acquisition
//!
//! Raw message sources (stdin, TCP, replay file), payload parsing for the
//! three reading kinds, and per-device cycle buffering of phase currents.

mod line_client;
pub mod payload;
mod sample_buffer;
mod source;

use thiserror::Error;

pub use line_client::{reconnect_delay_secs, LineClient};
pub use payload::{
    ElectricalPayload, Origin, Payload, PayloadError, Samples, StatePayload, VibrationPayload,
};
pub use sample_buffer::{CycleEvent, CycleSamples, SampleBuffer};
pub use source::{MessageSource, ReplaySource, SourceEvent, StdinSource, TcpSource};

/// Source-level errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Failed to reconnect after {0} attempts")]
    ReconnectExhausted(u32),

    #[error("Invalid address '{0}', expected HOST:PORT")]
    InvalidAddress(String),

    #[error("Cannot read replay file {path}: {source}")]
    Replay {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
