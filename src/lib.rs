//! linewatch: Production Line Device Analytics
//!
//! Adaptive windowed anomaly detection for electrical current and vibration
//! sensors on production machines.
//!
//! ## Architecture
//!
//! - **Acquisition**: message sources (stdin, TCP, replay), payload parsing,
//!   per-cycle sample buffering
//! - **Signals**: derived quantities (current integral, phase asymmetry,
//!   inrush peak, total vibration RMS)
//! - **Detection**: windowed statistical model, sigma-band and z-score
//!   policies, rolling anomaly ratio, per-quantity detector registry
//! - **Pipeline**: electrical / vibration / state monitors and the async
//!   processing loop
//! - **Sink**: time-series points written to InfluxDB or any writer

pub mod acquisition;
pub mod config;
pub mod detection;
pub mod pipeline;
pub mod signals;
pub mod sink;

pub use config::{AppConfig, ConfigError, MonitorKind};
pub use detection::{
    Detector, DetectorRegistry, DetectorSpec, Evaluation, Outcome, PolicyKind, Verdict,
};
pub use pipeline::{ElectricalMonitor, Monitor, ProcessingLoop, StateMonitor, VibrationMonitor};
pub use sink::{InfluxSink, Point, PointSink, WriterSink};
