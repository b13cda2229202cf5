//! Processing Pipeline
//!
//! ```text
//! MessageSource ──raw JSON──▶ Monitor ──Points──▶ PointSink
//!   (stdin/tcp/replay)   (parse → route → derive → detect)   (influx/stdout)
//! ```
//!
//! A [`Monitor`] is synchronous and owns all detector state for its process;
//! the [`ProcessingLoop`] is the only async part and drives one monitor into
//! one sink until the source ends or the cancellation token fires.

mod electrical;
pub mod processing_loop;
mod state_monitor;
mod vibration;

use thiserror::Error;
use tracing::{info, warn};

use crate::acquisition::{Origin, PayloadError};
use crate::detection::{Evaluation, Outcome, PolicyReading, RegistryError};
use crate::signals::round_to;
use crate::sink::Point;

pub use electrical::{ElectricalMonitor, InrushSettings};
pub use processing_loop::{LoopStats, ProcessingLoop};
pub use state_monitor::StateMonitor;
pub use vibration::VibrationMonitor;

/// Decimal places of emitted measurement values.
pub(crate) const VALUE_DECIMALS: i32 = 4;

// ============================================================================
// Monitor Trait
// ============================================================================

/// Turns one raw payload into zero or more points.
pub trait Monitor: Send + 'static {
    /// Handle one message.
    ///
    /// An `Err` means the message was skipped and no detector state changed.
    fn handle(&mut self, raw: &str) -> Result<Vec<Point>, MonitorError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

impl Monitor for Box<dyn Monitor> {
    fn handle(&mut self, raw: &str) -> Result<Vec<Point>, MonitorError> {
        (**self).handle(raw)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Valid payload addressed to another line, machine or device.
    #[error("Message for {line}/{machine}/{source_name} is not routed here")]
    NotRouted {
        line: String,
        machine: String,
        source_name: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// Routing
// ============================================================================

/// Which messages a monitor accepts.
///
/// `source_name` of `None` accepts every device/sensor/state on the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFilter {
    pub line_name: String,
    pub machine_name: String,
    pub source_name: Option<String>,
}

impl RouteFilter {
    pub fn new(line_name: impl Into<String>, machine_name: impl Into<String>) -> Self {
        Self {
            line_name: line_name.into(),
            machine_name: machine_name.into(),
            source_name: None,
        }
    }

    pub fn with_source(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    /// Check a payload's identity, returning [`MonitorError::NotRouted`] on mismatch.
    pub fn check(&self, origin: &Origin, source_name: &str) -> Result<(), MonitorError> {
        let source_ok = self.source_name.as_deref().map_or(true, |s| s == source_name);
        if origin.matches(&self.line_name, &self.machine_name) && source_ok {
            Ok(())
        } else {
            Err(MonitorError::NotRouted {
                line: origin.line_name.clone(),
                machine: origin.machine_name.clone(),
                source_name: source_name.to_string(),
            })
        }
    }
}

// ============================================================================
// Evaluation Fields
// ============================================================================

fn field_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}_{name}")
    }
}

/// Add the detector fields of one evaluation under `prefix`.
///
/// Always `anomaly` (0/1), `anomaly_ratio` and `model_avg`; then `z_score`
/// and `z_score_thresh` for the z-score policy, or `model_std_dev`,
/// `lower_bound` and `upper_bound` for the sigma band.
pub(crate) fn with_evaluation(point: Point, prefix: &str, eval: &Evaluation) -> Point {
    let point = point
        .field(field_key(prefix, "anomaly"), i64::from(eval.anomaly))
        .field(
            field_key(prefix, "anomaly_ratio"),
            round_to(eval.anomaly_ratio, VALUE_DECIMALS),
        )
        .field(field_key(prefix, "model_avg"), round_to(eval.mean, VALUE_DECIMALS));

    match eval.reading {
        PolicyReading::ZScore { z_score, threshold } => point
            .field(field_key(prefix, "z_score"), z_score)
            .field(field_key(prefix, "z_score_thresh"), threshold),
        PolicyReading::SigmaBand {
            lower_bound,
            upper_bound,
            ..
        } => point
            .field(
                field_key(prefix, "model_std_dev"),
                round_to(eval.std_dev, VALUE_DECIMALS),
            )
            .field(field_key(prefix, "lower_bound"), round_to(lower_bound, VALUE_DECIMALS))
            .field(field_key(prefix, "upper_bound"), round_to(upper_bound, VALUE_DECIMALS)),
    }
}

/// Log degeneracies and anomalies of one evaluation.
pub(crate) fn log_evaluation(quantity: &str, eval: &Evaluation) {
    match eval.outcome {
        Outcome::Degenerate(reason) => {
            warn!(quantity, value = eval.value, reason = %reason, "Evaluation skipped");
        }
        Outcome::Decided {
            verdict,
            substitution,
        } => {
            if let Some(reason) = substitution {
                warn!(quantity, reason = %reason, "Degenerate statistic substituted");
            }
            if verdict.is_anomalous() {
                info!(
                    quantity,
                    value = eval.value,
                    mean = eval.mean,
                    anomaly_ratio = eval.anomaly_ratio,
                    "Anomaly detected"
                );
            }
        }
        Outcome::Building { .. } => {}
    }
}
