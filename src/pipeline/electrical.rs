//! Electrical analytics for one three-phase device.
//!
//! Samples accumulate while the device runs. When a cycle completes the
//! monitor derives per-phase current integrals, the phase asymmetry and the
//! per-phase inrush peak, runs each through its detector and emits one
//! `ElectricalAnalytics` point.

use tracing::{debug, info, warn};

use super::{log_evaluation, with_evaluation, Monitor, MonitorError, RouteFilter, VALUE_DECIMALS};
use crate::acquisition::{CycleEvent, CycleSamples, ElectricalPayload, Payload, SampleBuffer};
use crate::detection::{quantities, DetectorRegistry, DetectorSpec, RegistryError};
use crate::signals::{asymmetry_percent, definite_integral, nth_peak, round_to};
use crate::sink::Point;

pub const MEASUREMENT: &str = "ElectricalAnalytics";

/// Field name kept as the dashboards already query it.
pub const ASYMMETRY_FIELD: &str = "el_current_assymetry";

/// Inrush peak extraction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InrushSettings {
    pub peak_height: f64,
    /// 1-indexed, in time order.
    pub peak_number: usize,
}

pub struct ElectricalMonitor {
    route: RouteFilter,
    device_name: String,
    buffer: SampleBuffer,
    registry: DetectorRegistry,
    inrush: InrushSettings,
    cycles_completed: u64,
    cycles_aborted: u64,
}

impl ElectricalMonitor {
    /// Build the monitor and register the integral and inrush detectors of
    /// `device_name`.
    pub fn new(
        line_name: &str,
        machine_name: &str,
        device_name: &str,
        spec: &DetectorSpec,
        inrush: InrushSettings,
    ) -> Result<Self, RegistryError> {
        let mut registry = DetectorRegistry::new();
        registry.register_all(device_name, &quantities::CURRENT_INTEGRALS, spec)?;
        registry.register_all(device_name, &quantities::INRUSH_CURRENTS, spec)?;

        Ok(Self {
            route: RouteFilter::new(line_name, machine_name).with_source(device_name),
            device_name: device_name.to_string(),
            buffer: SampleBuffer::new(),
            registry,
            inrush,
            cycles_completed: 0,
            cycles_aborted: 0,
        })
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn cycles_aborted(&self) -> u64 {
        self.cycles_aborted
    }

    /// Derive, detect and build the point for one completed cycle.
    fn analyse(&mut self, cycle: &CycleSamples, timestamp_ms: i64) -> Result<Point, MonitorError> {
        let device = self.device_name.as_str();
        let mut point = Point::new(MEASUREMENT, timestamp_ms)
            .tag("line_name", self.route.line_name.as_str())
            .tag("machine_name", self.route.machine_name.as_str())
            .tag("device_name", device);

        // Integrals
        // detectors and asymmetry see full precision; rounding is for the point only
        let integrals: [f64; 3] = std::array::from_fn(|i| definite_integral(&cycle.phases[i]));
        let mut anomalies = 0usize;
        for (quantity, &value) in quantities::CURRENT_INTEGRALS.iter().zip(&integrals) {
            let eval = self.registry.evaluate(device, quantity, value)?;
            log_evaluation(quantity, &eval);
            anomalies += usize::from(eval.is_anomalous());
            point = with_evaluation(
                point.field(*quantity, round_to(value, VALUE_DECIMALS)),
                quantity,
                &eval,
            );
        }

        // Asymmetry
        match asymmetry_percent(integrals[0], integrals[1], integrals[2]) {
            Ok(percent) => point = point.field(ASYMMETRY_FIELD, round_to(percent, 2)),
            Err(e) => warn!(device, error = %e, "Asymmetry not computed for this cycle"),
        }

        // Inrush
        for (phase, quantity) in quantities::INRUSH_CURRENTS.iter().enumerate() {
            let Some(peak) = nth_peak(
                &cycle.phases[phase],
                self.inrush.peak_height,
                self.inrush.peak_number,
            ) else {
                warn!(
                    device,
                    phase = phase + 1,
                    peak_number = self.inrush.peak_number,
                    peak_height = self.inrush.peak_height,
                    "No inrush peak found, phase skipped"
                );
                continue;
            };
            let eval = self.registry.evaluate(device, quantity, peak.amplitude)?;
            log_evaluation(quantity, &eval);
            anomalies += usize::from(eval.is_anomalous());
            point = with_evaluation(
                point.field(*quantity, round_to(peak.amplitude, VALUE_DECIMALS)),
                quantity,
                &eval,
            );
        }

        self.cycles_completed += 1;
        info!(
            device,
            cycle = self.cycles_completed,
            samples = cycle.phases[0].len(),
            integral_ph1 = integrals[0],
            integral_ph2 = integrals[1],
            integral_ph3 = integrals[2],
            anomalies,
            "Cycle analysed"
        );
        Ok(point)
    }
}

impl Monitor for ElectricalMonitor {
    fn handle(&mut self, raw: &str) -> Result<Vec<Point>, MonitorError> {
        let payload = ElectricalPayload::parse(raw)?;
        self.route.check(&payload.origin, &payload.device_name)?;

        match self.buffer.on_payload(&payload) {
            CycleEvent::Completed(cycle) => Ok(vec![self.analyse(&cycle, payload.timestamp_ms)?]),
            CycleEvent::Aborted { discarded } => {
                if discarded > 0 {
                    self.cycles_aborted += 1;
                    info!(device = %self.device_name, discarded, "Cycle aborted by synch pulse");
                }
                Ok(Vec::new())
            }
            CycleEvent::Accumulating { buffered } => {
                debug!(device = %self.device_name, buffered, "Accumulating samples");
                Ok(Vec::new())
            }
            CycleEvent::Idle => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "electrical"
    }
}
