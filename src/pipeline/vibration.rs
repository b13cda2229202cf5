//! Vibration analytics for one sensor: total RMS through a single detector.

use tracing::debug;

use super::{log_evaluation, with_evaluation, Monitor, MonitorError, RouteFilter};
use crate::acquisition::{Payload, VibrationPayload};
use crate::detection::{quantities, DetectorRegistry, DetectorSpec, RegistryError};
use crate::signals::total_rms;
use crate::sink::Point;

pub const MEASUREMENT: &str = "VibSensor";

pub struct VibrationMonitor {
    route: RouteFilter,
    sensor_name: String,
    registry: DetectorRegistry,
    readings: u64,
}

impl VibrationMonitor {
    pub fn new(
        line_name: &str,
        machine_name: &str,
        sensor_name: &str,
        spec: &DetectorSpec,
    ) -> Result<Self, RegistryError> {
        let mut registry = DetectorRegistry::new();
        registry.register(sensor_name, quantities::VIB_TOTAL_RMS, spec)?;
        Ok(Self {
            route: RouteFilter::new(line_name, machine_name).with_source(sensor_name),
            sensor_name: sensor_name.to_string(),
            registry,
            readings: 0,
        })
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn readings(&self) -> u64 {
        self.readings
    }
}

impl Monitor for VibrationMonitor {
    fn handle(&mut self, raw: &str) -> Result<Vec<Point>, MonitorError> {
        let payload = VibrationPayload::parse(raw)?;
        self.route.check(&payload.origin, &payload.sensor_name)?;

        let total = total_rms(payload.rms_x, payload.rms_y, payload.rms_z);
        let eval = self
            .registry
            .evaluate(&self.sensor_name, quantities::VIB_TOTAL_RMS, total)?;
        log_evaluation(quantities::VIB_TOTAL_RMS, &eval);
        self.readings += 1;
        debug!(sensor = %self.sensor_name, total, outcome = ?eval.outcome, "Vibration reading");

        let point = Point::new(MEASUREMENT, payload.timestamp_ms)
            .tag("line_name", self.route.line_name.as_str())
            .tag("machine_name", self.route.machine_name.as_str())
            .tag("sensor_name", self.sensor_name.as_str())
            .field("vib_accel_rms_x", payload.rms_x)
            .field("vib_accel_rms_y", payload.rms_y)
            .field("vib_accel_rms_z", payload.rms_z)
            .field("vib_accel_rms_total", total);

        Ok(vec![with_evaluation(point, "", &eval)])
    }

    fn name(&self) -> &str {
        "vibration"
    }
}
