//! Generic machine states, passed through without detection.

use tracing::debug;

use super::{Monitor, MonitorError, RouteFilter};
use crate::acquisition::{Payload, StatePayload};
use crate::sink::Point;

pub const MEASUREMENT: &str = "GenericState";

/// Forwards every state of one machine as a `GenericState` point.
pub struct StateMonitor {
    route: RouteFilter,
}

impl StateMonitor {
    pub fn new(line_name: &str, machine_name: &str) -> Self {
        Self {
            route: RouteFilter::new(line_name, machine_name),
        }
    }
}

impl Monitor for StateMonitor {
    fn handle(&mut self, raw: &str) -> Result<Vec<Point>, MonitorError> {
        let payload = StatePayload::parse(raw)?;
        self.route.check(&payload.origin, &payload.state_name)?;

        let value = payload.state_value.as_integer();
        debug!(state = %payload.state_name, value, "State reading");

        Ok(vec![Point::new(MEASUREMENT, payload.timestamp_ms)
            .tag("line_name", self.route.line_name.as_str())
            .tag("machine_name", self.route.machine_name.as_str())
            .tag("state_name", payload.state_name)
            .field("value", value)])
    }

    fn name(&self) -> &str {
        "states"
    }
}
