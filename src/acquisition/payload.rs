//! JSON payload parsing for device readings.
//!
//! Payload field names use the PascalCase convention of the field devices
//! (`DeviceName`, `ElectricalData.CurrentL1`, ...). Each payload type lists
//! its required fields with the JSON kind they must hold, so a malformed
//! record is reported with the exact field and the device that sent it
//! before any typed deserialization is attempted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// State value that marks an electrical device as mid-cycle.
pub const RUNNING_STATE: &str = "Running";

const UNKNOWN_DEVICE: &str = "<unknown>";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Missing field '{field}' in payload from '{device}'")]
    MissingField { field: &'static str, device: String },

    #[error("Field '{field}' from '{device}' must be {expected}, got {found}")]
    WrongKind {
        field: &'static str,
        device: String,
        expected: FieldKind,
        found: String,
    },

    #[error("Payload from '{device}' rejected: {message}")]
    Rejected { device: String, message: String },
}

impl PayloadError {
    /// Field name involved, if the error is field-specific.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field, .. } | Self::WrongKind { field, .. } => Some(*field),
            _ => None,
        }
    }

    /// Device or sensor that sent the payload, when it could be read.
    pub fn device(&self) -> Option<&str> {
        match self {
            Self::InvalidJson(_) => None,
            Self::MissingField { device, .. }
            | Self::WrongKind { device, .. }
            | Self::Rejected { device, .. } => Some(device.as_str()),
        }
    }
}

/// Expected JSON kind of a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    Bool,
    /// One number or an array of numbers.
    Samples,
    /// Number or boolean, read as an integer.
    StateValue,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64(),
            Self::Bool => value.is_boolean(),
            Self::Samples => match value {
                Value::Number(_) => true,
                Value::Array(items) => items.iter().all(Value::is_number),
                _ => false,
            },
            Self::StateValue => value.is_number() || value.is_boolean(),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "a string"),
            Self::Number => write!(f, "a number"),
            Self::Integer => write!(f, "an integer"),
            Self::Bool => write!(f, "a boolean"),
            Self::Samples => write!(f, "a number or array of numbers"),
            Self::StateValue => write!(f, "a number or boolean"),
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string \"{s}\""),
        Value::Array(items) => format!("array of {} item(s)", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}

/// A payload type with a fixed schema of required fields.
pub trait Payload: DeserializeOwned {
    /// Field naming the sender, used for error context.
    const SOURCE_FIELD: &'static str;

    /// Required fields as dotted paths with their expected kind.
    const REQUIRED: &'static [(&'static str, FieldKind)];

    /// Parse and validate one raw JSON message.
    fn parse(raw: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(raw).map_err(PayloadError::InvalidJson)?;
        let device = value
            .get(Self::SOURCE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_DEVICE)
            .to_string();

        for &(field, expected) in Self::REQUIRED {
            let found = lookup(&value, field).ok_or_else(|| PayloadError::MissingField {
                field,
                device: device.clone(),
            })?;
            if !expected.matches(found) {
                return Err(PayloadError::WrongKind {
                    field,
                    device,
                    expected,
                    found: describe(found),
                });
            }
        }

        serde_json::from_value(value).map_err(|e| PayloadError::Rejected {
            device,
            message: e.to_string(),
        })
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |node, key| node.get(key))
}

// ============================================================================
// Shared Fields
// ============================================================================

/// Phase current samples: a single reading or a burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Samples {
    One(f64),
    Many(Vec<f64>),
}

impl Samples {
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Line / machine pair every payload carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(rename = "LineName")]
    pub line_name: String,
    #[serde(rename = "MachineName")]
    pub machine_name: String,
}

impl Origin {
    pub fn matches(&self, line_name: &str, machine_name: &str) -> bool {
        self.line_name == line_name && self.machine_name == machine_name
    }
}

// ============================================================================
// Electrical
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalData {
    #[serde(rename = "CurrentL1")]
    pub current_l1: Samples,
    #[serde(rename = "CurrentL2")]
    pub current_l2: Samples,
    #[serde(rename = "CurrentL3")]
    pub current_l3: Samples,
}

/// Three-phase current reading from one electrical device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalPayload {
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(rename = "DeviceName")]
    pub device_name: String,
    #[serde(rename = "DeviceState")]
    pub device_state: String,
    #[serde(rename = "SynchPulse")]
    pub synch_pulse: bool,
    #[serde(rename = "TimeStamp")]
    pub timestamp_ms: i64,
    #[serde(rename = "ElectricalData")]
    pub electrical_data: ElectricalData,
}

impl ElectricalPayload {
    pub fn is_running(&self) -> bool {
        self.device_state == RUNNING_STATE
    }
}

impl Payload for ElectricalPayload {
    const SOURCE_FIELD: &'static str = "DeviceName";
    const REQUIRED: &'static [(&'static str, FieldKind)] = &[
        ("DeviceName", FieldKind::Text),
        ("LineName", FieldKind::Text),
        ("MachineName", FieldKind::Text),
        ("DeviceState", FieldKind::Text),
        ("SynchPulse", FieldKind::Bool),
        ("TimeStamp", FieldKind::Integer),
        ("ElectricalData.CurrentL1", FieldKind::Samples),
        ("ElectricalData.CurrentL2", FieldKind::Samples),
        ("ElectricalData.CurrentL3", FieldKind::Samples),
    ];
}

// ============================================================================
// Vibration
// ============================================================================

/// Per-axis RMS acceleration from one vibration sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibrationPayload {
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(rename = "SensorName")]
    pub sensor_name: String,
    #[serde(rename = "VibAccelTotRmsX")]
    pub rms_x: f64,
    #[serde(rename = "VibAccelTotRmsY")]
    pub rms_y: f64,
    #[serde(rename = "VibAccelTotRmsZ")]
    pub rms_z: f64,
    #[serde(rename = "TimeStamp")]
    pub timestamp_ms: i64,
}

impl Payload for VibrationPayload {
    const SOURCE_FIELD: &'static str = "SensorName";
    const REQUIRED: &'static [(&'static str, FieldKind)] = &[
        ("SensorName", FieldKind::Text),
        ("LineName", FieldKind::Text),
        ("MachineName", FieldKind::Text),
        ("VibAccelTotRmsX", FieldKind::Number),
        ("VibAccelTotRmsY", FieldKind::Number),
        ("VibAccelTotRmsZ", FieldKind::Number),
        ("TimeStamp", FieldKind::Integer),
    ];
}

// ============================================================================
// Generic State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
}

impl StateValue {
    /// Integer form; booleans map to 0/1 and floats truncate toward zero.
    pub fn as_integer(self) -> i64 {
        match self {
            Self::Flag(b) => i64::from(b),
            Self::Integer(i) => i,
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) => f.trunc() as i64,
        }
    }
}

/// Named machine state reading (door open, cycle count, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(rename = "StateName")]
    pub state_name: String,
    #[serde(rename = "StateValue")]
    pub state_value: StateValue,
    #[serde(rename = "TimeStamp")]
    pub timestamp_ms: i64,
}

impl Payload for StatePayload {
    const SOURCE_FIELD: &'static str = "StateName";
    const REQUIRED: &'static [(&'static str, FieldKind)] = &[
        ("StateName", FieldKind::Text),
        ("LineName", FieldKind::Text),
        ("MachineName", FieldKind::Text),
        ("StateValue", FieldKind::StateValue),
        ("TimeStamp", FieldKind::Integer),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELECTRICAL: &str = r#"{
        "LineName": "L1", "MachineName": "press", "DeviceName": "meter-1",
        "DeviceState": "Running", "SynchPulse": false, "TimeStamp": 1700000000123,
        "ElectricalData": {"CurrentL1": [1.0, 2.0], "CurrentL2": 1.5, "CurrentL3": [0.5]}
    }"#;

    #[test]
    fn test_parse_electrical() {
        let payload = ElectricalPayload::parse(ELECTRICAL).unwrap();
        assert_eq!(payload.device_name, "meter-1");
        assert!(payload.is_running());
        assert_eq!(payload.timestamp_ms, 1_700_000_000_123);
        assert_eq!(payload.electrical_data.current_l1.as_slice(), &[1.0, 2.0]);
        assert_eq!(payload.electrical_data.current_l2.as_slice(), &[1.5]);
        assert!(payload.origin.matches("L1", "press"));
    }

    #[test]
    fn test_missing_nested_field_names_device() {
        let raw = ELECTRICAL.replace(r#""CurrentL3": [0.5]"#, r#""Other": 1"#);
        let err = ElectricalPayload::parse(&raw).unwrap_err();
        assert_eq!(err.field(), Some("ElectricalData.CurrentL3"));
        assert_eq!(err.device(), Some("meter-1"));
    }

    #[test]
    fn test_wrong_kind_reported() {
        let raw = ELECTRICAL.replace(r#""SynchPulse": false"#, r#""SynchPulse": "yes""#);
        let err = ElectricalPayload::parse(&raw).unwrap_err();
        assert!(matches!(err, PayloadError::WrongKind { field: "SynchPulse", .. }));
        assert!(err.to_string().contains("a boolean"));
    }

    #[test]
    fn test_samples_array_must_be_numeric() {
        let raw = ELECTRICAL.replace("[1.0, 2.0]", r#"[1.0, "x"]"#);
        let err = ElectricalPayload::parse(&raw).unwrap_err();
        assert_eq!(err.field(), Some("ElectricalData.CurrentL1"));
    }

    #[test]
    fn test_invalid_json() {
        let err = VibrationPayload::parse("{not json").unwrap_err();
        assert!(matches!(err, PayloadError::InvalidJson(_)));
        assert_eq!(err.device(), None);
    }

    #[test]
    fn test_parse_vibration_unknown_sender() {
        let raw = r#"{"LineName": "L1", "MachineName": "m", "VibAccelTotRmsX": 1.0,
                      "VibAccelTotRmsY": 2.0, "VibAccelTotRmsZ": 2.0, "TimeStamp": 5}"#;
        let err = VibrationPayload::parse(raw).unwrap_err();
        assert_eq!(err.field(), Some("SensorName"));
        assert_eq!(err.device(), Some(UNKNOWN_DEVICE));
    }

    #[test]
    fn test_state_value_forms() {
        let raw = r#"{"LineName": "L1", "MachineName": "m", "StateName": "door",
                      "StateValue": true, "TimeStamp": 5}"#;
        let payload = StatePayload::parse(raw).unwrap();
        assert_eq!(payload.state_value.as_integer(), 1);
        assert_eq!(StateValue::Float(3.9).as_integer(), 3);
        assert_eq!(StateValue::Integer(-2).as_integer(), -2);
    }
}
