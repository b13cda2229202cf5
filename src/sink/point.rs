//! Time-series points and their line-protocol rendering.

use std::fmt::Write as _;

use serde::Serialize;

use super::SinkError;

/// Typed field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Bool(bool),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One record: measurement, ordered tags, typed fields, millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp_ms: i64,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ms,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Add a field. Non-finite floats are dropped; line protocol cannot carry them.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        if let FieldValue::Float(f) = value {
            if !f.is_finite() {
                return self;
            }
        }
        self.fields.push((key.into(), value));
        self
    }

    /// Add a field only when `value` is present.
    pub fn field_opt(self, key: impl Into<String>, value: Option<impl Into<FieldValue>>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn field_value(&self, key: &str) -> Option<FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Render as InfluxDB line protocol (ms precision).
    pub fn to_line_protocol(&self) -> Result<String, SinkError> {
        if self.fields.is_empty() {
            return Err(SinkError::EmptyPoint(self.measurement.clone()));
        }

        let mut line = String::with_capacity(128 + 32 * self.fields.len());
        escape_into(&mut line, &self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            // writing to a String cannot fail
            let _ = match value {
                FieldValue::Float(f) => write!(line, "{f}"),
                FieldValue::Integer(i) => write!(line, "{i}i"),
                FieldValue::Bool(b) => write!(line, "{b}"),
            };
        }

        let _ = write!(line, " {}", self.timestamp_ms);
        Ok(line)
    }
}

fn escape_into(out: &mut String, raw: &str, specials: &[char]) {
    for c in raw.chars() {
        if c == '\\' || specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
