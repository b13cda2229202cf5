//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Unknown keys are found in a first pass over the raw `toml::Value` tree and
//! reported as warnings with "did you mean?" suggestions; serde then parses
//! the file as usual. Range checks run on the parsed (and env-overridden)
//! config and split into fatal errors and warnings.

use std::collections::HashSet;

use super::app_config::AppConfig;
use super::defaults::LARGE_WINDOW_WARNING;
use crate::detection::MIN_MODEL_SIZE;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of [`AppConfig`].
///
/// Kept by hand; a new config field must be added here as well.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [identity]
        "identity",
        "identity.line_name",
        "identity.machine_name",
        "identity.device_name",
        "identity.sensor_name",
        // [detection]
        "detection",
        "detection.policy",
        "detection.model_window_size",
        "detection.anomaly_list_size",
        "detection.z_score_threshold",
        "detection.sigma_floor_limit",
        // [inrush]
        "inrush",
        "inrush.peak_height",
        "inrush.peak_number",
        // [influx]
        "influx",
        "influx.host",
        "influx.port",
        "influx.bucket",
        "influx.org",
        "influx.token",
        "influx.batch_size",
        "influx.flush_interval_ms",
        "influx.jitter_interval_ms",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Collect all dotted key paths of a `toml::Value` tree.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest known key within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation
// ============================================================================

/// Warnings for every unknown key in a raw TOML string.
///
/// Never fails; syntax errors are left for serde to report.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Range checks on a parsed config.
///
/// Returns (errors, warnings). Errors are values the detectors cannot run
/// with; warnings are legal but probably unintended.
pub fn validate_ranges(config: &AppConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let d = &config.detection;

    if let Some(size) = d.model_window_size {
        if size < MIN_MODEL_SIZE {
            errors.push(format!(
                "detection.model_window_size = {size} must be at least {MIN_MODEL_SIZE}"
            ));
        } else if size > LARGE_WINDOW_WARNING {
            warnings.push(ValidationWarning {
                field: "detection.model_window_size".to_string(),
                message: format!(
                    "detection.model_window_size = {size} is very large; the model needs {size} readings before it decides"
                ),
                suggestion: None,
            });
        }
    }

    if let Some(size) = d.anomaly_list_size {
        if size == 0 {
            errors.push("detection.anomaly_list_size must be at least 1".to_string());
        } else if size > LARGE_WINDOW_WARNING {
            warnings.push(ValidationWarning {
                field: "detection.anomaly_list_size".to_string(),
                message: format!("detection.anomaly_list_size = {size} is very large"),
                suggestion: None,
            });
        }
    }

    if !d.z_score_threshold.is_finite() || d.z_score_threshold <= 0.0 {
        errors.push(format!(
            "detection.z_score_threshold = {} must be a positive number",
            d.z_score_threshold
        ));
    } else if d.z_score_threshold < 1.0 {
        warnings.push(ValidationWarning {
            field: "detection.z_score_threshold".to_string(),
            message: format!(
                "detection.z_score_threshold = {} will flag most ordinary readings",
                d.z_score_threshold
            ),
            suggestion: None,
        });
    }

    if !d.sigma_floor_limit.is_finite() || d.sigma_floor_limit < 0.0 {
        errors.push(format!(
            "detection.sigma_floor_limit = {} must be zero or positive",
            d.sigma_floor_limit
        ));
    }

    let i = &config.inrush;
    if i.peak_number == 0 {
        errors.push("inrush.peak_number must be at least 1 (peaks are counted from 1)".to_string());
    }
    if !i.peak_height.is_finite() {
        errors.push(format!("inrush.peak_height = {} must be finite", i.peak_height));
    }

    let ix = &config.influx;
    if ix.batch_size == 0 {
        errors.push("influx.batch_size must be at least 1".to_string());
    }
    if ix.flush_interval_ms == 0 {
        errors.push("influx.flush_interval_ms must be at least 1".to_string());
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
