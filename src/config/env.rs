//! Environment-variable overrides
//!
//! Deployments configure each monitor container through the environment, so
//! every setting a site usually changes has a variable. Overrides are applied
//! after the TOML file. A variable that is set but unparseable is an error.

use std::str::FromStr;

use super::app_config::{AppConfig, ConfigError};
use crate::detection::PolicyKind;

/// Apply all known overrides, returning the variables that were set.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Vec<&'static str>, ConfigError> {
    let mut applied = Vec::new();
    let mut lookup = |var: &'static str| {
        let value = env(var).filter(|v| !v.trim().is_empty());
        if value.is_some() {
            applied.push(var);
        }
        value
    };

    // identity
    if let Some(v) = lookup("LINE_NAME") {
        config.identity.line_name = v;
    }
    if let Some(v) = lookup("MACHINE_NAME") {
        config.identity.machine_name = v;
    }
    if let Some(v) = lookup("DEVICE_NAME") {
        config.identity.device_name = v;
    }
    if let Some(v) = lookup("SENSOR_NAME") {
        config.identity.sensor_name = v;
    }

    // detection
    if let Some(v) = lookup("DETECTION_POLICY") {
        config.detection.policy = v
            .parse::<PolicyKind>()
            .map_err(|reason| ConfigError::Env { var: "DETECTION_POLICY", value: v.clone(), reason })?;
    }
    if let Some(v) = lookup("MODEL_WINDOW_SIZE") {
        config.detection.model_window_size = Some(parse_var("MODEL_WINDOW_SIZE", &v)?);
    }
    if let Some(v) = lookup("ANOMALY_LIST_SIZE") {
        config.detection.anomaly_list_size = Some(parse_var("ANOMALY_LIST_SIZE", &v)?);
    }
    if let Some(v) = lookup("Z_SCORE_THRESHOLD") {
        config.detection.z_score_threshold = parse_var("Z_SCORE_THRESHOLD", &v)?;
    }
    if let Some(v) = lookup("THRESH_STD_DEV_LIMIT") {
        config.detection.sigma_floor_limit = parse_var("THRESH_STD_DEV_LIMIT", &v)?;
    }

    // inrush
    if let Some(v) = lookup("CURRENT_PEAK_HEIGHT") {
        config.inrush.peak_height = parse_var("CURRENT_PEAK_HEIGHT", &v)?;
    }
    if let Some(v) = lookup("CURRENT_PEAK_NUMBER") {
        config.inrush.peak_number = parse_var("CURRENT_PEAK_NUMBER", &v)?;
    }

    // influx
    if let Some(v) = lookup("INFLUX_HOST") {
        config.influx.host = v;
    }
    if let Some(v) = lookup("INFLUX_PORT") {
        config.influx.port = parse_var("INFLUX_PORT", &v)?;
    }
    if let Some(v) = lookup("INFLUX_BUCKET_NAME") {
        config.influx.bucket = v;
    }
    if let Some(v) = lookup("INFLUX_ORG") {
        config.influx.org = v;
    }
    if let Some(v) = lookup("INFLUX_TOKEN") {
        config.influx.token = v;
    }
    if let Some(v) = lookup("INFLUX_BATCH_SIZE") {
        config.influx.batch_size = parse_var("INFLUX_BATCH_SIZE", &v)?;
    }
    if let Some(v) = lookup("INFLUX_FLUSH_INTERVAL") {
        config.influx.flush_interval_ms = parse_var("INFLUX_FLUSH_INTERVAL", &v)?;
    }
    if let Some(v) = lookup("INFLUX_JITTER_INTERVAL") {
        config.influx.jitter_interval_ms = parse_var("INFLUX_JITTER_INTERVAL", &v)?;
    }

    Ok(applied)
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Env {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_apply_and_are_reported() {
        let mut config = AppConfig::default();
        let env = env_of(&[
            ("LINE_NAME", "L2"),
            ("MODEL_WINDOW_SIZE", "50"),
            ("Z_SCORE_THRESHOLD", "3.5"),
            ("DETECTION_POLICY", "sigma_band"),
            ("INFLUX_FLUSH_INTERVAL", "250"),
        ]);
        let applied = apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.identity.line_name, "L2");
        assert_eq!(config.detection.model_window_size, Some(50));
        assert_eq!(config.detection.z_score_threshold, 3.5);
        assert_eq!(config.detection.policy, PolicyKind::SigmaBand);
        assert_eq!(config.influx.flush_interval_ms, 250);
        assert_eq!(applied.len(), 5);
    }

    #[test]
    fn test_blank_value_is_ignored() {
        let mut config = AppConfig::default();
        let applied = apply_env_overrides(&mut config, &env_of(&[("LINE_NAME", "  ")])).unwrap();
        assert!(applied.is_empty());
        assert!(config.identity.line_name.is_empty());
    }

    #[test]
    fn test_unparseable_value_is_error() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(&mut config, &env_of(&[("CURRENT_PEAK_NUMBER", "first")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "CURRENT_PEAK_NUMBER", .. }));
    }

    #[test]
    fn test_unknown_policy_is_error() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(&mut config, &env_of(&[("DETECTION_POLICY", "median")]))
            .unwrap_err();
        assert!(err.to_string().contains("DETECTION_POLICY"));
    }
}
