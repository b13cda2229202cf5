//! Application configuration - identity, detection, inrush and InfluxDB settings
//!
//! Every field has a default so an empty (or absent) file is valid TOML.
//! Window sizes left unset resolve to the defaults of the selected monitor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use super::env::apply_env_overrides;
use super::validation;
use crate::detection::{DetectorSpec, PolicyKind, DEFAULT_Z_SCORE_THRESHOLD};
use crate::sink::InfluxSettings;

// ============================================================================
// Monitor Kind
// ============================================================================

/// Which monitor a process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    Electrical,
    Vibration,
    States,
}

impl std::fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Electrical => write!(f, "electrical"),
            Self::Vibration => write!(f, "vibration"),
            Self::States => write!(f, "states"),
        }
    }
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with [`AppConfig::load`] which searches:
/// 1. `$LINEWATCH_CONFIG`
/// 2. `./linewatch.toml`
/// 3. Built-in defaults
///
/// and then applies environment-variable overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub inrush: InrushConfig,

    #[serde(default)]
    pub influx: InfluxConfig,
}

impl AppConfig {
    /// Standard search order, then environment overrides, then range checks.
    ///
    /// A file that exists but cannot be parsed is an error, not a fallback:
    /// running with silently different detection settings is worse than not
    /// starting.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None, |key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with an explicit path and environment lookup.
    pub fn load_with(
        explicit_path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match Self::locate(explicit_path, &env) {
            Some(path) => {
                let config = Self::load_from_file(&path)?;
                info!(path = %path.display(), "Loaded config");
                config
            }
            None => {
                info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
                Self::default()
            }
        };

        let overridden = apply_env_overrides(&mut config, &env)?;
        if !overridden.is_empty() {
            info!(variables = ?overridden, "Applied environment overrides");
        }

        config.validate()?;
        Ok(config)
    }

    fn locate(explicit_path: Option<&Path>, env: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        if let Some(path) = explicit_path {
            return Some(path.to_path_buf());
        }

        if let Some(path) = env(defaults::CONFIG_PATH_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                return Some(p);
            }
            warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_PATH_ENV);
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Load from a specific TOML file path (no environment overrides).
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse TOML text, warning about unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))
    }

    /// Range checks independent of the monitor being run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = validation::validate_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Values that only become required once the monitor and output are known.
    pub fn validate_for(&self, kind: MonitorKind, dry_run: bool) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let id = &self.identity;

        let mut require = |value: &str, key: &str, env_var: &str| {
            if value.trim().is_empty() {
                errors.push(format!("{key} is required (set it in the config file or {env_var})"));
            }
        };

        require(&id.line_name, "identity.line_name", "LINE_NAME");
        require(&id.machine_name, "identity.machine_name", "MACHINE_NAME");
        match kind {
            MonitorKind::Electrical => require(&id.device_name, "identity.device_name", "DEVICE_NAME"),
            MonitorKind::Vibration => require(&id.sensor_name, "identity.sensor_name", "SENSOR_NAME"),
            MonitorKind::States => {}
        }

        if !dry_run {
            let ix = &self.influx;
            require(&ix.host, "influx.host", "INFLUX_HOST");
            require(&ix.bucket, "influx.bucket", "INFLUX_BUCKET_NAME");
            require(&ix.org, "influx.org", "INFLUX_ORG");
            require(&ix.token, "influx.token", "INFLUX_TOKEN");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Detector parameters for `kind`, with window defaults filled in.
    pub fn detector_spec(&self, kind: MonitorKind) -> DetectorSpec {
        let d = &self.detection;
        let (model_default, list_default) = match kind {
            MonitorKind::Vibration => (
                defaults::VIBRATION_MODEL_WINDOW_SIZE,
                defaults::VIBRATION_ANOMALY_LIST_SIZE,
            ),
            MonitorKind::Electrical | MonitorKind::States => (
                defaults::ELECTRICAL_MODEL_WINDOW_SIZE,
                defaults::ELECTRICAL_ANOMALY_LIST_SIZE,
            ),
        };
        DetectorSpec {
            model_size: d.model_window_size.unwrap_or(model_default),
            anomaly_list_size: d.anomaly_list_size.unwrap_or(list_default),
            policy: d.policy,
            z_score_threshold: d.z_score_threshold,
            sigma_floor_limit: d.sigma_floor_limit,
        }
    }

    pub fn influx_settings(&self) -> InfluxSettings {
        let ix = &self.influx;
        InfluxSettings {
            url: format!("http://{}:{}", ix.host, ix.port),
            org: ix.org.clone(),
            bucket: ix.bucket.clone(),
            token: ix.token.clone(),
            batch_size: ix.batch_size,
            flush_interval_ms: ix.flush_interval_ms,
            jitter_interval_ms: ix.jitter_interval_ms,
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Env { var, value, reason } => {
                write!(f, "Environment variable {var}='{value}' is invalid: {reason}")
            }
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sections
// ============================================================================

/// Which line / machine / device this process listens for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub line_name: String,

    #[serde(default)]
    pub machine_name: String,

    /// Electrical device (electrical monitor)
    #[serde(default)]
    pub device_name: String,

    /// Vibration sensor (vibration monitor)
    #[serde(default)]
    pub sensor_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub policy: PolicyKind,

    /// Model window; unset uses the monitor's default.
    #[serde(default)]
    pub model_window_size: Option<usize>,

    /// Anomaly-ratio window; unset uses the monitor's default.
    #[serde(default)]
    pub anomaly_list_size: Option<usize>,

    #[serde(default = "default_z_score_threshold")]
    pub z_score_threshold: f64,

    /// Sigma-band floor; 0 disables it.
    #[serde(default = "default_sigma_floor_limit")]
    pub sigma_floor_limit: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            model_window_size: None,
            anomaly_list_size: None,
            z_score_threshold: default_z_score_threshold(),
            sigma_floor_limit: default_sigma_floor_limit(),
        }
    }
}

fn default_z_score_threshold() -> f64 {
    DEFAULT_Z_SCORE_THRESHOLD
}

fn default_sigma_floor_limit() -> f64 {
    defaults::SIGMA_FLOOR_LIMIT
}

/// Inrush current extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InrushConfig {
    #[serde(default = "default_peak_height")]
    pub peak_height: f64,

    /// Which peak is the inrush (1-indexed).
    #[serde(default = "default_peak_number")]
    pub peak_number: usize,
}

impl Default for InrushConfig {
    fn default() -> Self {
        Self {
            peak_height: default_peak_height(),
            peak_number: default_peak_number(),
        }
    }
}

fn default_peak_height() -> f64 {
    defaults::CURRENT_PEAK_HEIGHT
}

fn default_peak_number() -> usize {
    defaults::CURRENT_PEAK_NUMBER
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluxConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_influx_port")]
    pub port: u16,

    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub org: String,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    #[serde(default = "default_jitter_interval_ms")]
    pub jitter_interval_ms: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_influx_port(),
            bucket: String::new(),
            org: String::new(),
            token: String::new(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            jitter_interval_ms: default_jitter_interval_ms(),
        }
    }
}

fn default_influx_port() -> u16 {
    defaults::INFLUX_PORT
}

fn default_batch_size() -> usize {
    defaults::INFLUX_BATCH_SIZE
}

fn default_flush_interval_ms() -> u64 {
    defaults::INFLUX_FLUSH_INTERVAL_MS
}

fn default_jitter_interval_ms() -> u64 {
    defaults::INFLUX_JITTER_INTERVAL_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.detection.policy, PolicyKind::ZScore);
        assert_eq!(config.influx.batch_size, 500);
    }

    #[test]
    fn test_window_defaults_follow_monitor() {
        let config = AppConfig::default();
        let electrical = config.detector_spec(MonitorKind::Electrical);
        assert_eq!((electrical.model_size, electrical.anomaly_list_size), (25, 25));
        let vibration = config.detector_spec(MonitorKind::Vibration);
        assert_eq!((vibration.model_size, vibration.anomaly_list_size), (100, 100));
    }

    #[test]
    fn test_explicit_window_wins() {
        let config = AppConfig::from_toml_str(
            r#"
            [detection]
            policy = "sigma_band"
            model_window_size = 40
            sigma_floor_limit = 0.5
            "#,
        )
        .unwrap();
        let spec = config.detector_spec(MonitorKind::Vibration);
        assert_eq!(spec.model_size, 40);
        assert_eq!(spec.anomaly_list_size, 100);
        assert_eq!(spec.policy, PolicyKind::SigmaBand);
        assert_eq!(spec.sigma_floor_limit, 0.5);
    }

    #[test]
    fn test_required_identity_per_monitor() {
        let mut config = AppConfig::default();
        config.identity.line_name = "L1".into();
        config.identity.machine_name = "press".into();

        assert!(config.validate_for(MonitorKind::States, true).is_ok());
        let err = config.validate_for(MonitorKind::Electrical, true).unwrap_err();
        assert!(err.to_string().contains("identity.device_name"));
        let err = config.validate_for(MonitorKind::Vibration, true).unwrap_err();
        assert!(err.to_string().contains("SENSOR_NAME"));
    }

    #[test]
    fn test_influx_required_unless_dry_run() {
        let mut config = AppConfig::default();
        config.identity.line_name = "L1".into();
        config.identity.machine_name = "press".into();
        let err = config.validate_for(MonitorKind::States, false).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("influx.host"));
        assert!(text.contains("influx.token"));
    }

    #[test]
    fn test_influx_settings_url() {
        let mut config = AppConfig::default();
        config.influx.host = "influxdb".into();
        assert_eq!(config.influx_settings().url, "http://influxdb:8086");
    }

    #[test]
    fn test_parse_error_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[detection\npolicy = 1").unwrap();
        let err = AppConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(ref p, _) if p == &path));
    }

    #[test]
    fn test_load_with_explicit_path_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linewatch.toml");
        std::fs::write(&path, "[identity]\nline_name = \"L1\"\n").unwrap();

        let config = AppConfig::load_with(Some(&path), |key| match key {
            "MACHINE_NAME" => Some("press".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.identity.line_name, "L1");
        assert_eq!(config.identity.machine_name, "press");
    }
}
