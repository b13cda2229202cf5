//! System-wide default constants.
//!
//! Values match the field deployments the monitors were tuned on. Grouped by
//! subsystem for easy discovery.

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "LINEWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "linewatch.toml";

// ============================================================================
// Detection
// ============================================================================

/// Model window for electrical integral / inrush detectors (cycles).
pub const ELECTRICAL_MODEL_WINDOW_SIZE: usize = 25;

/// Anomaly-ratio window for electrical detectors (cycles).
pub const ELECTRICAL_ANOMALY_LIST_SIZE: usize = 25;

/// Model window for vibration detectors (readings).
///
/// Vibration readings arrive far more often than electrical cycles complete.
pub const VIBRATION_MODEL_WINDOW_SIZE: usize = 100;

/// Anomaly-ratio window for vibration detectors (readings).
pub const VIBRATION_ANOMALY_LIST_SIZE: usize = 100;

/// Sigma-band floor; 0 disables it.
pub const SIGMA_FLOOR_LIMIT: f64 = 0.0;

/// Windows above this size are accepted but warned about.
pub const LARGE_WINDOW_WARNING: usize = 10_000;

// ============================================================================
// Inrush Extraction
// ============================================================================

/// Minimum current for a local maximum to count as a peak (A).
pub const CURRENT_PEAK_HEIGHT: f64 = 1.0;

/// Which peak of the cycle is the inrush current (1-indexed).
pub const CURRENT_PEAK_NUMBER: usize = 1;

// ============================================================================
// InfluxDB Writer
// ============================================================================

pub const INFLUX_PORT: u16 = 8086;

/// Points per write request.
pub const INFLUX_BATCH_SIZE: usize = 500;

/// Idle flush interval (ms).
pub const INFLUX_FLUSH_INTERVAL_MS: u64 = 1_000;

/// Maximum random delay before each flush (ms).
pub const INFLUX_JITTER_INTERVAL_MS: u64 = 0;

// ============================================================================
// Processing Loop
// ============================================================================

/// Log a progress line every N messages.
pub const PROGRESS_LOG_INTERVAL: u64 = 100;
