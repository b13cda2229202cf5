//! Monitor Configuration
//!
//! One TOML file plus environment overrides, resolved once at startup and
//! passed by value into the monitors.
//!
//! ## Loading Order
//!
//! 1. `--config PATH` on the command line
//! 2. `LINEWATCH_CONFIG` environment variable (path to TOML file)
//! 3. `linewatch.toml` in the current working directory
//! 4. Built-in defaults
//!
//! Environment variables (`LINE_NAME`, `MODEL_WINDOW_SIZE`, `INFLUX_HOST`, ...)
//! are applied on top of whichever of these was used.
//!
//! ```ignore
//! let config = AppConfig::load()?;
//! config.validate_for(MonitorKind::Electrical, false)?;
//! let spec = config.detector_spec(MonitorKind::Electrical);
//! ```

mod app_config;
pub mod defaults;
mod env;
pub mod validation;

pub use app_config::*;
pub use env::apply_env_overrides;
