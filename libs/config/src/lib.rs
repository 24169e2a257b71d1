//! # Calibrator Configuration
//!
//! Layered configuration for the calibrator service: a base TOML file, an
//! optional per-environment overlay and `CALIBRATOR_` environment variables.
//!
//! ## Usage
//!
//! ```no_run
//! use calibrator_config::CalibratorConfig;
//! use std::path::Path;
//!
//! let config = CalibratorConfig::load(Some(Path::new("config/calibrator.toml")), Some("staging"))?;
//! println!("minimum base retention: {}", config.vault.minimum_base);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod calibrator_config;
pub mod defaults;

// Re-export commonly used types
pub use calibrator_config::{
    load_config, CalibratorConfig, EngineConfig, GlobalConfig, LogFormat, VaultSettings,
};
