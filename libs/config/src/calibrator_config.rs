//! Calibrator Configuration Module
//!
//! Loads configuration from a base TOML file, an optional per-environment
//! overlay and `CALIBRATOR_` environment variables, in that order of
//! precedence (later sources win).

use crate::defaults;
use anyhow::{Context, Result};
use calibrator_amm::{serde_u256, Address, SolverMode, U256};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main calibrator configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct CalibratorConfig {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Engine settings
    #[serde(default)]
    pub calibrator: EngineConfig,

    /// Vault accounting
    #[serde(default)]
    pub vault: VaultSettings,
}

/// Log output format
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Global configuration settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// The engine's own account; sources grant it allowances
    pub operator: Address,
    /// AMM flavor tag, e.g. `UNI` or `MDEX`
    pub flavor: String,
    pub solver: SolverMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct VaultSettings {
    /// Custodial account used instead of the caller when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Base-denominated liquidity left in the pool on every calibration
    #[serde(with = "serde_u256")]
    pub minimum_base: U256,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operator: Address::from_low_u64_be(defaults::OPERATOR_ID),
            flavor: defaults::FLAVOR.to_string(),
            solver: SolverMode::default(),
        }
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: None,
            minimum_base: U256::from(defaults::MINIMUM_BASE),
        }
    }
}

impl CalibratorConfig {
    /// Load configuration from files with environment overrides
    ///
    /// The environment overlay is looked up as
    /// `<base dir>/environments/<environment>.toml`.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new(defaults::CONFIG_PATH));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(PathBuf::new)
                .join(defaults::ENVIRONMENTS_DIR)
                .join(format!("{env}.toml"));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (CALIBRATOR_VAULT__MINIMUM_BASE)
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder
            .build()
            .with_context(|| format!("Failed to build configuration from {base:?}"))?;

        let loaded: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        debug!(?loaded, "Configuration loaded");
        Ok(loaded)
    }

    /// Render as TOML, e.g. to show the effective configuration
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// Convenience function to load configuration from the default location
pub fn load_config(environment: Option<&str>) -> Result<CalibratorConfig> {
    CalibratorConfig::load(None, environment)
}
