//! Default values for calibrator configuration

/// Base configuration file, relative to the working directory
pub const CONFIG_PATH: &str = "config/calibrator.toml";

/// Directory holding `<environment>.toml` overlays, next to the base file
pub const ENVIRONMENTS_DIR: &str = "environments";

/// Prefix of environment variable overrides (`CALIBRATOR_VAULT__MINIMUM_BASE`)
pub const ENV_PREFIX: &str = "CALIBRATOR";

pub const LOG_LEVEL: &str = "info";

/// Flavor tag used when none is configured
pub const FLAVOR: &str = "UNI";

/// Low bits of the default operator account address
pub const OPERATOR_ID: u64 = 0xca11b;

/// Base-denominated liquidity left in the pool; none unless configured
pub const MINIMUM_BASE: u64 = 0;
