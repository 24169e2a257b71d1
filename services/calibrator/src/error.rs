//! Calibration Error Types
//!
//! Every error aborts the whole calibration; a failed `calibrate` leaves the
//! pool and all balances exactly as they were. Nothing is retried here.

use calibrator_amm::{AmmError, Address, U256};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CalibrationError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    /// Math failures from the AMM library
    #[error(transparent)]
    Amm(#[from] AmmError),

    /// A balance or allowance below what a step needs
    #[error("Insufficient liquidity: {context} needs {needed}, {available} available")]
    InsufficientLiquidity {
        context: String,
        needed: U256,
        available: U256,
    },

    /// Vault mode without the allowance the operator needs
    #[error("Allowance not granted: vault {owner:?} approved {granted} of {needed} (token {token:?}) for {spender:?}")]
    AllowanceNotGranted {
        token: Address,
        owner: Address,
        spender: Address,
        needed: U256,
        granted: U256,
    },

    /// A pool result differed from the planned one
    #[error("Execution diverged from plan at {step}: expected {expected}, got {actual}")]
    Divergence {
        step: &'static str,
        expected: U256,
        actual: U256,
    },

    #[error("Unknown AMM flavor: {0}")]
    UnknownFlavor(String),

    #[error("Pool needs two distinct tokens, got {0:?} twice")]
    IdenticalTokens(Address),
}

/// Error kinds reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidTarget,
    InsufficientLiquidity,
    DivisionByZero,
    PrecisionLoss,
    AllowanceNotGranted,
    Other,
}

impl CalibrationError {
    pub fn insufficient(context: impl Into<String>, needed: U256, available: U256) -> Self {
        Self::InsufficientLiquidity {
            context: context.into(),
            needed,
            available,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Amm(AmmError::InvalidTarget { .. }) => ErrorKind::InvalidTarget,
            Self::Amm(AmmError::DivisionByZero { .. }) => ErrorKind::DivisionByZero,
            Self::Amm(AmmError::PrecisionLoss { .. }) => ErrorKind::PrecisionLoss,
            Self::Amm(AmmError::InsufficientLiquidity { .. }) | Self::InsufficientLiquidity { .. } => {
                ErrorKind::InsufficientLiquidity
            }
            Self::AllowanceNotGranted { .. } => ErrorKind::AllowanceNotGranted,
            _ => ErrorKind::Other,
        }
    }
}
