//! AMM Math Error Types
//!
//! Every fallible calculation in this crate reports one of these variants.
//! None of them are retried: they describe inputs that cannot produce a
//! valid result at the current pool depth.

use ethers_core::types::{Address, U256};
use thiserror::Error;

/// Result alias for AMM math
pub type Result<T> = std::result::Result<T, AmmError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmmError {
    /// Target ratio with a zero component
    #[error("Invalid target ratio: {base}:{quote}")]
    InvalidTarget { base: U256, quote: U256 },

    #[error("Division by zero in {operation}")]
    DivisionByZero { operation: &'static str },

    /// Result does not fit in 256 bits
    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: &'static str },

    /// A non-zero input rounded down to a zero output
    #[error("Precision loss: {context}")]
    PrecisionLoss { context: &'static str },

    #[error("Insufficient liquidity: {context}")]
    InsufficientLiquidity { context: &'static str },

    /// No amount in the searched range crosses the price threshold
    #[error("Price {price_quote}/{price_base} unreachable within [{start}, {end}]")]
    PriceUnreachable {
        price_base: U256,
        price_quote: U256,
        start: U256,
        end: U256,
    },

    #[error("Unknown pool {pair:?}")]
    UnknownPool { pair: Address },

    #[error("Invalid search range: start {start} > end {end}")]
    InvalidRange { start: U256, end: U256 },
}

impl AmmError {
    pub fn division_by_zero(operation: &'static str) -> Self {
        Self::DivisionByZero { operation }
    }

    pub fn overflow(operation: &'static str) -> Self {
        Self::Overflow { operation }
    }

    pub fn precision_loss(context: &'static str) -> Self {
        Self::PrecisionLoss { context }
    }

    pub fn insufficient_liquidity(context: &'static str) -> Self {
        Self::InsufficientLiquidity { context }
    }
}
