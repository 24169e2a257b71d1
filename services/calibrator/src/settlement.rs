//! Settlement accounting and the planned operation sequence

use crate::error::{CalibrationError, Result};
use calibrator_amm::{price_of, serde_u256, Address, Decimal, PoolKey, PoolReserves, RebalancePlan, U256};
use serde::{Deserialize, Serialize};

/// One of the two pool assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    Base,
    Quote,
}

impl Asset {
    pub fn token(&self, pool: &PoolKey) -> Address {
        match self {
            Self::Base => pool.base,
            Self::Quote => pool.quote,
        }
    }
}

/// Accounting result of a calibration
///
/// `required_*` must additionally be supplied by the source account,
/// `leftover_*` is returned to the recipient. At most one of each pair is
/// non-zero; both are zero when the flows of an asset cancel exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    #[serde(with = "serde_u256")]
    pub required_base: U256,
    #[serde(with = "serde_u256")]
    pub leftover_base: U256,
    #[serde(with = "serde_u256")]
    pub required_quote: U256,
    #[serde(with = "serde_u256")]
    pub leftover_quote: U256,
    /// LP position after calibration: retained plus newly minted
    #[serde(with = "serde_u256")]
    pub leftover_liquidity: U256,
    #[serde(with = "serde_u256")]
    pub reserve_base_after: U256,
    #[serde(with = "serde_u256")]
    pub reserve_quote_after: U256,
}

impl Settlement {
    pub fn reserves_after(&self) -> PoolReserves {
        PoolReserves::new(self.reserve_base_after, self.reserve_quote_after)
    }

    /// Pool price (`quote / base`) after calibration, truncated to 20 places
    pub fn outcome_price(&self) -> Result<Decimal> {
        Ok(price_of(&self.reserves_after())?)
    }

    pub fn is_no_op(&self) -> bool {
        self.required_base.is_zero()
            && self.leftover_base.is_zero()
            && self.required_quote.is_zero()
            && self.leftover_quote.is_zero()
    }

    /// Rejects a settlement that both requires and returns the same asset
    pub fn ensure_consistent(&self) -> Result<()> {
        if !self.required_base.is_zero() && !self.leftover_base.is_zero() {
            return Err(CalibrationError::Divergence {
                step: "base settlement",
                expected: U256::zero(),
                actual: self.required_base.min(self.leftover_base),
            });
        }
        if !self.required_quote.is_zero() && !self.leftover_quote.is_zero() {
            return Err(CalibrationError::Divergence {
                step: "quote settlement",
                expected: U256::zero(),
                actual: self.required_quote.min(self.leftover_quote),
            });
        }
        Ok(())
    }
}

/// A single step replayed against the AMM, with its expected results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PoolOperation {
    /// Move LP from the source account to the operator
    CollectLiquidity {
        #[serde(with = "serde_u256")]
        liquidity: U256,
    },
    Withdraw {
        #[serde(with = "serde_u256")]
        liquidity: U256,
        #[serde(with = "serde_u256")]
        amount_base: U256,
        #[serde(with = "serde_u256")]
        amount_quote: U256,
    },
    /// Pull a required amount from the source account
    Collect {
        asset: Asset,
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    Swap {
        base_to_quote: bool,
        #[serde(with = "serde_u256")]
        amount_in: U256,
        #[serde(with = "serde_u256")]
        amount_out: U256,
    },
    /// Re-add liquidity, minting to the recipient
    Deposit {
        #[serde(with = "serde_u256")]
        amount_base: U256,
        #[serde(with = "serde_u256")]
        amount_quote: U256,
        #[serde(with = "serde_u256")]
        liquidity: U256,
    },
    /// Send a leftover amount to the recipient
    Return {
        asset: Asset,
        #[serde(with = "serde_u256")]
        amount: U256,
    },
}

/// Settlement plus the operations that realise it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPlan {
    pub settlement: Settlement,
    pub swap: RebalancePlan,
    /// LP withdrawn from the source
    #[serde(with = "serde_u256")]
    pub liquidity_withdrawn: U256,
    /// LP left with the source to honour the minimum base
    #[serde(with = "serde_u256")]
    pub liquidity_retained: U256,
    pub operations: Vec<PoolOperation>,
}
