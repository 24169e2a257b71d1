//! Pool types and the read interface onto a constant-product pool
//!
//! [`PoolSnapshot`] replays the pair's own state transitions (mint, burn,
//! swap, protocol fee accrual) so a caller can simulate a sequence of pool
//! operations without touching the pool.

use crate::error::{AmmError, Result};
use crate::v2_math::{narrow, V2Math, MINIMUM_LIQUIDITY};
use ethers_core::types::{Address, U256, U512};
use serde::{Deserialize, Serialize};

/// A pool oriented as base/quote
///
/// `pair` is the pool's own address, which is also the address of its LP
/// token. `base` and `quote` are the two asset tokens in caller orientation,
/// independent of how the pool orders them internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub pair: Address,
    pub base: Address,
    pub quote: Address,
}

impl PoolKey {
    pub fn new(pair: Address, base: Address, quote: Address) -> Self {
        Self { pair, base, quote }
    }
}

/// Pool reserves oriented as base/quote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReserves {
    #[serde(with = "crate::serde_u256")]
    pub base: U256,
    #[serde(with = "crate::serde_u256")]
    pub quote: U256,
}

impl PoolReserves {
    pub fn new(base: U256, quote: U256) -> Self {
        Self { base, quote }
    }

    /// Constant-product invariant `base * quote`
    pub fn invariant(&self) -> U512 {
        self.base.full_mul(self.quote)
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_zero() || self.quote.is_zero()
    }

    /// `(reserve_in, reserve_out)` for a swap in the given direction
    pub fn directional(&self, base_to_quote: bool) -> (U256, U256) {
        if base_to_quote {
            (self.base, self.quote)
        } else {
            (self.quote, self.base)
        }
    }
}

/// Liquidity minted by a deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintOutcome {
    pub liquidity: U256,
    /// Minted to the protocol fee recipient before the deposit
    pub fee_liquidity: U256,
    /// Locked to the zero address on a first mint
    pub locked_liquidity: U256,
}

/// Amounts paid out by a burn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnOutcome {
    pub amount_base: U256,
    pub amount_quote: U256,
    pub fee_liquidity: U256,
}

/// Reserves, LP supply and the protocol fee checkpoint of one pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub reserves: PoolReserves,
    pub total_supply: U256,
    pub k_last: U256,
    /// Protocol fee divisor, `None` while the protocol fee is off
    pub protocol_fee_divisor: Option<u32>,
}

impl PoolSnapshot {
    /// Accrue the protocol fee the pair mints ahead of every mint and burn
    fn mint_protocol_fee(&mut self) -> Result<U256> {
        match self.protocol_fee_divisor {
            Some(divisor) => {
                let fee = V2Math::protocol_fee_liquidity(
                    &self.reserves,
                    self.total_supply,
                    self.k_last,
                    divisor,
                )?;
                self.total_supply += fee;
                Ok(fee)
            }
            None => {
                self.k_last = U256::zero();
                Ok(U256::zero())
            }
        }
    }

    fn refresh_k_last(&mut self) -> Result<()> {
        if self.protocol_fee_divisor.is_some() {
            self.k_last = narrow(self.reserves.invariant(), "k_last")?;
        }
        Ok(())
    }

    /// Burn `liquidity` for its pro-rata share of both reserves
    pub fn burn(&mut self, liquidity: U256) -> Result<BurnOutcome> {
        if liquidity > self.total_supply {
            return Err(AmmError::insufficient_liquidity("burn exceeds total supply"));
        }
        let fee_liquidity = self.mint_protocol_fee()?;
        let (amount_base, amount_quote) =
            V2Math::burn_amounts(liquidity, &self.reserves, self.total_supply)?;
        self.total_supply -= liquidity;
        self.reserves.base -= amount_base;
        self.reserves.quote -= amount_quote;
        self.refresh_k_last()?;
        Ok(BurnOutcome {
            amount_base,
            amount_quote,
            fee_liquidity,
        })
    }

    /// Mint liquidity for amounts already sized to the pool ratio
    pub fn mint(&mut self, amount_base: U256, amount_quote: U256) -> Result<MintOutcome> {
        let fee_liquidity = self.mint_protocol_fee()?;
        let liquidity = V2Math::liquidity_minted(
            amount_base,
            amount_quote,
            &self.reserves,
            self.total_supply,
        )?;
        let locked_liquidity = if self.total_supply.is_zero() {
            U256::from(MINIMUM_LIQUIDITY)
        } else {
            U256::zero()
        };
        self.total_supply += locked_liquidity + liquidity;
        self.reserves.base += amount_base;
        self.reserves.quote += amount_quote;
        self.refresh_k_last()?;
        Ok(MintOutcome {
            liquidity,
            fee_liquidity,
            locked_liquidity,
        })
    }

    /// Swap `amount_in` through the pool, returning the amount paid out
    pub fn swap(&mut self, amount_in: U256, base_to_quote: bool) -> Result<U256> {
        let (reserve_in, reserve_out) = self.reserves.directional(base_to_quote);
        let amount_out = V2Math::get_amount_out(amount_in, reserve_in, reserve_out)?;
        if amount_out.is_zero() {
            return Err(AmmError::precision_loss("swap output rounds to zero"));
        }
        if base_to_quote {
            self.reserves.base += amount_in;
            self.reserves.quote -= amount_out;
        } else {
            self.reserves.quote += amount_in;
            self.reserves.base -= amount_out;
        }
        Ok(amount_out)
    }

    /// Amounts a router deposit actually uses for the desired amounts
    pub fn deposit_amounts(&self, base_desired: U256, quote_desired: U256) -> Result<(U256, U256)> {
        if self.reserves.base.is_zero() && self.reserves.quote.is_zero() {
            return Ok((base_desired, quote_desired));
        }
        let quote_optimal = V2Math::quote(base_desired, self.reserves.base, self.reserves.quote)?;
        if quote_optimal <= quote_desired {
            return Ok((base_desired, quote_optimal));
        }
        let base_optimal = V2Math::quote(quote_desired, self.reserves.quote, self.reserves.base)?;
        Ok((base_optimal, quote_desired))
    }
}

/// Read access to pool state
pub trait PoolView {
    /// Reserves oriented by `pool.base` / `pool.quote`
    fn get_reserves(&self, pool: &PoolKey) -> Result<PoolReserves>;

    fn total_supply(&self, pool: &PoolKey) -> Result<U256>;

    fn k_last(&self, pool: &PoolKey) -> Result<U256>;

    /// `None` while the factory's protocol fee is switched off
    fn protocol_fee_divisor(&self, pool: &PoolKey) -> Result<Option<u32>>;

    fn snapshot(&self, pool: &PoolKey) -> Result<PoolSnapshot> {
        Ok(PoolSnapshot {
            reserves: self.get_reserves(pool)?,
            total_supply: self.total_supply(pool)?,
            k_last: self.k_last(pool)?,
            protocol_fee_divisor: self.protocol_fee_divisor(pool)?,
        })
    }
}
