//! Uniswap V2 AMM math with exact integer calculations
//!
//! Every formula truncates exactly like the on-chain pair and router, so a
//! plan computed here reproduces the pool's own results wei for wei.
//! Products that can exceed 256 bits are carried in `U512`.

use crate::error::{AmmError, Result};
use crate::pool_traits::PoolReserves;
use ethers_core::types::{U256, U512};

/// Swap fee numerator (0.3% fee: 997/1000 of the input is traded)
pub const FEE_NUMERATOR: u64 = 997;
pub const FEE_DENOMINATOR: u64 = 1000;

/// Liquidity locked to the zero address on the first mint of a pool
pub const MINIMUM_LIQUIDITY: u64 = 1000;

/// V2 AMM math functions with zero precision loss
pub struct V2Math;

impl V2Math {
    /// Largest `r` with `r * r <= value`.
    ///
    /// Newton's iteration seeded with `2^ceil(bits/2)`, which is never below
    /// the root, so the sequence decreases monotonically onto the floor.
    pub fn integer_sqrt(value: U512) -> U512 {
        if value.is_zero() {
            return U512::zero();
        }
        let mut root = U512::one() << ((value.bits() + 1) / 2);
        loop {
            let next = (root + value / root) >> 1;
            if next >= root {
                return root;
            }
            root = next;
        }
    }

    /// Square root of a 512-bit value narrowed back to 256 bits (always fits)
    pub fn sqrt(value: U512) -> U256 {
        narrow(Self::integer_sqrt(value), "sqrt").unwrap_or_else(|_| U256::MAX)
    }

    /// `floor(a * b / c)` with a 512-bit intermediate
    pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256> {
        if c.is_zero() {
            return Err(AmmError::division_by_zero("mul_div"));
        }
        narrow(a.full_mul(b) / U512::from(c), "mul_div")
    }

    /// Exact output amount for a V2 swap
    ///
    /// `out = in * 997 * reserve_out / (reserve_in * 1000 + in * 997)`
    pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> Result<U256> {
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(AmmError::division_by_zero("get_amount_out"));
        }
        let amount_in_with_fee = U512::from(amount_in) * U512::from(FEE_NUMERATOR);
        let numerator = amount_in_with_fee
            .checked_mul(U512::from(reserve_out))
            .ok_or_else(|| AmmError::overflow("get_amount_out"))?;
        let denominator = U512::from(reserve_in) * U512::from(FEE_DENOMINATOR) + amount_in_with_fee;
        narrow(numerator / denominator, "get_amount_out")
    }

    /// Required input amount for a desired output (reverse calculation)
    ///
    /// The trailing `+ 1` rounds up so truncation never leaves the pool
    /// under-collateralized.
    pub fn get_amount_in(amount_out: U256, reserve_in: U256, reserve_out: U256) -> Result<U256> {
        if reserve_in.is_zero() || amount_out >= reserve_out {
            return Err(AmmError::division_by_zero("get_amount_in"));
        }
        let numerator = reserve_in
            .full_mul(amount_out)
            .checked_mul(U512::from(FEE_DENOMINATOR))
            .ok_or_else(|| AmmError::overflow("get_amount_in"))?;
        let denominator = U512::from(reserve_out - amount_out) * U512::from(FEE_NUMERATOR);
        let amount_in = narrow(numerator / denominator, "get_amount_in")?;
        amount_in
            .checked_add(U256::one())
            .ok_or_else(|| AmmError::overflow("get_amount_in"))
    }

    /// Equivalent amount of the other asset at the current reserve ratio
    pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256> {
        if reserve_a.is_zero() || reserve_b.is_zero() {
            return Err(AmmError::division_by_zero("quote"));
        }
        Self::mul_div(amount_a, reserve_b, reserve_a)
    }

    /// Liquidity minted for a deposit
    ///
    /// On an empty pool this is the geometric mean minus the locked
    /// [`MINIMUM_LIQUIDITY`]; otherwise the smaller pro-rata share.
    pub fn liquidity_minted(
        amount_base: U256,
        amount_quote: U256,
        reserves: &PoolReserves,
        total_supply: U256,
    ) -> Result<U256> {
        let liquidity = if total_supply.is_zero() {
            let root = Self::sqrt(amount_base.full_mul(amount_quote));
            root.checked_sub(U256::from(MINIMUM_LIQUIDITY))
                .unwrap_or_default()
        } else {
            if reserves.base.is_zero() || reserves.quote.is_zero() {
                return Err(AmmError::division_by_zero("liquidity_minted"));
            }
            let by_base = Self::mul_div(amount_base, total_supply, reserves.base)?;
            let by_quote = Self::mul_div(amount_quote, total_supply, reserves.quote)?;
            by_base.min(by_quote)
        };
        if liquidity.is_zero() {
            return Err(AmmError::insufficient_liquidity("liquidity minted"));
        }
        Ok(liquidity)
    }

    /// Base and quote paid out for burning `liquidity`
    pub fn burn_amounts(
        liquidity: U256,
        reserves: &PoolReserves,
        total_supply: U256,
    ) -> Result<(U256, U256)> {
        if total_supply.is_zero() {
            return Err(AmmError::division_by_zero("burn_amounts"));
        }
        let amount_base = Self::mul_div(liquidity, reserves.base, total_supply)?;
        let amount_quote = Self::mul_div(liquidity, reserves.quote, total_supply)?;
        if amount_base.is_zero() || amount_quote.is_zero() {
            return Err(AmmError::insufficient_liquidity("liquidity burned"));
        }
        Ok((amount_base, amount_quote))
    }

    /// Protocol fee liquidity accrued since the `k_last` checkpoint.
    ///
    /// `divisor` is 5 for the 1/6 share of Uniswap-style factories and 1 for
    /// a 1/2 share.
    pub fn protocol_fee_liquidity(
        reserves: &PoolReserves,
        total_supply: U256,
        k_last: U256,
        divisor: u32,
    ) -> Result<U256> {
        if k_last.is_zero() {
            return Ok(U256::zero());
        }
        let root_k = Self::sqrt(reserves.invariant());
        let root_k_last = Self::sqrt(U512::from(k_last));
        if root_k <= root_k_last {
            return Ok(U256::zero());
        }
        let numerator = total_supply.full_mul(root_k - root_k_last);
        let denominator = U512::from(root_k) * U512::from(divisor) + U512::from(root_k_last);
        if denominator.is_zero() {
            return Err(AmmError::division_by_zero("protocol_fee_liquidity"));
        }
        narrow(numerator / denominator, "protocol_fee_liquidity")
    }
}

/// Narrow a 512-bit intermediate back to 256 bits
pub(crate) fn narrow(value: U512, operation: &'static str) -> Result<U256> {
    U256::try_from(value).map_err(|_| AmmError::overflow(operation))
}
