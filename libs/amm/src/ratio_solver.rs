//! Swap sizing to move a pool onto a target reserve ratio
//!
//! Swapping `x` of the input asset into a pool with reserves
//! `(r_in, r_out)` leaves `r_in' = r_in + x` and
//! `r_out' = r_out * 1000 r_in / (1000 r_in + 997 x)`. Requiring
//! `r_out' / r_in' = t_out / t_in` gives the quadratic
//!
//! ```text
//! 997 x^2 + 1997 r_in x + 1000 r_in^2 - 1000 r_in r_out t_in / t_out = 0
//! ```
//!
//! [`SolverMode::Exact`] takes its positive root. [`SolverMode::ClosedForm`]
//! drops the fee cross term and uses
//!
//! ```text
//! x = sqrt(r_in r_out * 1000 * t_in / (t_out * 997)) - r_in * 1000 / 997
//! ```
//!
//! which overshoots by up to 0.3% of the price for small moves but
//! reproduces historical settlements computed that way.
//! All arithmetic is integer; intermediates run in 512 bits.

use crate::error::{AmmError, Result};
use crate::pool_traits::PoolReserves;
use crate::v2_math::{narrow, V2Math, FEE_DENOMINATOR, FEE_NUMERATOR};
use ethers_core::types::{U256, U512};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decimal places of a reported price
pub const PRICE_SCALE: u32 = 20;

/// Desired `reserve_quote / reserve_base`, as an integer pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRatio {
    #[serde(with = "crate::serde_u256")]
    pub base: U256,
    #[serde(with = "crate::serde_u256")]
    pub quote: U256,
}

impl TargetRatio {
    /// Target ratio with both components positive
    pub fn new(base: U256, quote: U256) -> Result<Self> {
        let target = Self { base, quote };
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base.is_zero() || self.quote.is_zero() {
            return Err(AmmError::InvalidTarget {
                base: self.base,
                quote: self.quote,
            });
        }
        Ok(())
    }

    /// Relative distance between the pool price and this target:
    /// `|reserve_quote * base - reserve_base * quote| / (reserve_base * quote)`
    pub fn deviation(&self, reserves: &PoolReserves) -> Result<Decimal> {
        self.validate()?;
        if reserves.base.is_zero() {
            return Err(AmmError::division_by_zero("deviation"));
        }
        let pool_side = reserves.quote.full_mul(self.base);
        let target_side = reserves.base.full_mul(self.quote);
        let difference = if pool_side > target_side {
            pool_side - target_side
        } else {
            target_side - pool_side
        };
        ratio_to_decimal(difference, target_side)
    }
}

/// Direction and size of the single swap that rebalances a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub base_to_quote: bool,
    #[serde(with = "crate::serde_u256")]
    pub amount_in: U256,
    #[serde(with = "crate::serde_u256")]
    pub amount_out: U256,
}

impl RebalancePlan {
    /// Plan for a pool already at (or beyond) its target
    pub fn no_op(base_to_quote: bool) -> Self {
        Self {
            base_to_quote,
            ..Default::default()
        }
    }

    pub fn is_no_op(&self) -> bool {
        self.amount_in.is_zero()
    }
}

/// How the swap size is derived from the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMode {
    /// Positive root of the fee-aware ratio equation
    #[default]
    Exact,
    /// Square-root approximation without the fee cross term
    ClosedForm,
}

impl std::str::FromStr for SolverMode {
    type Err = String;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        match text.to_ascii_lowercase().replace('-', "_").as_str() {
            "exact" => Ok(Self::Exact),
            "closed_form" => Ok(Self::ClosedForm),
            other => Err(format!("unknown solver mode: {other}")),
        }
    }
}

/// Computes the single swap that rebalances a pool
#[derive(Debug, Clone, Copy, Default)]
pub struct RatioSolver {
    mode: SolverMode,
}

impl RatioSolver {
    pub fn new(mode: SolverMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SolverMode {
        self.mode
    }

    /// Swap plan moving `reserves` onto `target`
    ///
    /// The pool sells base when it holds more quote per base than the target
    /// asks for, and sells quote otherwise. A non-positive swap size means the
    /// pool is already there and yields [`RebalancePlan::no_op`].
    pub fn solve(&self, reserves: &PoolReserves, target: &TargetRatio) -> Result<RebalancePlan> {
        target.validate()?;
        if reserves.is_empty() {
            return Err(AmmError::division_by_zero("ratio solver reserves"));
        }

        let pool_side = reserves.quote.full_mul(target.base);
        let target_side = reserves.base.full_mul(target.quote);
        let base_to_quote = target_side < pool_side;
        if pool_side == target_side {
            return Ok(RebalancePlan::no_op(base_to_quote));
        }

        let (reserve_in, reserve_out) = reserves.directional(base_to_quote);
        let (target_in, target_out) = if base_to_quote {
            (target.base, target.quote)
        } else {
            (target.quote, target.base)
        };

        let amount_in = match self.mode {
            SolverMode::Exact => exact_amount_in(reserve_in, reserve_out, target_in, target_out)?,
            SolverMode::ClosedForm => {
                closed_form_amount_in(reserve_in, reserve_out, target_in, target_out)?
            }
        };
        if amount_in.is_zero() {
            debug!(base_to_quote, "Pool already at or beyond target ratio");
            return Ok(RebalancePlan::no_op(base_to_quote));
        }

        let amount_out = V2Math::get_amount_out(amount_in, reserve_in, reserve_out)?;
        if amount_out.is_zero() {
            return Err(AmmError::precision_loss("rebalancing swap output rounds to zero"));
        }

        debug!(
            base_to_quote,
            mode = ?self.mode,
            %amount_in,
            %amount_out,
            "Solved rebalancing swap"
        );
        Ok(RebalancePlan {
            base_to_quote,
            amount_in,
            amount_out,
        })
    }
}

/// `floor((sqrt(1997^2 r_in^2 + 4 * 997 * 1000 (r_in r_out t_in / t_out - r_in^2)) - 1997 r_in) / 1994)`
fn exact_amount_in(
    reserve_in: U256,
    reserve_out: U256,
    target_in: U256,
    target_out: U256,
) -> Result<U256> {
    let overflow = || AmmError::overflow("exact ratio solver");
    let fee_sum = U512::from(FEE_NUMERATOR + FEE_DENOMINATOR);

    let product_side = reserve_in
        .full_mul(reserve_out)
        .checked_mul(U512::from(target_in))
        .ok_or_else(overflow)?;
    let square_side = reserve_in
        .full_mul(reserve_in)
        .checked_mul(U512::from(target_out))
        .ok_or_else(overflow)?;
    if product_side <= square_side {
        return Ok(U256::zero());
    }

    let linear = U512::from(reserve_in) * fee_sum;
    let scaled_gap = (product_side - square_side)
        .checked_mul(U512::from(4 * FEE_NUMERATOR * FEE_DENOMINATOR))
        .ok_or_else(overflow)?
        / U512::from(target_out);
    let discriminant = linear
        .checked_mul(linear)
        .and_then(|square| square.checked_add(scaled_gap))
        .ok_or_else(overflow)?;

    let root = V2Math::integer_sqrt(discriminant);
    if root <= linear {
        return Ok(U256::zero());
    }
    narrow(
        (root - linear) / U512::from(2 * FEE_NUMERATOR),
        "exact ratio solver amount in",
    )
}

fn closed_form_amount_in(
    reserve_in: U256,
    reserve_out: U256,
    target_in: U256,
    target_out: U256,
) -> Result<U256> {
    let scaled_invariant = reserve_in
        .full_mul(reserve_out)
        .checked_mul(U512::from(FEE_DENOMINATOR))
        .and_then(|value| value.checked_mul(U512::from(target_in)))
        .ok_or_else(|| AmmError::overflow("ratio solver invariant"))?;
    let left = V2Math::integer_sqrt(
        scaled_invariant / (U512::from(target_out) * U512::from(FEE_NUMERATOR)),
    );
    let right = U512::from(reserve_in) * U512::from(FEE_DENOMINATOR) / U512::from(FEE_NUMERATOR);
    if left <= right {
        return Ok(U256::zero());
    }
    narrow(left - right, "ratio solver amount in")
}

/// `reserve_quote / reserve_base` truncated to [`PRICE_SCALE`] decimals
pub fn price_of(reserves: &PoolReserves) -> Result<Decimal> {
    if reserves.base.is_zero() {
        return Err(AmmError::division_by_zero("price"));
    }
    ratio_to_decimal(U512::from(reserves.quote), U512::from(reserves.base))
}

/// Truncated decimal of `numerator / denominator`, giving up fractional
/// digits when the integer part needs the room
fn ratio_to_decimal(numerator: U512, denominator: U512) -> Result<Decimal> {
    if denominator.is_zero() {
        return Err(AmmError::division_by_zero("ratio"));
    }
    for scale in (0..=PRICE_SCALE).rev() {
        let Some(shifted) = numerator.checked_mul(U512::exp10(scale as usize)) else {
            continue;
        };
        let scaled = shifted / denominator;
        // 96-bit mantissa
        if scaled.bits() <= 96 {
            return Decimal::try_from_i128_with_scale(scaled.as_u128() as i128, scale)
                .map_err(|_| AmmError::overflow("ratio exceeds decimal range"));
        }
    }
    Err(AmmError::overflow("ratio exceeds decimal range"))
}
