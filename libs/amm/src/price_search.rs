//! Bounded binary search for the swap that crosses a price threshold
//!
//! The searched amount is always the base leg of the trade: base bought
//! for [`PriceSearch::pick_buy`], base sold for [`PriceSearch::pick_sell`].
//! Buying base only raises the pool price and selling only lowers it, so
//! the crossing predicate is monotonic and the first crossing amount is
//! found exactly in `O(log(end - start))` steps.

use crate::error::{AmmError, Result};
use crate::pool_traits::PoolReserves;
use crate::ratio_solver::TargetRatio;
use crate::v2_math::V2Math;
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A swap picked by the search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedSwap {
    /// Paid into the pool (quote when buying, base when selling)
    #[serde(with = "crate::serde_u256")]
    pub amount_in: U256,
    /// Paid out by the pool
    #[serde(with = "crate::serde_u256")]
    pub amount_out: U256,
    /// Smallest base amount in the range whose trade crosses the price
    #[serde(with = "crate::serde_u256")]
    pub boundary: U256,
}

pub struct PriceSearch;

impl PriceSearch {
    /// Smallest base purchase in `[start, end]` after which the pool price
    /// (`quote / base`) is at or above `price`
    ///
    /// `end` is capped below the base reserve, which cannot be bought out.
    pub fn pick_buy(
        reserves: &PoolReserves,
        price: &TargetRatio,
        start: U256,
        end: U256,
    ) -> Result<PickedSwap> {
        price.validate()?;
        if reserves.is_empty() {
            return Err(AmmError::division_by_zero("pick_buy reserves"));
        }
        let end = end.min(reserves.base - 1);
        Self::search(start, end, price, |base_out| {
            if base_out.is_zero() {
                return Ok((PickedSwap::default(), crosses_up(reserves, price)));
            }
            let amount_in = V2Math::get_amount_in(base_out, reserves.quote, reserves.base)?;
            let amount_out = V2Math::get_amount_out(amount_in, reserves.quote, reserves.base)?;
            let quote_after = reserves
                .quote
                .checked_add(amount_in)
                .ok_or_else(|| AmmError::overflow("pick_buy quote reserve"))?;
            let after = PoolReserves::new(reserves.base - amount_out, quote_after);
            let swap = PickedSwap {
                amount_in,
                amount_out,
                boundary: base_out,
            };
            Ok((swap, crosses_up(&after, price)))
        })
    }

    /// Smallest base sale in `[start, end]` after which the pool price is at
    /// or below `price`
    pub fn pick_sell(
        reserves: &PoolReserves,
        price: &TargetRatio,
        start: U256,
        end: U256,
    ) -> Result<PickedSwap> {
        price.validate()?;
        if reserves.is_empty() {
            return Err(AmmError::division_by_zero("pick_sell reserves"));
        }
        // the pool's base reserve must still fit after the sale
        let end = end.min(U256::MAX - reserves.base);
        Self::search(start, end, price, |base_in| {
            let amount_out = if base_in.is_zero() {
                U256::zero()
            } else {
                V2Math::get_amount_out(base_in, reserves.base, reserves.quote)?
            };
            let base_after = reserves
                .base
                .checked_add(base_in)
                .ok_or_else(|| AmmError::overflow("pick_sell base reserve"))?;
            let after = PoolReserves::new(base_after, reserves.quote - amount_out);
            let swap = PickedSwap {
                amount_in: base_in,
                amount_out,
                boundary: base_in,
            };
            Ok((swap, crosses_down(&after, price)))
        })
    }

    /// Lower-bound search over a monotonic `evaluate`
    fn search<F>(start: U256, end: U256, price: &TargetRatio, evaluate: F) -> Result<PickedSwap>
    where
        F: Fn(U256) -> Result<(PickedSwap, bool)>,
    {
        if start > end {
            return Err(AmmError::InvalidRange { start, end });
        }
        let (last, reachable) = evaluate(end)?;
        if !reachable {
            return Err(AmmError::PriceUnreachable {
                price_base: price.base,
                price_quote: price.quote,
                start,
                end,
            });
        }

        let (mut low, mut high) = (start, end);
        let mut best = last;
        let mut steps = 0u32;
        while low < high {
            let mid = low + (high - low) / 2;
            let (swap, crossed) = evaluate(mid)?;
            if crossed {
                high = mid;
                best = swap;
            } else {
                low = mid + 1;
            }
            steps += 1;
        }
        debug!(boundary = %best.boundary, steps, "Price threshold located");
        Ok(best)
    }
}

/// Pool price at or above `price`
fn crosses_up(reserves: &PoolReserves, price: &TargetRatio) -> bool {
    reserves.quote.full_mul(price.base) >= reserves.base.full_mul(price.quote)
}

/// Pool price at or below `price`
fn crosses_down(reserves: &PoolReserves, price: &TargetRatio) -> bool {
    reserves.quote.full_mul(price.base) <= reserves.base.full_mul(price.quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(value: &str) -> U256 {
        U256::from_dec_str(value).unwrap()
    }

    fn pool() -> PoolReserves {
        // price 5 quote per base
        PoolReserves::new(u("10000000000000000000"), u("50000000000000000000"))
    }

    fn price(base: u64, quote: u64) -> TargetRatio {
        TargetRatio::new(U256::from(base), U256::from(quote)).unwrap()
    }

    fn price_after_buy(reserves: &PoolReserves, swap: &PickedSwap) -> (U256, U256) {
        (reserves.base - swap.amount_out, reserves.quote + swap.amount_in)
    }

    #[test]
    fn test_pick_buy_finds_exact_boundary() {
        let reserves = pool();
        let threshold = price(1, 7);
        let swap =
            PriceSearch::pick_buy(&reserves, &threshold, U256::zero(), u("9000000000000000000"))
                .unwrap();

        let (base, quote) = price_after_buy(&reserves, &swap);
        assert!(quote >= base * U256::from(7u64));
        assert!(swap.amount_out >= swap.boundary);

        let before =
            PriceSearch::pick_buy(&reserves, &threshold, U256::zero(), swap.boundary - 1);
        assert!(matches!(before, Err(AmmError::PriceUnreachable { .. })));
    }

    #[test]
    fn test_pick_sell_finds_exact_boundary() {
        let reserves = pool();
        let threshold = price(1, 4);
        let swap = PriceSearch::pick_sell(
            &reserves,
            &threshold,
            U256::zero(),
            u("10000000000000000000"),
        )
        .unwrap();

        assert_eq!(swap.amount_in, swap.boundary);
        let base = reserves.base + swap.amount_in;
        let quote = reserves.quote - swap.amount_out;
        assert!(quote <= base * U256::from(4u64));

        let (previous_base, previous_quote) = {
            let previous = swap.boundary - 1;
            let out = V2Math::get_amount_out(previous, reserves.base, reserves.quote).unwrap();
            (reserves.base + previous, reserves.quote - out)
        };
        assert!(previous_quote > previous_base * U256::from(4u64));
    }

    #[test]
    fn test_already_crossed_returns_start() {
        let reserves = pool();
        let swap =
            PriceSearch::pick_buy(&reserves, &price(1, 4), U256::zero(), u("1000")).unwrap();
        assert_eq!(swap, PickedSwap::default());

        let swap = PriceSearch::pick_sell(&reserves, &price(1, 6), u("5"), u("1000")).unwrap();
        assert_eq!(swap.boundary, u("5"));
    }

    #[test]
    fn test_unbounded_range_end() {
        let reserves = PoolReserves::new(U256::from(10_000u64), U256::from(50_000u64));

        let sale = PriceSearch::pick_sell(&reserves, &price(1, 4), U256::zero(), U256::MAX).unwrap();
        let bounded =
            PriceSearch::pick_sell(&reserves, &price(1, 4), U256::zero(), u("10000")).unwrap();
        assert_eq!(sale, bounded);
        assert_eq!(sale.boundary, u("1183"));
        assert_eq!(sale.amount_out, u("5275"));

        let purchase =
            PriceSearch::pick_buy(&reserves, &price(1, 7), U256::zero(), U256::MAX).unwrap();
        let bounded =
            PriceSearch::pick_buy(&reserves, &price(1, 7), U256::zero(), u("9999")).unwrap();
        assert_eq!(purchase, bounded);
    }

    #[test]
    fn test_unreachable_price() {
        let result = PriceSearch::pick_sell(&pool(), &price(1, 1), U256::zero(), u("1000"));
        assert!(matches!(result, Err(AmmError::PriceUnreachable { .. })));
    }

    #[test]
    fn test_inverted_range() {
        let result = PriceSearch::pick_sell(&pool(), &price(1, 4), u("10"), u("1"));
        assert_eq!(
            result,
            Err(AmmError::InvalidRange {
                start: u("10"),
                end: u("1")
            })
        );
    }
}
