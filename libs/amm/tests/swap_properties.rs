//! Constant-Product Math Property Tests
//!
//! These tests check properties the pair contract guarantees for any
//! reserves: swaps never shrink the invariant, router inverses round in the
//! pool's favor, and a solved swap moves the pool onto its target.

use calibrator_amm::{AmmError, PoolReserves, RatioSolver, SolverMode, TargetRatio, V2Math, U256, U512};
use proptest::prelude::*;
use rust_decimal_macros::dec;

prop_compose! {
    fn reserve()
        (units in 1_000u64..10_000_000_000u64) -> U256 {
        U256::from(units) * U256::exp10(12)
    }
}

prop_compose! {
    fn pool()
        (base in reserve(), quote in reserve()) -> PoolReserves {
        PoolReserves::new(base, quote)
    }
}

prop_compose! {
    fn target()
        (base in 1u64..10_000u64, quote in 1u64..10_000u64) -> TargetRatio {
        TargetRatio::new(U256::from(base), U256::from(quote)).unwrap()
    }
}

fn apply(reserves: &PoolReserves, base_to_quote: bool, amount_in: U256, amount_out: U256) -> PoolReserves {
    if base_to_quote {
        PoolReserves::new(reserves.base + amount_in, reserves.quote - amount_out)
    } else {
        PoolReserves::new(reserves.base - amount_out, reserves.quote + amount_in)
    }
}

proptest! {
    /// Property: the invariant never decreases across a swap
    #[test]
    fn swap_never_shrinks_invariant(
        reserves in pool(),
        fraction in 1u64..1000u64,
        base_to_quote in any::<bool>(),
    ) {
        let (reserve_in, reserve_out) = reserves.directional(base_to_quote);
        let amount_in = reserve_in * U256::from(fraction) / U256::from(100u64);
        let amount_out = V2Math::get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
        prop_assert!(amount_out < reserve_out);

        let after = apply(&reserves, base_to_quote, amount_in, amount_out);
        prop_assert!(after.invariant() >= reserves.invariant());
    }

    /// Property: paying `get_amount_in` always buys at least the asked amount
    #[test]
    fn amount_in_covers_amount_out(
        reserves in pool(),
        per_mille in 1u64..999u64,
    ) {
        let wanted = reserves.quote * U256::from(per_mille) / U256::from(1000u64);
        prop_assume!(!wanted.is_zero());
        let paid = V2Math::get_amount_in(wanted, reserves.base, reserves.quote).unwrap();
        let received = V2Math::get_amount_out(paid, reserves.base, reserves.quote).unwrap();
        prop_assert!(received >= wanted,
                    "paid {} for {} but received {}", paid, wanted, received);
    }

    /// Property: integer square root is the floor of the real one
    #[test]
    fn sqrt_is_floor(high in any::<u128>(), low in any::<u128>()) {
        let value = (U512::from(high) << 128) | U512::from(low);
        let root = V2Math::integer_sqrt(value);
        prop_assert!(root * root <= value);
        let next = root + U512::one();
        prop_assert!(next * next > value);
    }

    /// Property: the exact solver lands on the target up to integer rounding
    #[test]
    fn exact_solution_meets_target(reserves in pool(), goal in target()) {
        let plan = match RatioSolver::new(SolverMode::Exact).solve(&reserves, &goal) {
            Ok(plan) if !plan.is_no_op() => plan,
            // already on target, or too close for a whole-unit swap
            Ok(_) | Err(AmmError::PrecisionLoss { .. }) => return Ok(()),
            Err(error) => return Err(TestCaseError::fail(error.to_string())),
        };
        let after = apply(&reserves, plan.base_to_quote, plan.amount_in, plan.amount_out);
        let deviation = goal.deviation(&after).unwrap();
        prop_assert!(deviation < dec!(0.0001),
                    "{}:{} missed by {}", goal.base, goal.quote, deviation);
    }
}
