//! Pure calibration planning
//!
//! [`plan_calibration`] runs the whole withdraw, swap, re-add sequence
//! against a [`PoolSnapshot`] copy and records every step with the amounts
//! the pool will produce. Estimating returns the settlement; calibrating
//! replays the operations, so the two agree by construction.

use crate::error::{CalibrationError, Result};
use crate::settlement::{Asset, CalibrationPlan, PoolOperation, Settlement};
use calibrator_amm::{AmmError, PoolSnapshot, RatioSolver, TargetRatio, V2Math, U256};
use tracing::debug;

/// Asset movements of the operator account over one calibration
#[derive(Debug, Default)]
struct Flows {
    base_in: U256,
    base_out: U256,
    quote_in: U256,
    quote_out: U256,
}

impl Flows {
    /// `(required, leftover)` for one asset
    fn net(incoming: U256, outgoing: U256) -> (U256, U256) {
        (
            outgoing.saturating_sub(incoming),
            incoming.saturating_sub(outgoing),
        )
    }
}

/// Plan a calibration of `snapshot` onto `target` for a source holding
/// `owner_liquidity` LP
///
/// The source keeps `total_supply * minimum_base / reserve_base` LP in the
/// pool and withdraws the rest. The swap is solved against the reserves
/// left after the withdrawal, then base is re-added until the pool holds
/// its original base reserve again.
pub fn plan_calibration(
    snapshot: &PoolSnapshot,
    owner_liquidity: U256,
    target: &TargetRatio,
    minimum_base: U256,
    solver: &RatioSolver,
) -> Result<CalibrationPlan> {
    target.validate()?;
    let initial = snapshot.reserves;
    if initial.is_empty() || snapshot.total_supply.is_zero() {
        return Err(AmmError::division_by_zero("calibration pool reserves").into());
    }

    let retained = V2Math::mul_div(snapshot.total_supply, minimum_base, initial.base)?;
    if owner_liquidity < retained {
        return Err(CalibrationError::insufficient(
            "liquidity retained for minimum base",
            retained,
            owner_liquidity,
        ));
    }

    // Already on target: nothing to withdraw or trade
    if solver.solve(&initial, target)?.is_no_op() {
        debug!("Pool already at target ratio, nothing to plan");
        return Ok(CalibrationPlan {
            settlement: Settlement {
                leftover_liquidity: owner_liquidity,
                reserve_base_after: initial.base,
                reserve_quote_after: initial.quote,
                ..Default::default()
            },
            swap: Default::default(),
            liquidity_withdrawn: U256::zero(),
            liquidity_retained: owner_liquidity,
            operations: Vec::new(),
        });
    }

    let mut pool = *snapshot;
    let mut flows = Flows::default();
    let mut leading = Vec::with_capacity(2);
    let mut trailing = Vec::with_capacity(2);

    let withdrawn = owner_liquidity - retained;
    if !withdrawn.is_zero() {
        let burned = pool.burn(withdrawn)?;
        flows.base_in += burned.amount_base;
        flows.quote_in += burned.amount_quote;
        leading.push(PoolOperation::CollectLiquidity {
            liquidity: withdrawn,
        });
        leading.push(PoolOperation::Withdraw {
            liquidity: withdrawn,
            amount_base: burned.amount_base,
            amount_quote: burned.amount_quote,
        });
    }

    let mut swap = solver.solve(&pool.reserves, target)?;
    if !swap.is_no_op() {
        swap.amount_out = pool.swap(swap.amount_in, swap.base_to_quote)?;
        if swap.base_to_quote {
            flows.base_out += swap.amount_in;
            flows.quote_in += swap.amount_out;
        } else {
            flows.quote_out += swap.amount_in;
            flows.base_in += swap.amount_out;
        }
        trailing.push(PoolOperation::Swap {
            base_to_quote: swap.base_to_quote,
            amount_in: swap.amount_in,
            amount_out: swap.amount_out,
        });
    }

    let mut minted = U256::zero();
    let base_to_add = initial.base.saturating_sub(pool.reserves.base);
    if !base_to_add.is_zero() {
        let quote_to_add = V2Math::quote(base_to_add, pool.reserves.base, pool.reserves.quote)?;
        let (amount_base, amount_quote) = pool.deposit_amounts(base_to_add, quote_to_add)?;
        let outcome = pool.mint(amount_base, amount_quote)?;
        minted = outcome.liquidity;
        flows.base_out += amount_base;
        flows.quote_out += amount_quote;
        trailing.push(PoolOperation::Deposit {
            amount_base,
            amount_quote,
            liquidity: minted,
        });
    }

    let (required_base, leftover_base) = Flows::net(flows.base_in, flows.base_out);
    let (required_quote, leftover_quote) = Flows::net(flows.quote_in, flows.quote_out);
    let settlement = Settlement {
        required_base,
        leftover_base,
        required_quote,
        leftover_quote,
        leftover_liquidity: retained + minted,
        reserve_base_after: pool.reserves.base,
        reserve_quote_after: pool.reserves.quote,
    };
    settlement.ensure_consistent()?;

    let mut operations = leading;
    for (asset, amount) in [(Asset::Base, required_base), (Asset::Quote, required_quote)] {
        if !amount.is_zero() {
            operations.push(PoolOperation::Collect { asset, amount });
        }
    }
    operations.append(&mut trailing);
    for (asset, amount) in [(Asset::Base, leftover_base), (Asset::Quote, leftover_quote)] {
        if !amount.is_zero() {
            operations.push(PoolOperation::Return { asset, amount });
        }
    }

    debug!(
        %withdrawn,
        %retained,
        %minted,
        steps = operations.len(),
        "Calibration planned"
    );
    Ok(CalibrationPlan {
        settlement,
        swap,
        liquidity_withdrawn: withdrawn,
        liquidity_retained: retained,
        operations,
    })
}
