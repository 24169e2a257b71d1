//! Calibration orchestrator
//!
//! [`Calibrator::estimate`] and [`Calibrator::calibrate`] share one
//! preparation step: read a fresh pool snapshot, resolve the funding source,
//! plan, and check funding. `estimate` stops there. `calibrate` replays the
//! planned operations against the adapter, verifies every result, and rolls
//! the adapter back to its checkpoint if any step fails.

use crate::adapter::AmmAdapter;
use crate::error::{CalibrationError, Result};
use crate::planner::plan_calibration;
use crate::settlement::{CalibrationPlan, PoolOperation, Settlement};
use crate::vault::{check_funding, VaultConfig};
use calibrator_amm::{
    Address, PickedSwap, PoolKey, PoolReserves, PoolView, PriceSearch, RatioSolver, TargetRatio,
    U256,
};
use calibrator_config::CalibratorConfig;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rebalancing engine acting through an operator account
///
/// Calls on the same pool are serialized by a per-pool lock, so a shared
/// `Calibrator` never interleaves two sequences on one pool.
pub struct Calibrator {
    operator: Address,
    solver: RatioSolver,
    vault: RwLock<VaultConfig>,
    pool_locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl Calibrator {
    pub fn new(operator: Address, solver: RatioSolver, vault: VaultConfig) -> Self {
        Self {
            operator,
            solver,
            vault: RwLock::new(vault),
            pool_locks: DashMap::new(),
        }
    }

    pub fn from_config(config: &CalibratorConfig) -> Self {
        Self::new(
            config.calibrator.operator,
            RatioSolver::new(config.calibrator.solver),
            VaultConfig::from_settings(&config.vault),
        )
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn solver(&self) -> RatioSolver {
        self.solver
    }

    pub fn vault_config(&self) -> VaultConfig {
        *self.vault.read()
    }

    pub fn set_vault(&self, vault: Option<Address>) {
        info!(?vault, "Vault updated");
        self.vault.write().set_vault(vault);
    }

    pub fn set_minimum_base(&self, minimum_base: U256) {
        info!(%minimum_base, "Minimum base retention updated");
        self.vault.write().set_minimum_base(minimum_base);
    }

    /// Current reserves oriented by `pool`
    pub fn get_reserves<V: PoolView + ?Sized>(&self, view: &V, pool: &PoolKey) -> Result<PoolReserves> {
        Ok(view.get_reserves(pool)?)
    }

    /// Settlement `calibrate` would produce for the same state and arguments
    pub fn estimate<A: AmmAdapter>(
        &self,
        amm: &A,
        pool: &PoolKey,
        target: &TargetRatio,
        caller: Address,
    ) -> Result<Settlement> {
        self.with_pool_lock(pool.pair, || {
            let (plan, _) = self.prepare(amm, pool, target, caller)?;
            Ok(plan.settlement)
        })
    }

    /// Full plan for a call from `caller`, including the operation list
    pub fn plan<A: AmmAdapter>(
        &self,
        amm: &A,
        pool: &PoolKey,
        target: &TargetRatio,
        caller: Address,
    ) -> Result<CalibrationPlan> {
        self.with_pool_lock(pool.pair, || Ok(self.prepare(amm, pool, target, caller)?.0))
    }

    /// Move `pool` onto `target`, sending returned assets and new LP to
    /// `recipient`
    ///
    /// Either every step succeeds or the adapter is left exactly as it was.
    pub fn calibrate<A: AmmAdapter>(
        &self,
        amm: &mut A,
        pool: &PoolKey,
        target: &TargetRatio,
        caller: Address,
        recipient: Address,
    ) -> Result<Settlement> {
        self.with_pool_lock(pool.pair, || self.settle(amm, pool, target, caller, recipient))
    }

    fn settle<A: AmmAdapter>(
        &self,
        amm: &mut A,
        pool: &PoolKey,
        target: &TargetRatio,
        caller: Address,
        recipient: Address,
    ) -> Result<Settlement> {
        let (plan, source) = self.prepare(amm, pool, target, caller)?;
        let checkpoint = amm.checkpoint();
        match self.execute(amm, pool, &plan, source, recipient) {
            Ok(()) => {
                let settlement = plan.settlement;
                info!(
                    pool = ?pool.pair,
                    flavor = %amm.flavor(),
                    required_base = %settlement.required_base,
                    leftover_base = %settlement.leftover_base,
                    required_quote = %settlement.required_quote,
                    leftover_quote = %settlement.leftover_quote,
                    leftover_liquidity = %settlement.leftover_liquidity,
                    "✅ Calibration complete"
                );
                Ok(settlement)
            }
            Err(error) => {
                amm.rollback(checkpoint);
                warn!(pool = ?pool.pair, %error, "Calibration rolled back");
                Err(error)
            }
        }
    }

    /// Smallest base purchase in `[start, end]` lifting the pool price to
    /// `price`
    pub fn pick_buy(
        &self,
        reserves: &PoolReserves,
        price: &TargetRatio,
        start: U256,
        end: U256,
    ) -> Result<PickedSwap> {
        Ok(PriceSearch::pick_buy(reserves, price, start, end)?)
    }

    /// Smallest base sale in `[start, end]` dropping the pool price to `price`
    pub fn pick_sell(
        &self,
        reserves: &PoolReserves,
        price: &TargetRatio,
        start: U256,
        end: U256,
    ) -> Result<PickedSwap> {
        Ok(PriceSearch::pick_sell(reserves, price, start, end)?)
    }

    /// Run `f` holding the lock of `pair`
    ///
    /// The lock entry is dropped again once no other call holds or waits on
    /// it, so the map only tracks pools with calls in flight.
    fn with_pool_lock<T>(&self, pair: Address, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.pool_locks.entry(pair).or_default().value().clone();
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        self.pool_locks
            .remove_if(&pair, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn prepare<A: AmmAdapter>(
        &self,
        amm: &A,
        pool: &PoolKey,
        target: &TargetRatio,
        caller: Address,
    ) -> Result<(CalibrationPlan, Address)> {
        target.validate()?;
        let vault = self.vault_config();
        let source = vault.source_for(caller);
        let snapshot = amm.snapshot(pool)?;
        let owner_liquidity = amm.balance_of(pool.pair, source);

        let plan = plan_calibration(
            &snapshot,
            owner_liquidity,
            target,
            vault.minimum_base(),
            &self.solver,
        )?;
        check_funding(amm, pool, &plan, source, self.operator, vault.is_vault_mode())?;
        Ok((plan, source))
    }

    fn execute<A: AmmAdapter>(
        &self,
        amm: &mut A,
        pool: &PoolKey,
        plan: &CalibrationPlan,
        source: Address,
        recipient: Address,
    ) -> Result<()> {
        let operator = self.operator;
        for operation in &plan.operations {
            debug!(?operation, "Replaying");
            match *operation {
                PoolOperation::CollectLiquidity { liquidity } => {
                    if source != operator {
                        amm.transfer_from(pool.pair, operator, source, operator, liquidity)?;
                    }
                }
                PoolOperation::Withdraw {
                    liquidity,
                    amount_base,
                    amount_quote,
                } => {
                    let (base, quote) = amm.withdraw(pool, liquidity, operator, operator)?;
                    verify("withdrawn base", amount_base, base)?;
                    verify("withdrawn quote", amount_quote, quote)?;
                }
                PoolOperation::Collect { asset, amount } => {
                    if source != operator {
                        amm.transfer_from(asset.token(pool), operator, source, operator, amount)?;
                    }
                }
                PoolOperation::Swap {
                    base_to_quote,
                    amount_in,
                    amount_out,
                } => {
                    let received = amm.swap(pool, amount_in, base_to_quote, operator, operator)?;
                    verify("swap output", amount_out, received)?;
                }
                PoolOperation::Deposit {
                    amount_base,
                    amount_quote,
                    liquidity,
                } => {
                    let receipt = amm.deposit(pool, amount_base, amount_quote, operator, recipient)?;
                    verify("deposited base", amount_base, receipt.amount_base)?;
                    verify("deposited quote", amount_quote, receipt.amount_quote)?;
                    verify("minted liquidity", liquidity, receipt.liquidity)?;
                }
                PoolOperation::Return { asset, amount } => {
                    if recipient != operator {
                        amm.transfer(asset.token(pool), operator, recipient, amount)?;
                    }
                }
            }
        }

        let reserves = amm.get_reserves(pool)?;
        verify("final base reserve", plan.settlement.reserve_base_after, reserves.base)?;
        verify("final quote reserve", plan.settlement.reserve_quote_after, reserves.quote)
    }
}

fn verify(step: &'static str, expected: U256, actual: U256) -> Result<()> {
    if expected != actual {
        return Err(CalibrationError::Divergence {
            step,
            expected,
            actual,
        });
    }
    Ok(())
}
