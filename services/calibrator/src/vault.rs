//! Vault accounting: whose balances fund a calibration
//!
//! Without a vault the caller is the source of LP and of any required
//! assets. With a vault configured, the vault is the source for every
//! caller and must have approved the operator beforehand.

use crate::adapter::TokenLedger;
use crate::error::{CalibrationError, Result};
use crate::settlement::CalibrationPlan;
use calibrator_amm::{Address, PoolKey, U256};
use calibrator_config::VaultSettings;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VaultConfig {
    vault: Option<Address>,
    minimum_base: U256,
}

impl VaultConfig {
    pub fn new(vault: Option<Address>, minimum_base: U256) -> Self {
        Self {
            vault,
            minimum_base,
        }
    }

    pub fn from_settings(settings: &VaultSettings) -> Self {
        Self::new(settings.address, settings.minimum_base)
    }

    pub fn vault(&self) -> Option<Address> {
        self.vault
    }

    pub fn minimum_base(&self) -> U256 {
        self.minimum_base
    }

    /// Route balances through `vault`, or back to callers with `None`
    pub fn set_vault(&mut self, vault: Option<Address>) {
        self.vault = vault;
    }

    pub fn set_minimum_base(&mut self, minimum_base: U256) {
        self.minimum_base = minimum_base;
    }

    pub fn is_vault_mode(&self) -> bool {
        self.vault.is_some()
    }

    /// Account whose LP and assets back a call from `caller`
    pub fn source_for(&self, caller: Address) -> Address {
        self.vault.unwrap_or(caller)
    }
}

/// Verify `source` can fund `plan` before anything moves
///
/// Covers the LP to withdraw and the required base and quote. The operator
/// spends its own balances without an allowance. A short allowance is
/// [`CalibrationError::AllowanceNotGranted`] in vault mode and
/// [`CalibrationError::InsufficientLiquidity`] otherwise.
pub fn check_funding<L: TokenLedger + ?Sized>(
    ledger: &L,
    pool: &PoolKey,
    plan: &CalibrationPlan,
    source: Address,
    operator: Address,
    vault_mode: bool,
) -> Result<()> {
    let needs = [
        (pool.pair, plan.liquidity_withdrawn, "lp"),
        (pool.base, plan.settlement.required_base, "base"),
        (pool.quote, plan.settlement.required_quote, "quote"),
    ];

    for (token, needed, label) in needs {
        if needed.is_zero() {
            continue;
        }

        let balance = ledger.balance_of(token, source);
        if balance < needed {
            return Err(CalibrationError::insufficient(
                format!("{label} balance of {source:?}"),
                needed,
                balance,
            ));
        }

        if source == operator {
            continue;
        }
        let granted = ledger.allowance(token, source, operator);
        if granted < needed {
            return Err(if vault_mode {
                CalibrationError::AllowanceNotGranted {
                    token,
                    owner: source,
                    spender: operator,
                    needed,
                    granted,
                }
            } else {
                CalibrationError::insufficient(
                    format!("{label} allowance of {source:?}"),
                    needed,
                    granted,
                )
            });
        }
        debug!(asset = label, %needed, "Funding verified");
    }
    Ok(())
}
