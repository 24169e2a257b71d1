//! In-memory Uniswap-V2 deployment
//!
//! Pairs, LP tokens and asset tokens of one flavor, with the pair's exact
//! mint, burn and swap arithmetic. Pair token balances always mirror the
//! reserves. Each mutating call runs on a copy of the state and commits
//! only on success, and [`AmmAdapter::checkpoint`] captures the whole state
//! so a failed sequence can be undone.

use crate::adapter::{AmmAdapter, AmmFlavor, DepositReceipt, TokenLedger};
use crate::error::{CalibrationError, Result};
use calibrator_amm::{Address, AmmError, PoolKey, PoolReserves, PoolSnapshot, PoolView, U256};
use ethers_core::utils::keccak256;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
struct Pair {
    token0: Address,
    token1: Address,
    /// Reserves as `(token0, token1)`
    state: PoolSnapshot,
    fee_to: Option<Address>,
}

/// Complete ledger state, also used as the checkpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerState {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    pairs: HashMap<Address, Pair>,
}

impl LedgerState {
    fn balance(&self, token: Address, owner: Address) -> U256 {
        self.balances.get(&(token, owner)).copied().unwrap_or_default()
    }

    fn credit(&mut self, token: Address, owner: Address, amount: U256) {
        if amount.is_zero() {
            return;
        }
        *self.balances.entry((token, owner)).or_default() += amount;
    }

    fn debit(&mut self, token: Address, owner: Address, amount: U256) -> Result<()> {
        let balance = self.balance(token, owner);
        if balance < amount {
            return Err(CalibrationError::insufficient(
                format!("balance of {owner:?} in {token:?}"),
                amount,
                balance,
            ));
        }
        self.balances.insert((token, owner), balance - amount);
        Ok(())
    }

    fn move_balance(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        self.debit(token, from, amount)?;
        self.credit(token, to, amount);
        Ok(())
    }

    fn pair(&self, key: &PoolKey) -> Result<(&Pair, bool)> {
        let pair = self
            .pairs
            .get(&key.pair)
            .ok_or(AmmError::UnknownPool { pair: key.pair })?;
        if key.base == pair.token0 && key.quote == pair.token1 {
            Ok((pair, false))
        } else if key.base == pair.token1 && key.quote == pair.token0 {
            Ok((pair, true))
        } else {
            Err(AmmError::UnknownPool { pair: key.pair }.into())
        }
    }

    /// Pair state oriented as `key.base` / `key.quote`
    fn oriented(&self, key: &PoolKey) -> Result<PoolSnapshot> {
        let (pair, flipped) = self.pair(key)?;
        Ok(orient(pair.state, flipped))
    }

    fn store(&mut self, key: &PoolKey, oriented: PoolSnapshot) -> Result<()> {
        let (_, flipped) = self.pair(key)?;
        if let Some(pair) = self.pairs.get_mut(&key.pair) {
            pair.state = orient(oriented, flipped);
        }
        Ok(())
    }

    fn fee_to(&self, key: &PoolKey) -> Option<Address> {
        self.pairs.get(&key.pair).and_then(|pair| pair.fee_to)
    }
}

fn orient(mut snapshot: PoolSnapshot, flipped: bool) -> PoolSnapshot {
    if flipped {
        snapshot.reserves = PoolReserves::new(snapshot.reserves.quote, snapshot.reserves.base);
    }
    snapshot
}

/// Deterministic single-flavor AMM held in memory
#[derive(Debug, Clone)]
pub struct SimulatedAmm {
    flavor: AmmFlavor,
    state: LedgerState,
}

impl SimulatedAmm {
    pub fn new(flavor: AmmFlavor) -> Self {
        Self {
            flavor,
            state: LedgerState::default(),
        }
    }

    /// Address of the pair for two tokens, in either order
    pub fn pair_address(&self, token_a: Address, token_b: Address) -> Address {
        let (token0, token1) = sort_tokens(token_a, token_b);
        let mut preimage = Vec::with_capacity(self.flavor.tag().len() + 40);
        preimage.extend_from_slice(self.flavor.tag().as_bytes());
        preimage.extend_from_slice(token0.as_bytes());
        preimage.extend_from_slice(token1.as_bytes());
        Address::from_slice(&keccak256(preimage)[12..])
    }

    /// Create the pair for two tokens, returning the existing one if present
    pub fn create_pool(&mut self, token_a: Address, token_b: Address) -> Result<Address> {
        if token_a == token_b {
            return Err(CalibrationError::IdenticalTokens(token_a));
        }
        let address = self.pair_address(token_a, token_b);
        if !self.state.pairs.contains_key(&address) {
            let (token0, token1) = sort_tokens(token_a, token_b);
            self.state.pairs.insert(
                address,
                Pair {
                    token0,
                    token1,
                    state: PoolSnapshot::default(),
                    fee_to: None,
                },
            );
            debug!(pair = ?address, flavor = %self.flavor, "Pair created");
        }
        Ok(address)
    }

    /// Pool key for an existing pair, oriented as `base` / `quote`
    pub fn pool_key(&self, base: Address, quote: Address) -> Result<PoolKey> {
        let key = PoolKey::new(self.pair_address(base, quote), base, quote);
        self.state.pair(&key)?;
        Ok(key)
    }

    /// Switch the protocol fee on (recipient set) or off
    pub fn set_fee_to(&mut self, pair: Address, fee_to: Option<Address>) -> Result<()> {
        let divisor = self.flavor.protocol_fee_divisor();
        let entry = self
            .state
            .pairs
            .get_mut(&pair)
            .ok_or(AmmError::UnknownPool { pair })?;
        entry.fee_to = fee_to;
        entry.state.protocol_fee_divisor = fee_to.map(|_| divisor);
        Ok(())
    }

    /// Credit freshly issued tokens
    pub fn mint_token(&mut self, token: Address, to: Address, amount: U256) {
        self.state.credit(token, to, amount);
    }

    fn atomically<T>(&mut self, apply: impl FnOnce(&mut LedgerState) -> Result<T>) -> Result<T> {
        let mut next = self.state.clone();
        let value = apply(&mut next)?;
        self.state = next;
        Ok(value)
    }
}

fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

impl PoolView for SimulatedAmm {
    fn get_reserves(&self, pool: &PoolKey) -> calibrator_amm::Result<PoolReserves> {
        Ok(self.snapshot(pool)?.reserves)
    }

    fn total_supply(&self, pool: &PoolKey) -> calibrator_amm::Result<U256> {
        Ok(self.snapshot(pool)?.total_supply)
    }

    fn k_last(&self, pool: &PoolKey) -> calibrator_amm::Result<U256> {
        Ok(self.snapshot(pool)?.k_last)
    }

    fn protocol_fee_divisor(&self, pool: &PoolKey) -> calibrator_amm::Result<Option<u32>> {
        Ok(self.snapshot(pool)?.protocol_fee_divisor)
    }

    fn snapshot(&self, pool: &PoolKey) -> calibrator_amm::Result<PoolSnapshot> {
        self.state
            .oriented(pool)
            .map_err(|_| AmmError::UnknownPool { pair: pool.pair })
    }
}

impl TokenLedger for SimulatedAmm {
    fn balance_of(&self, token: Address, owner: Address) -> U256 {
        self.state.balance(token, owner)
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state.allowances.insert((token, owner, spender), amount);
    }

    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        self.atomically(|state| state.move_balance(token, from, to, amount))
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.atomically(|state| {
            if spender != from {
                let key = (token, from, spender);
                let granted = state.allowances.get(&key).copied().unwrap_or_default();
                if granted < amount {
                    return Err(CalibrationError::insufficient(
                        format!("allowance of {from:?} for {spender:?}"),
                        amount,
                        granted,
                    ));
                }
                // Unlimited approvals are never consumed
                if granted != U256::MAX {
                    state.allowances.insert(key, granted - amount);
                }
            }
            state.move_balance(token, from, to, amount)
        })
    }
}

impl AmmAdapter for SimulatedAmm {
    type Checkpoint = LedgerState;

    fn flavor(&self) -> AmmFlavor {
        self.flavor
    }

    fn withdraw(
        &mut self,
        pool: &PoolKey,
        liquidity: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<(U256, U256)> {
        let fee_to = self.state.fee_to(pool);
        self.atomically(|state| {
            let mut pair = state.oriented(pool)?;
            state.debit(pool.pair, sender, liquidity)?;
            let burned = pair.burn(liquidity)?;
            if let Some(fee_to) = fee_to {
                state.credit(pool.pair, fee_to, burned.fee_liquidity);
            }
            state.move_balance(pool.base, pool.pair, recipient, burned.amount_base)?;
            state.move_balance(pool.quote, pool.pair, recipient, burned.amount_quote)?;
            state.store(pool, pair)?;
            debug!(%liquidity, base = %burned.amount_base, quote = %burned.amount_quote, "Liquidity withdrawn");
            Ok((burned.amount_base, burned.amount_quote))
        })
    }

    fn deposit(
        &mut self,
        pool: &PoolKey,
        base_desired: U256,
        quote_desired: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<DepositReceipt> {
        let fee_to = self.state.fee_to(pool);
        self.atomically(|state| {
            let mut pair = state.oriented(pool)?;
            let (amount_base, amount_quote) = pair.deposit_amounts(base_desired, quote_desired)?;
            state.move_balance(pool.base, sender, pool.pair, amount_base)?;
            state.move_balance(pool.quote, sender, pool.pair, amount_quote)?;
            let minted = pair.mint(amount_base, amount_quote)?;
            if let Some(fee_to) = fee_to {
                state.credit(pool.pair, fee_to, minted.fee_liquidity);
            }
            state.credit(pool.pair, Address::zero(), minted.locked_liquidity);
            state.credit(pool.pair, recipient, minted.liquidity);
            state.store(pool, pair)?;
            debug!(base = %amount_base, quote = %amount_quote, liquidity = %minted.liquidity, "Liquidity deposited");
            Ok(DepositReceipt {
                amount_base,
                amount_quote,
                liquidity: minted.liquidity,
            })
        })
    }

    fn swap(
        &mut self,
        pool: &PoolKey,
        amount_in: U256,
        base_to_quote: bool,
        sender: Address,
        recipient: Address,
    ) -> Result<U256> {
        let (token_in, token_out) = if base_to_quote {
            (pool.base, pool.quote)
        } else {
            (pool.quote, pool.base)
        };
        self.atomically(|state| {
            let mut pair = state.oriented(pool)?;
            let invariant = pair.reserves.invariant();
            state.move_balance(token_in, sender, pool.pair, amount_in)?;
            let amount_out = pair.swap(amount_in, base_to_quote)?;
            if pair.reserves.invariant() < invariant {
                return Err(AmmError::insufficient_liquidity("swap breaks invariant").into());
            }
            state.move_balance(token_out, pool.pair, recipient, amount_out)?;
            state.store(pool, pair)?;
            debug!(%amount_in, %amount_out, base_to_quote, "Swapped");
            Ok(amount_out)
        })
    }

    fn checkpoint(&self) -> LedgerState {
        self.state.clone()
    }

    fn rollback(&mut self, checkpoint: LedgerState) {
        self.state = checkpoint;
    }
}
