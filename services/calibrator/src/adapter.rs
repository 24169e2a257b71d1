//! Collaborator seam onto an AMM deployment
//!
//! The calibrator never mutates pool state itself; it drives an
//! [`AmmAdapter`] (pair, router and token contracts of one AMM flavor) and
//! reads it through [`PoolView`].

use crate::error::{CalibrationError, Result};
use calibrator_amm::{Address, PoolKey, PoolView, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Uniswap-V2-family AMMs, selected by tag
///
/// All share the 0.3% swap fee; they differ in the share of fee growth the
/// factory's protocol fee takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AmmFlavor {
    Uni,
    Sushi,
    Quick,
    Spooky,
    Spirit,
    Pangolin,
    Ogx,
    Mdex,
}

impl AmmFlavor {
    pub const ALL: [AmmFlavor; 8] = [
        Self::Uni,
        Self::Sushi,
        Self::Quick,
        Self::Spooky,
        Self::Spirit,
        Self::Pangolin,
        Self::Ogx,
        Self::Mdex,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Uni => "UNI",
            Self::Sushi => "SUSHI",
            Self::Quick => "QUICK",
            Self::Spooky => "SPOOKY",
            Self::Spirit => "SPIRIT",
            Self::Pangolin => "PANGOLIN",
            Self::Ogx => "OGX",
            Self::Mdex => "MDEX",
        }
    }

    /// Protocol fee divisor while the fee is on: 5 takes 1/6 of fee growth,
    /// Mdex's default fee rate takes 1/2
    pub fn protocol_fee_divisor(&self) -> u32 {
        match self {
            Self::Mdex => 1,
            _ => 5,
        }
    }
}

impl fmt::Display for AmmFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AmmFlavor {
    type Err = CalibrationError;

    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|flavor| flavor.tag().eq_ignore_ascii_case(tag.trim()))
            .ok_or_else(|| CalibrationError::UnknownFlavor(tag.to_string()))
    }
}

/// Result of a router deposit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepositReceipt {
    pub amount_base: U256,
    pub amount_quote: U256,
    pub liquidity: U256,
}

/// Fungible token balances and allowances. An LP token is addressed by
/// its pool's address.
pub trait TokenLedger {
    fn balance_of(&self, token: Address, owner: Address) -> U256;

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256;

    /// `owner` lets `spender` move up to `amount`
    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256);

    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256)
        -> Result<()>;

    /// `spender` moves `amount` of `from`'s balance, consuming allowance
    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()>;
}

/// Pool operations of one AMM deployment
///
/// `sender` is the account paying in (LP for a withdraw, assets for a
/// deposit or swap); `recipient` receives the proceeds.
pub trait AmmAdapter: PoolView + TokenLedger {
    /// Opaque state captured before a sequence so it can be undone
    type Checkpoint;

    fn flavor(&self) -> AmmFlavor;

    /// Burn `liquidity` for `(amount_base, amount_quote)`
    fn withdraw(
        &mut self,
        pool: &PoolKey,
        liquidity: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<(U256, U256)>;

    /// Add liquidity at the pool ratio, using at most the desired amounts
    fn deposit(
        &mut self,
        pool: &PoolKey,
        base_desired: U256,
        quote_desired: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<DepositReceipt>;

    /// Swap `amount_in` base (or quote) for the other asset
    fn swap(
        &mut self,
        pool: &PoolKey,
        amount_in: U256,
        base_to_quote: bool,
        sender: Address,
        recipient: Address,
    ) -> Result<U256>;

    fn checkpoint(&self) -> Self::Checkpoint;

    fn rollback(&mut self, checkpoint: Self::Checkpoint);
}
