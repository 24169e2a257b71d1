//! Shared pool fixtures for calibrator integration tests

#![allow(dead_code)]

use calibrator::{
    AmmAdapter, AmmFlavor, Calibrator, PoolKey, RatioSolver, SimulatedAmm, SolverMode, TargetRatio,
    TokenLedger, VaultConfig,
};
use calibrator_amm::{Address, PoolView, U256};

pub const OPERATOR: u64 = 0x0e;
pub const OTHER_LP: u64 = 0x0f;

pub fn addr(id: u64) -> Address {
    Address::from_low_u64_be(id)
}

pub fn u(value: &str) -> U256 {
    U256::from_dec_str(value).unwrap()
}

pub fn target(base: u64, quote: u64) -> TargetRatio {
    TargetRatio::new(U256::from(base), U256::from(quote)).unwrap()
}

pub fn calibrator(mode: SolverMode, minimum_base: u64) -> Calibrator {
    Calibrator::new(
        addr(OPERATOR),
        RatioSolver::new(mode),
        VaultConfig::new(None, U256::from(minimum_base)),
    )
}

/// Empty pool with base above quote in address order
pub fn empty_pool(flavor: AmmFlavor) -> (SimulatedAmm, PoolKey) {
    let mut amm = SimulatedAmm::new(flavor);
    let (base, quote) = (addr(0xb0), addr(0xa0));
    let pair = amm.create_pool(base, quote).unwrap();
    (amm, PoolKey::new(pair, base, quote))
}

/// `owner` funds and deposits `(base, quote)`
pub fn provide(amm: &mut SimulatedAmm, pool: &PoolKey, owner: Address, base: U256, quote: U256) -> U256 {
    amm.mint_token(pool.base, owner, base);
    amm.mint_token(pool.quote, owner, quote);
    amm.deposit(pool, base, quote, owner, owner).unwrap().liquidity
}

/// Pool at ~803 quote per base whose LP is almost entirely the operator's
///
/// The operator seeds the pool, a second provider adds a dust position,
/// then the operator exits and re-enters so its base deposit matches the
/// original amount.
pub fn reference_pool() -> (SimulatedAmm, PoolKey) {
    let (mut amm, pool) = empty_pool(AmmFlavor::Uni);
    let operator = addr(OPERATOR);
    let wallet = u("1000000000000000000000000");
    amm.mint_token(pool.base, operator, wallet);
    amm.mint_token(pool.quote, operator, wallet);

    let seed_base = u("518159171586236237881");
    amm.deposit(&pool, seed_base, u("416532198152771088894342"), operator, operator)
        .unwrap();
    provide(&mut amm, &pool, addr(OTHER_LP), U256::from(518_000u64), U256::from(416_000u64));

    let liquidity = amm.balance_of(pool.pair, operator);
    amm.withdraw(&pool, liquidity, operator, operator).unwrap();
    let reserves = amm.get_reserves(&pool).unwrap();
    let base = seed_base - reserves.base;
    let quote = base * reserves.quote / reserves.base;
    amm.deposit(&pool, base, quote, operator, operator).unwrap();
    (amm, pool)
}
