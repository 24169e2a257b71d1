//! Funding sources, failure atomicity and flavor coverage

mod common;

use calibrator::{
    AmmAdapter, AmmFlavor, CalibrationError, DepositReceipt, ErrorKind, LedgerState, PoolKey,
    SimulatedAmm, SolverMode, TargetRatio, TokenLedger,
};
use calibrator_amm::{Address, PoolReserves, PoolSnapshot, PoolView, U256};
use common::*;
use std::sync::Arc;

const VAULT: u64 = 0x7a;
const CALLER: u64 = 0x42;

/// 10:50 pool whose LP belongs to `owner`
fn owned_pool(flavor: AmmFlavor, owner: Address) -> (SimulatedAmm, PoolKey) {
    let (mut amm, pool) = empty_pool(flavor);
    provide(
        &mut amm,
        &pool,
        owner,
        u("10000000000000000000"),
        u("50000000000000000000"),
    );
    (amm, pool)
}

fn approve_all(amm: &mut SimulatedAmm, pool: &PoolKey, owner: Address) {
    for token in [pool.pair, pool.base, pool.quote] {
        amm.approve(token, owner, addr(OPERATOR), U256::MAX);
    }
}

#[test]
fn test_vault_without_allowance_changes_nothing() {
    let vault = addr(VAULT);
    let (mut amm, pool) = owned_pool(AmmFlavor::Uni, vault);
    let calibrator = calibrator(SolverMode::Exact, 100_000);
    calibrator.set_vault(Some(vault));
    let before = amm.checkpoint();

    let estimated = calibrator.estimate(&amm, &pool, &target(4, 10), addr(CALLER));
    let result = calibrator.calibrate(&mut amm, &pool, &target(4, 10), addr(CALLER), vault);

    assert_eq!(estimated, result);
    match result {
        Err(CalibrationError::AllowanceNotGranted {
            token,
            owner,
            spender,
            granted,
            ..
        }) => {
            assert_eq!(token, pool.pair);
            assert_eq!(owner, vault);
            assert_eq!(spender, addr(OPERATOR));
            assert!(granted.is_zero());
        }
        other => panic!("expected missing allowance, got {other:?}"),
    }
    assert_eq!(amm.checkpoint(), before);
}

#[test]
fn test_vault_funds_any_caller() {
    let vault = addr(VAULT);
    let (mut amm, pool) = owned_pool(AmmFlavor::Uni, vault);
    approve_all(&mut amm, &pool, vault);
    let calibrator = calibrator(SolverMode::Exact, 100_000);
    calibrator.set_vault(Some(vault));

    let estimated = calibrator
        .estimate(&amm, &pool, &target(4, 10), addr(CALLER))
        .unwrap();
    let settled = calibrator
        .calibrate(&mut amm, &pool, &target(4, 10), addr(CALLER), vault)
        .unwrap();
    assert_eq!(estimated, settled);

    assert_eq!(settled.leftover_quote, u("24999929634946100369"));
    assert_eq!(amm.balance_of(pool.quote, vault), settled.leftover_quote);
    assert_eq!(amm.balance_of(pool.pair, vault), settled.leftover_liquidity);
    assert!(amm.balance_of(pool.pair, addr(CALLER)).is_zero());
    assert!(amm.balance_of(pool.quote, addr(OPERATOR)).is_zero());
    assert!(amm.balance_of(pool.base, addr(OPERATOR)).is_zero());
}

#[test]
fn test_required_quote_is_pulled_from_vault() {
    let vault = addr(VAULT);
    let (mut amm, pool) = owned_pool(AmmFlavor::Sushi, vault);
    amm.mint_token(pool.quote, vault, u("100000000000000000000"));
    approve_all(&mut amm, &pool, vault);
    let calibrator = calibrator(SolverMode::Exact, 100_000);
    calibrator.set_vault(Some(vault));

    let settled = calibrator
        .calibrate(&mut amm, &pool, &target(1, 12), addr(CALLER), vault)
        .unwrap();
    assert!(!settled.required_quote.is_zero());
    assert!(settled.leftover_quote.is_zero());
    assert_eq!(
        amm.balance_of(pool.quote, vault),
        u("100000000000000000000") - settled.required_quote
    );
    let reserves = amm.get_reserves(&pool).unwrap();
    assert!(target(1, 12).deviation(&reserves).unwrap() < rust_decimal_macros::dec!(0.001));
}

#[test]
fn test_direct_caller_needs_allowance() {
    let caller = addr(CALLER);
    let (mut amm, pool) = owned_pool(AmmFlavor::Quick, caller);
    let calibrator = calibrator(SolverMode::Exact, 100_000);

    let error = calibrator
        .calibrate(&mut amm, &pool, &target(4, 10), caller, caller)
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InsufficientLiquidity);

    approve_all(&mut amm, &pool, caller);
    let settled = calibrator
        .calibrate(&mut amm, &pool, &target(4, 10), caller, caller)
        .unwrap();
    assert_eq!(amm.balance_of(pool.pair, caller), settled.leftover_liquidity);
}

#[test]
fn test_minimum_base_above_position() {
    let (mut amm, pool) = owned_pool(AmmFlavor::Uni, addr(OPERATOR));
    let calibrator = calibrator(SolverMode::Exact, 0);
    calibrator.set_minimum_base(u("20000000000000000000"));

    let operator = calibrator.operator();
    let error = calibrator
        .calibrate(&mut amm, &pool, &target(4, 10), operator, operator)
        .unwrap_err();
    assert!(matches!(
        error,
        CalibrationError::InsufficientLiquidity { ref context, .. } if context.contains("minimum base")
    ));
}

#[test]
fn test_target_on_current_ratio_is_no_op() {
    let (mut amm, pool) = owned_pool(AmmFlavor::Uni, addr(OPERATOR));
    let calibrator = calibrator(SolverMode::Exact, 0);
    let operator = calibrator.operator();
    let before = amm.checkpoint();

    let settled = calibrator
        .calibrate(&mut amm, &pool, &target(2, 10), operator, operator)
        .unwrap();
    assert!(settled.is_no_op());
    assert_eq!(settled.leftover_liquidity, amm.balance_of(pool.pair, operator));
    assert_eq!(amm.checkpoint(), before);
}

#[test]
fn test_invalid_inputs_map_to_error_kinds() {
    let (mut amm, pool) = owned_pool(AmmFlavor::Uni, addr(OPERATOR));
    let calibrator = calibrator(SolverMode::Exact, 0);
    let operator = calibrator.operator();

    let zero = TargetRatio {
        base: U256::zero(),
        quote: U256::from(10u64),
    };
    let error = calibrator
        .calibrate(&mut amm, &pool, &zero, operator, operator)
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidTarget);

    let (empty, empty_key) = empty_pool(AmmFlavor::Uni);
    let error = calibrator
        .estimate(&empty, &empty_key, &target(4, 10), operator)
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::DivisionByZero);

    let unknown = PoolKey::new(addr(0xdead), pool.base, pool.quote);
    let error = calibrator
        .estimate(&amm, &unknown, &target(4, 10), operator)
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Other);
}

#[test]
fn test_every_flavor_settles_as_estimated() {
    for flavor in AmmFlavor::ALL {
        let (mut amm, pool) = owned_pool(flavor, addr(OPERATOR));
        assert_eq!(amm.flavor(), flavor);
        let calibrator = calibrator(SolverMode::Exact, 100_000);
        let operator = calibrator.operator();

        let estimated = calibrator
            .estimate(&amm, &pool, &target(4, 10), operator)
            .unwrap();
        let settled = calibrator
            .calibrate(&mut amm, &pool, &target(4, 10), operator, operator)
            .unwrap();
        assert_eq!(estimated, settled, "{flavor}");
        assert_eq!(settled.reserve_quote_after, u("25000070365053899631"), "{flavor}");
    }
}

#[test]
fn test_protocol_fee_is_planned_exactly() {
    for flavor in [AmmFlavor::Uni, AmmFlavor::Mdex] {
        let treasury = addr(0x7e);
        let (mut amm, pool) = owned_pool(flavor, addr(OPERATOR));
        amm.set_fee_to(pool.pair, Some(treasury)).unwrap();

        // a small deposit anchors the fee checkpoint, then outside trading
        // grows the invariant
        let trader = addr(0x55);
        provide(&mut amm, &pool, trader, u("1000000000"), u("5000000000"));
        amm.mint_token(pool.base, trader, u("3000000000000000000"));
        amm.swap(&pool, u("3000000000000000000"), true, trader, trader)
            .unwrap();
        let back = amm.balance_of(pool.quote, trader);
        amm.swap(&pool, back, false, trader, trader).unwrap();

        let calibrator = calibrator(SolverMode::Exact, 100_000);
        let operator = calibrator.operator();
        let fee_before = amm.balance_of(pool.pair, treasury);

        let estimated = calibrator
            .estimate(&amm, &pool, &target(4, 10), operator)
            .unwrap();
        let settled = calibrator
            .calibrate(&mut amm, &pool, &target(4, 10), operator, operator)
            .unwrap();
        assert_eq!(estimated, settled, "{flavor}");
        assert_eq!(amm.balance_of(pool.pair, operator), settled.leftover_liquidity);
        assert!(amm.balance_of(pool.pair, treasury) > fee_before);
        assert_eq!(
            amm.k_last(&pool).unwrap(),
            settled.reserve_base_after * settled.reserve_quote_after
        );
    }
}

/// Adapter whose router refuses deposits
struct DepositsPaused(SimulatedAmm);

impl PoolView for DepositsPaused {
    fn get_reserves(&self, pool: &PoolKey) -> calibrator_amm::Result<PoolReserves> {
        self.0.get_reserves(pool)
    }

    fn total_supply(&self, pool: &PoolKey) -> calibrator_amm::Result<U256> {
        self.0.total_supply(pool)
    }

    fn k_last(&self, pool: &PoolKey) -> calibrator_amm::Result<U256> {
        self.0.k_last(pool)
    }

    fn protocol_fee_divisor(&self, pool: &PoolKey) -> calibrator_amm::Result<Option<u32>> {
        self.0.protocol_fee_divisor(pool)
    }

    fn snapshot(&self, pool: &PoolKey) -> calibrator_amm::Result<PoolSnapshot> {
        self.0.snapshot(pool)
    }
}

impl TokenLedger for DepositsPaused {
    fn balance_of(&self, token: Address, owner: Address) -> U256 {
        self.0.balance_of(token, owner)
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.0.allowance(token, owner, spender)
    }

    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.0.approve(token, owner, spender, amount)
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> calibrator::Result<()> {
        self.0.transfer(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> calibrator::Result<()> {
        self.0.transfer_from(token, spender, from, to, amount)
    }
}

impl AmmAdapter for DepositsPaused {
    type Checkpoint = LedgerState;

    fn flavor(&self) -> AmmFlavor {
        self.0.flavor()
    }

    fn withdraw(
        &mut self,
        pool: &PoolKey,
        liquidity: U256,
        sender: Address,
        recipient: Address,
    ) -> calibrator::Result<(U256, U256)> {
        self.0.withdraw(pool, liquidity, sender, recipient)
    }

    fn deposit(
        &mut self,
        _pool: &PoolKey,
        base_desired: U256,
        _quote_desired: U256,
        _sender: Address,
        _recipient: Address,
    ) -> calibrator::Result<DepositReceipt> {
        Err(CalibrationError::insufficient(
            "router paused",
            base_desired,
            U256::zero(),
        ))
    }

    fn swap(
        &mut self,
        pool: &PoolKey,
        amount_in: U256,
        base_to_quote: bool,
        sender: Address,
        recipient: Address,
    ) -> calibrator::Result<U256> {
        self.0.swap(pool, amount_in, base_to_quote, sender, recipient)
    }

    fn checkpoint(&self) -> LedgerState {
        self.0.checkpoint()
    }

    fn rollback(&mut self, checkpoint: LedgerState) {
        self.0.rollback(checkpoint)
    }
}

#[test]
fn test_failure_after_withdraw_and_swap_rolls_back() {
    let vault = addr(VAULT);
    let (mut inner, pool) = owned_pool(AmmFlavor::Spooky, vault);
    approve_all(&mut inner, &pool, vault);
    let mut amm = DepositsPaused(inner);
    let calibrator = calibrator(SolverMode::Exact, 100_000);
    calibrator.set_vault(Some(vault));
    let before = amm.checkpoint();

    // planning succeeds, execution fails at the deposit
    assert!(calibrator
        .estimate(&amm, &pool, &target(4, 10), vault)
        .is_ok());
    let result = calibrator.calibrate(&mut amm, &pool, &target(4, 10), vault, vault);
    assert!(result.is_err());
    assert_eq!(amm.checkpoint(), before);
    assert_eq!(
        amm.allowance(pool.pair, vault, addr(OPERATOR)),
        U256::MAX
    );
}

#[test]
fn test_shared_calibrator_across_threads() {
    let calibrator = Arc::new(calibrator(SolverMode::Exact, 100_000));
    let settlements: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let calibrator = Arc::clone(&calibrator);
                scope.spawn(move || {
                    let (mut amm, pool) = owned_pool(AmmFlavor::Pangolin, addr(OPERATOR));
                    let operator = calibrator.operator();
                    calibrator
                        .calibrate(&mut amm, &pool, &target(4, 10), operator, operator)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert!(settlements.windows(2).all(|pair| pair[0] == pair[1]));
}
