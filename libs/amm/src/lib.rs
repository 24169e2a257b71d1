//! # Calibrator AMM Library - Exact Constant-Product Mathematics
//!
//! ## Purpose
//!
//! Integer mathematics for Uniswap-V2-style pools: fee-aware swap formulas,
//! liquidity mint/burn accounting with protocol fee accrual, the swap sizing
//! that moves a pool onto a target reserve ratio, and a bounded search for
//! the swap that crosses a price threshold. Every result truncates exactly
//! like the on-chain pair and router so plans computed here replay on a
//! live pool without drift.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Pool snapshots read through [`PoolView`], target
//!   ratios and price thresholds from callers
//! - **Output Destinations**: The rebalancing planner and orchestrator in the
//!   `calibrator` service, CLI tooling
//! - **Protocol Support**: Uniswap V2 and its forks with a 0.3% swap fee
//! - **Precision**: 256-bit amounts, 512-bit intermediates, no floating point
//!
//! ## Architecture Role
//!
//! Leaf library with no I/O and no shared state. [`RatioSolver`] sizes the
//! rebalancing swap, [`PriceSearch`] answers price-threshold queries and
//! [`PoolSnapshot`] simulates pool operations for dry runs.
//!
//! ## Performance Profile
//!
//! - **Swap formulas**: a handful of 512-bit multiplications and one division
//! - **Square root**: Newton's method, O(log x) iterations from a bit-length seed
//! - **Price search**: O(log(end - start)) swap evaluations

pub mod error;
pub mod pool_traits;
pub mod price_search;
pub mod ratio_solver;
pub mod serde_u256;
pub mod v2_math;

pub use error::{AmmError, Result};
pub use pool_traits::{BurnOutcome, MintOutcome, PoolKey, PoolReserves, PoolSnapshot, PoolView};
pub use price_search::{PickedSwap, PriceSearch};
pub use ratio_solver::{price_of, RatioSolver, RebalancePlan, SolverMode, TargetRatio};
pub use v2_math::{V2Math, FEE_DENOMINATOR, FEE_NUMERATOR, MINIMUM_LIQUIDITY};

/// Common types for AMM calculations
pub use ethers_core::types::{Address, U256, U512};
pub use rust_decimal::Decimal;
