//! # Calibrator - Constant-Product Pool Rebalancing
//!
//! ## Purpose
//!
//! Moves a Uniswap-V2-style pool onto a target reserve ratio while keeping
//! the liquidity provider's base exposure: withdraw the position (less a
//! configurable base retention), swap once to the target, re-add the base
//! that was taken out, and settle the quote difference with the provider.
//!
//! ## Integration Points
//!
//! - **Input**: an [`AmmAdapter`] for one AMM flavor, a [`PoolKey`], a
//!   [`TargetRatio`] and the calling account
//! - **Output**: a [`Settlement`] with required and returned amounts, the
//!   provider's LP after calibration and the final reserves
//! - **Funding**: the caller, or a configured vault, approves the operator
//!   account for LP and any assets it must supply
//!
//! ## Architecture Role
//!
//! ```text
//! Calibrator::estimate ─┐
//!                       ├─> plan_calibration(snapshot) ─> CalibrationPlan
//! Calibrator::calibrate ┘                                      │
//!        │                                                     │
//!        └──── replay operations, verify, rollback on error <──┘
//! ```
//!
//! Estimation and execution share the pure planner, so an estimate always
//! equals the settlement of a calibration from the same state.

pub mod adapter;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod planner;
pub mod settlement;
pub mod simulated;
pub mod vault;

pub use adapter::{AmmAdapter, AmmFlavor, DepositReceipt, TokenLedger};
pub use error::{CalibrationError, ErrorKind, Result};
pub use orchestrator::Calibrator;
pub use planner::plan_calibration;
pub use settlement::{Asset, CalibrationPlan, PoolOperation, Settlement};
pub use simulated::{LedgerState, SimulatedAmm};
pub use vault::{check_funding, VaultConfig};

pub use calibrator_amm::{PoolKey, PoolReserves, RatioSolver, SolverMode, TargetRatio};
