//! Calibrator CLI
//!
//! Usage:
//!   calibrator solve --reserve-base 10000000000000000000 --reserve-quote 50000000000000000000 --target-base 4 --target-quote 10
//!   calibrator simulate --reserve-base 1_000000000000000000 --reserve-quote 0x56bc75e2d63100000 --target-base 1 --target-quote 12 --flavor MDEX
//!   calibrator pick-sell --reserve-base 10000 --reserve-quote 50000 --price-base 1 --price-quote 4 --start 0 --end 10000
//!   calibrator --config config/calibrator.toml --environment staging show-config

use anyhow::{Context, Result};
use calibrator::logging::init_tracing;
use calibrator::{
    plan_calibration, AmmAdapter, AmmFlavor, Calibrator, PoolKey, PoolReserves, SimulatedAmm,
    TargetRatio, TokenLedger,
};
use calibrator_amm::{price_of, serde_u256, Address, PoolView, RatioSolver, SolverMode, U256};
use calibrator_config::{defaults, CalibratorConfig};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "calibrator")]
#[command(about = "Rebalance constant-product pools onto a target reserve ratio")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay to apply (environments/<name>.toml)
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the single swap that moves the reserves onto the target
    Solve {
        #[command(flatten)]
        pool: PoolArgs,
        #[command(flatten)]
        target: TargetArgs,
        /// Overrides the configured solver (exact, closed_form)
        #[arg(long)]
        solver: Option<SolverMode>,
    },
    /// Seed an in-memory pool, then estimate and calibrate it
    Simulate {
        #[command(flatten)]
        pool: PoolArgs,
        #[command(flatten)]
        target: TargetArgs,
        /// AMM flavor tag, defaults to the configured one
        #[arg(long)]
        flavor: Option<AmmFlavor>,
    },
    /// Smallest base purchase reaching a price
    PickBuy(SearchArgs),
    /// Smallest base sale reaching a price
    PickSell(SearchArgs),
    /// Print the effective configuration
    ShowConfig,
}

#[derive(Args, Debug)]
struct PoolArgs {
    #[arg(long, value_parser = serde_u256::parse)]
    reserve_base: U256,
    #[arg(long, value_parser = serde_u256::parse)]
    reserve_quote: U256,
}

#[derive(Args, Debug)]
struct TargetArgs {
    #[arg(long, value_parser = serde_u256::parse)]
    target_base: U256,
    #[arg(long, value_parser = serde_u256::parse)]
    target_quote: U256,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[command(flatten)]
    pool: PoolArgs,
    #[arg(long, value_parser = serde_u256::parse)]
    price_base: U256,
    #[arg(long, value_parser = serde_u256::parse)]
    price_quote: U256,
    #[arg(long, value_parser = serde_u256::parse)]
    start: U256,
    #[arg(long, value_parser = serde_u256::parse)]
    end: U256,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, loaded_from) = load_config(&cli)?;
    init_tracing(&config.global)?;
    match loaded_from {
        Some(path) => info!("📂 Configuration loaded from {:?}", path),
        None => warn!("No configuration file found, using defaults"),
    }

    let calibrator = Calibrator::from_config(&config);
    let output = match cli.command {
        Command::Solve {
            pool,
            target,
            solver,
        } => {
            let solver = solver.map(RatioSolver::new).unwrap_or(calibrator.solver());
            let reserves = pool.reserves();
            let plan = solver.solve(&reserves, &target.ratio()?)?;
            json!({ "solver": solver.mode(), "plan": plan })
        }
        Command::Simulate {
            pool,
            target,
            flavor,
        } => {
            let flavor = match flavor {
                Some(flavor) => flavor,
                None => config.calibrator.flavor.parse()?,
            };
            simulate(&calibrator, flavor, &pool.reserves(), &target.ratio()?)?
        }
        Command::PickBuy(args) => {
            let swap = calibrator.pick_buy(&args.pool.reserves(), &args.price()?, args.start, args.end)?;
            json!(swap)
        }
        Command::PickSell(args) => {
            let swap = calibrator.pick_sell(&args.pool.reserves(), &args.price()?, args.start, args.end)?;
            json!(swap)
        }
        Command::ShowConfig => {
            print!("{}", config.to_toml()?);
            return Ok(());
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<(CalibratorConfig, Option<PathBuf>)> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            let default = PathBuf::from(defaults::CONFIG_PATH);
            if !default.exists() {
                return Ok((CalibratorConfig::default(), None));
            }
            default
        }
    };
    let config = CalibratorConfig::load(Some(Path::new(&path)), cli.environment.as_deref())
        .with_context(|| format!("Failed to load configuration from {path:?}"))?;
    Ok((config, Some(path)))
}

/// Seed a pool owned by the funding source, then estimate and calibrate it
fn simulate(
    calibrator: &Calibrator,
    flavor: AmmFlavor,
    reserves: &PoolReserves,
    target: &TargetRatio,
) -> Result<serde_json::Value> {
    let operator = calibrator.operator();
    let source = calibrator.vault_config().source_for(operator);
    let (base, quote) = (Address::from_low_u64_be(0xba5e), Address::from_low_u64_be(0x9007e));

    let mut amm = SimulatedAmm::new(flavor);
    let pool = PoolKey::new(amm.create_pool(base, quote)?, base, quote);
    amm.mint_token(base, source, reserves.base);
    amm.mint_token(quote, source, reserves.quote);
    amm.deposit(&pool, reserves.base, reserves.quote, source, source)
        .context("Failed to seed pool")?;
    if source != operator {
        for token in [pool.pair, base, quote] {
            amm.approve(token, source, operator, U256::MAX);
        }
    }

    // The source supplies whatever the plan requires
    let vault = calibrator.vault_config();
    let plan = plan_calibration(
        &amm.snapshot(&pool)?,
        amm.balance_of(pool.pair, source),
        target,
        vault.minimum_base(),
        &calibrator.solver(),
    )?;
    amm.mint_token(base, source, plan.settlement.required_base);
    amm.mint_token(quote, source, plan.settlement.required_quote);

    let estimate = calibrator.estimate(&amm, &pool, target, operator)?;
    let settlement = calibrator.calibrate(&mut amm, &pool, target, operator, source)?;

    Ok(json!({
        "flavor": amm.flavor(),
        "pool": pool,
        "estimate": estimate,
        "settlement": settlement,
        "outcome_price": price_of(&settlement.reserves_after())?,
    }))
}

impl PoolArgs {
    fn reserves(&self) -> PoolReserves {
        PoolReserves::new(self.reserve_base, self.reserve_quote)
    }
}

impl TargetArgs {
    fn ratio(&self) -> Result<TargetRatio> {
        Ok(TargetRatio::new(self.target_base, self.target_quote)?)
    }
}

impl SearchArgs {
    fn price(&self) -> Result<TargetRatio> {
        Ok(TargetRatio::new(self.price_base, self.price_quote)?)
    }
}
