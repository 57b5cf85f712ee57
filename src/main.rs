//! Custody pool engine simulation.
//!
//! Deploys a two-token pool and walks through liquidity, swaps, leveraged
//! positions, liquidation and oracle failures.
//!
//! usage: perps-custody-sim [--config deployment.json] [--log-level info] [--json]

use clap::Parser;
use perps_custody::*;
use rust_decimal_macros::dec;
use std::error::Error;
use std::path::PathBuf;

const ADMIN: AccountId = AccountId(1);
const ALICE: AccountId = AccountId(100);
const BOB: AccountId = AccountId(101);
const CAROL: AccountId = AccountId(102);
const KEEPER: AccountId = AccountId(200);

#[derive(Parser, Debug)]
#[command(author, version, about = "custody pool engine simulation")]
struct Args {
    /// Deployment json; only deploys and prints pool values when given
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as json lines
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::setup_logging(&args.log_level, args.json);

    let config = match &args.config {
        Some(path) => DeploymentConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => DeploymentConfig::demo(),
    };

    println!("Custody Pool Engine Simulation");
    println!("One pool, oracle priced swaps, LP shares, leveraged positions\n");

    if args.config.is_some() {
        let (engine, deployment) = start(&config)?;
        for pool in &deployment.pools {
            println!("  Deployed {} ({} tokens), AUM ${}", pool.name, pool.tokens.len(), engine.assets_under_management(pool.id)?);
        }
        return Ok(());
    }

    scenario_1_liquidity_and_swap(&config)?;
    scenario_2_position_lifecycle(&config)?;
    scenario_3_liquidation(&config)?;
    scenario_4_oracle_failures(&config)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

struct Demo {
    engine: Engine,
    pool: PoolId,
    a: DeployedToken,
    b: DeployedToken,
}

// clock starts at wall time, initial prices are published then
fn start(config: &DeploymentConfig) -> Result<(Engine, Deployment), ConfigError> {
    let mut engine = Engine::new(config.engine.clone());
    engine.set_time(Timestamp::now());
    let deployment = config.apply(&mut engine, ADMIN)?;
    Ok((engine, deployment))
}

fn deploy(config: &DeploymentConfig) -> Result<Demo, Box<dyn Error>> {
    let (engine, deployment) = start(config)?;
    let pool = deployment.pool("pool1").ok_or("demo pool missing")?;
    let a = pool.token("A").ok_or("token A missing")?.clone();
    let b = pool.token("B").ok_or("token B missing")?.clone();
    Ok(Demo {
        pool: pool.id,
        engine,
        a,
        b,
    })
}

/// LP deposits into both custodies, a swap, then a withdrawal.
fn scenario_1_liquidity_and_swap(config: &DeploymentConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Liquidity and Swap\n");
    let Demo { mut engine, pool, a, b } = deploy(config)?;

    engine.fund(ALICE, a.mint, 10_000_000_000)?;
    engine.fund(ALICE, b.mint, 10_000_000)?;
    engine.fund(BOB, a.mint, 5_000_000_000)?;

    let add_a = engine.add_liquidity(ALICE, pool, a.custody, 10_000_000_000)?;
    let add_b = engine.add_liquidity(ALICE, pool, b.custody, 10_000_000)?;
    println!("  Alice adds 10 A @ $1.23: {} LP", add_a.lp_minted);
    println!("  Alice adds 10 B @ $2.00: {} LP", add_b.lp_minted);
    println!("  AUM ${}, LP price ${}\n", engine.assets_under_management(pool)?, engine.lp_token_price(pool)?);

    let swap = engine.swap(BOB, pool, a.custody, b.custody, 5_000_000_000, 3_000_000)?;
    println!("  Bob swaps 5 A for {} B (fee {})", swap.amount_out, swap.fee);

    let removed = engine.remove_liquidity(ALICE, pool, a.custody, 10_000_000)?;
    let custody_a = engine.custody(a.custody)?;
    println!("  Alice burns 10 LP for {} A (${})", removed.amount_out, removed.usd_value);
    println!("  Custody A owned: {}, vault: {}\n", custody_a.assets.owned, engine.vault_balance(a.custody)?);
    Ok(())
}

/// Long position: open, price rises, partial close, full close.
fn scenario_2_position_lifecycle(config: &DeploymentConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Position Lifecycle\n");
    let Demo { mut engine, pool, b, .. } = deploy(config)?;

    engine.fund(ALICE, b.mint, 1_000_000_000)?;
    engine.fund(CAROL, b.mint, 100_000_000)?;
    engine.add_liquidity(ALICE, pool, b.custody, 1_000_000_000)?;

    let entry = Price::new_unchecked(dec!(2));
    let position = engine.open_position(CAROL, pool, b.custody, Side::Long, entry, 10_000_000, 50_000_000)?;
    println!(
        "  Carol opens LONG {} B with {} collateral @ ${} ({} bps)",
        position.size,
        position.collateral,
        position.entry_price,
        position.leverage_bps()
    );
    println!("  Custody B locked: {}", engine.custody(b.custody)?.assets.locked);

    engine.advance_time(10);
    let now = engine.time();
    engine.set_test_oracle_price(ADMIN, pool, b.custody, 220, -2, 0, now)?;
    let pnl = engine.position_pnl(&position.key)?;
    println!("  Price moves to $2.20, unrealized pnl ${} ({} B)", pnl.usd, pnl.profit);

    let exit = Price::new_unchecked(dec!(2.2));
    let half = engine.close_position(CAROL, position.key, exit, 25_000_000)?;
    println!("  Carol closes half: payout {} B, pnl ${}", half.payout, half.pnl_usd);
    let rest = engine.close_position(CAROL, position.key, exit, half.remaining_size)?;
    println!("  Carol closes the rest: payout {} B, pnl ${}", rest.payout, rest.pnl_usd);

    let assets = engine.custody(b.custody)?.assets;
    println!(
        "  Custody B owned {}, locked {}, collateral {}, vault {}\n",
        assets.owned,
        assets.locked,
        assets.collateral,
        engine.vault_balance(b.custody)?
    );
    Ok(())
}

/// High leverage long liquidated by a keeper after a price drop.
fn scenario_3_liquidation(config: &DeploymentConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Liquidation\n");
    let Demo { mut engine, pool, b, .. } = deploy(config)?;

    engine.fund(ALICE, b.mint, 1_000_000_000)?;
    engine.fund(CAROL, b.mint, 10_000_000)?;
    engine.add_liquidity(ALICE, pool, b.custody, 1_000_000_000)?;

    let entry = Price::new_unchecked(dec!(2));
    let position = engine.open_position(CAROL, pool, b.custody, Side::Long, entry, 10_000_000, 90_000_000)?;
    let state = engine.liquidation_state(&position.key)?;
    println!("  Carol opens LONG 90 B with 10 B collateral @ $2.00");
    if let Some(price) = state.liquidation_price {
        println!("  Liquidation price ${}", price);
    }

    if let Err(err) = engine.liquidate(KEEPER, position.key) {
        println!("  Keeper tries early: {} ({:?})", err, err.code());
    }

    for cents in [195u64, 190, 185, 181] {
        engine.advance_time(5);
        let now = engine.time();
        engine.set_test_oracle_price(ADMIN, pool, b.custody, cents, -2, 0, now)?;
        let candidates = engine.liquidatable_positions(pool)?;
        println!("  Price ${}.{:02}: {} liquidatable", cents / 100, cents % 100, candidates.len());
        for key in candidates {
            let result = engine.liquidate(KEEPER, key)?;
            println!(
                "    {} liquidated, owner gets {} B, keeper {} B, pnl ${}",
                result.key, result.owner_payout, result.reward, result.pnl_usd
            );
        }
    }
    println!("  Open positions: {}\n", engine.positions_iter().count());
    Ok(())
}

/// Stale and unset oracle prices block pricing operations.
fn scenario_4_oracle_failures(config: &DeploymentConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Oracle Failures\n");
    let Demo { mut engine, pool, a, b } = deploy(config)?;

    engine.fund(ALICE, a.mint, 1_000_000_000)?;
    engine.advance_time(120);
    match engine.add_liquidity(ALICE, pool, a.custody, 1_000_000_000) {
        Err(err) => println!("  Deposit after 120s without a price update: {} ({:?})", err, err.code()),
        Ok(_) => println!("  Deposit unexpectedly accepted"),
    }

    let now = engine.time();
    engine.set_test_oracle_price(ADMIN, pool, a.custody, 123, -2, 0, now)?;
    engine.set_test_oracle_price(ADMIN, pool, b.custody, 200, -2, 10, now)?;
    match engine.add_liquidity(ALICE, pool, a.custody, 1_000_000_000) {
        Err(err) => println!("  Deposit with B's confidence too wide: {} ({:?})", err, err.code()),
        Ok(_) => println!("  Deposit unexpectedly accepted"),
    }

    if let Err(err) = engine.set_test_oracle_price(BOB, pool, a.custody, 1, 0, 0, now) {
        println!("  Bob sets a price: {} ({:?})", err, err.code());
    }
    println!("  Events recorded: {}", engine.events().len());
    for event in engine.recent_events(3) {
        println!("    #{} {}", event.id.0, event.payload.name());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults() {
        let args = Args::try_parse_from(["perps-custody-sim"]).unwrap();
        assert!(args.config.is_none());
        assert_eq!(args.log_level, "info");
        assert!(!args.json);
    }

    #[test]
    fn args_flags() {
        let args = Args::try_parse_from([
            "perps-custody-sim",
            "--config",
            "pools.json",
            "--log-level",
            "debug",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("pools.json")));
        assert_eq!(args.log_level, "debug");
        assert!(args.json);
        assert!(Args::try_parse_from(["perps-custody-sim", "--verbose"]).is_err());
    }

    #[test]
    fn simulation_clock_starts_at_wall_time() {
        let before = Timestamp::now();
        let demo = deploy(&DeploymentConfig::demo()).unwrap();
        assert!(demo.engine.time() >= before);
        // initial prices are fresh at the start time
        assert!(demo.engine.pool_valuation(demo.pool).is_ok());
    }
}
