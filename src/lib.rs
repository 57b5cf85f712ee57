// perps-custody: multi-asset custody pool engine.
// one pool holds several tokens, issues an LP token over their oracle value,
// swaps between them and backs leveraged long/short positions.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: ids, Side, PositionKey, Price, Bps, Timestamp
//   2.x  math.rs: fixed point conversions, checked u64 math, fees
//   3.x  custody.rs: custody record, Assets (collateral / owned / locked)
//   4.x  oracle.rs: test and external price accounts, validation
//   5.x  ledger.rs: mints, balances, atomic transfer batches
//   6.x  pool.rs: pool record, AUM and LP unit value
//   7.x  swap.rs: oracle priced swap quotes
//   8.x  liquidity.rs: LP mint / burn quotes
//   9.x  position.rs: position struct, leverage, pnl, close settlement
//   10.x liquidation.rs: health, liquidation price, reward split
//   11.x events.rs: state transition events for audit
//   12.x config.rs: deployment config, json + demo preset
//   13.x engine/: admin, swaps, liquidity, positions, liquidations, views
//   14.x logging.rs: tracing subscriber setup

// core modules
pub mod custody;
pub mod engine;
pub mod events;
pub mod liquidation;
pub mod liquidity;
pub mod math;
pub mod oracle;
pub mod pool;
pub mod position;
pub mod swap;
pub mod types;

// integration modules
pub mod config;
pub mod ledger;
pub mod logging;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use types::*;
pub use config::{ConfigError, DeployedPool, DeployedToken, Deployment, DeploymentConfig};
pub use custody::{Assets, Custody, CustodyError, Fees, PricingParams};
pub use ledger::{Holder, LedgerError, TokenLedger, TokenOp};
pub use liquidation::{LiquidationParams, LiquidationState, RewardSplit};
pub use liquidity::{AddLiquidityQuote, RemoveLiquidityQuote};
pub use math::MathError;
pub use oracle::{
    ExternalPriceAccount, OracleAccount, OracleError, OracleParams, OraclePrice, OracleType, PriceQuote, PriceSource,
    TestOracle,
};
pub use pool::{Pool, PoolValuation};
pub use position::{Pnl, Position, PositionError};
pub use swap::SwapQuote;
