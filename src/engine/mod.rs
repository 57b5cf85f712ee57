// 13.x: custody pool engine. coordinates admin setup, swaps, liquidity,
// positions and liquidations against one token ledger.
// deterministic and event-driven: time only moves when the host sets it.
//
//   13.0 core.rs: state, clock, lookups, shared checks
//   13.3 admin.rs: init, add_pool, add_token, oracle prices
//   13.4 swaps.rs
//   13.5 liquidity.rs
//   13.6 positions.rs: open / close
//   13.7 liquidations.rs
//   13.8 views.rs: AUM, LP price, pnl, health

mod admin;
mod config;
mod core;
mod liquidations;
mod liquidity;
mod positions;
mod results;
mod swaps;
mod views;

pub use admin::Perpetuals;
pub use config::EngineConfig;
pub use core::Engine;
pub use results::{ClosePositionResult, EngineError, ErrorCode, LiquidationResult};
