//! Liquidation conditions and reward split.
//!
//! A position is liquidatable once its margin ratio `(collateral + pnl) / size`
//! drops below `1 / max_leverage`, i.e. once its current leverage is above what
//! the custody would allow at open. Liquidation settles the position like a
//! full close at the oracle price and pays the liquidator a cut of the payout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::math::{self, MathError};
use crate::position::{Pnl, Position};
use crate::types::{Bps, Price, Side, BPS_POWER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationParams {
    pub max_leverage: Bps,
    pub reward: Bps,
}

/// Health snapshot of one position at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationState {
    pub pnl: Pnl,
    // collateral + pnl, in tokens
    pub equity: i128,
    pub margin_ratio_bps: Decimal,
    pub maintenance_ratio_bps: Decimal,
    pub liquidation_price: Option<Price>,
    pub liquidatable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSplit {
    pub liquidator: u64,
    pub owner: u64,
}

// equity * max_leverage < size * BPS_POWER, in integers
pub fn is_liquidatable(equity: i128, size: u64, max_leverage: Bps) -> bool {
    if size == 0 {
        return false;
    }
    let threshold = size as i128 * BPS_POWER as i128;
    match equity.checked_mul(max_leverage.value() as i128) {
        Some(scaled) => scaled < threshold,
        // only reachable with an unvalidated leverage cap
        None => equity < 0,
    }
}

pub fn evaluate(
    position: &Position,
    price: Price,
    decimals: u8,
    params: &LiquidationParams,
) -> Result<LiquidationState, MathError> {
    let pnl = position.pnl(price, decimals)?;
    let equity = position.collateral as i128 + pnl.profit as i128 - pnl.loss as i128;

    let bps = Decimal::from(BPS_POWER);
    let margin_ratio_bps = if position.size == 0 {
        Decimal::MAX
    } else {
        Decimal::from_i128_with_scale(equity, 0)
            .checked_mul(bps)
            .and_then(|v| v.checked_div(Decimal::from(position.size)))
            .ok_or(MathError::Overflow("margin ratio"))?
    };
    let maintenance_ratio_bps = bps
        .checked_mul(bps)
        .and_then(|v| v.checked_div(Decimal::from(params.max_leverage.value())))
        .ok_or(MathError::DivisionByZero("maintenance ratio"))?;

    Ok(LiquidationState {
        pnl,
        equity,
        margin_ratio_bps: math::truncate(margin_ratio_bps, 2),
        maintenance_ratio_bps: math::truncate(maintenance_ratio_bps, 2),
        liquidation_price: liquidation_price(position, params.max_leverage)?,
        liquidatable: is_liquidatable(equity, position.size, params.max_leverage),
    })
}

/// Price at which equity equals size / max_leverage.
///
/// long:  p = size * entry / (collateral + size - size / L)
/// short: p = size * entry / (size + size / L - collateral)
pub fn liquidation_price(position: &Position, max_leverage: Bps) -> Result<Option<Price>, MathError> {
    if position.size == 0 || max_leverage.is_zero() {
        return Ok(None);
    }
    let size = Decimal::from(position.size);
    let collateral = Decimal::from(position.collateral);
    let maintenance = size * Decimal::from(BPS_POWER) / Decimal::from(max_leverage.value());

    let denominator = match position.side() {
        Side::Long => collateral + size - maintenance,
        Side::Short => size + maintenance - collateral,
    };
    if denominator <= Decimal::ZERO {
        return Ok(None);
    }
    let price = size
        .checked_mul(position.entry_price.value())
        .and_then(|v| v.checked_div(denominator))
        .ok_or(MathError::Overflow("liquidation price"))?;
    Ok(Price::new(price))
}

pub fn split_reward(payout: u64, reward: Bps) -> Result<RewardSplit, MathError> {
    let liquidator = math::mul_div_floor(payout, reward.value(), BPS_POWER)?;
    Ok(RewardSplit {
        liquidator,
        owner: payout - liquidator,
    })
}
