// 9.0: leveraged position against one custody. size and collateral are in the
// custody's token units. pnl = (exit - entry) * size * side.sign(), in usd,
// then converted to tokens at the exit price.
// 9.1 has the open checks, 9.2 increase, 9.3 close.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::custody::PricingParams;
use crate::math::{self, MathError};
use crate::oracle::OraclePrice;
use crate::types::{Bps, PositionKey, Price, Side, Timestamp, BPS_POWER, USD_DECIMALS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Leverage {leverage_bps} bps outside [{min_bps}, {max_bps}]")]
    LeverageOutOfRange { leverage_bps: u64, min_bps: u64, max_bps: u64 },

    #[error("Price {supplied} deviates {deviation_bps} bps from oracle {oracle}, max {max_bps}")]
    PriceMismatch {
        supplied: Price,
        oracle: Price,
        deviation_bps: Decimal,
        max_bps: u64,
    },

    #[error("Invalid close size {requested}, position size {size}")]
    InvalidCloseSize { requested: u64, size: u64 },

    #[error("Position math: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub key: PositionKey,
    pub entry_price: Price,
    pub size: u64,
    pub collateral: u64,
    // owned tokens the custody reserved for this position's profit
    pub locked_amount: u64,
    // usd, accumulated over partial closes
    pub realized_pnl: Decimal,
    pub open_time: Timestamp,
    pub update_time: Timestamp,
}

/// Unrealized result in token units. at most one side is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pnl {
    pub profit: u64,
    pub loss: u64,
    pub usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSettlement {
    pub size_closed: u64,
    pub collateral_released: u64,
    pub unlocked: u64,
    pub pnl: Pnl,
    // what goes back to the owner, in [0, collateral_released + unlocked]
    pub payout: u64,
    pub remaining: Option<Position>,
}

impl Position {
    pub fn new(
        key: PositionKey,
        entry_price: Price,
        size: u64,
        collateral: u64,
        locked_amount: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            key,
            entry_price,
            size,
            collateral,
            locked_amount,
            realized_pnl: Decimal::ZERO,
            open_time: timestamp,
            update_time: timestamp,
        }
    }

    pub fn side(&self) -> Side {
        self.key.side
    }

    pub fn leverage_bps(&self) -> u64 {
        leverage_bps(self.size, self.collateral)
    }

    pub fn pnl(&self, exit_price: Price, decimals: u8) -> Result<Pnl, MathError> {
        calculate_pnl(self.side(), self.entry_price, exit_price, self.size, decimals)
    }

    // collateral + pnl in tokens, may go negative
    pub fn equity(&self, exit_price: Price, decimals: u8) -> Result<i128, MathError> {
        let pnl = self.pnl(exit_price, decimals)?;
        Ok(self.collateral as i128 + pnl.profit as i128 - pnl.loss as i128)
    }

    // 9.2: adds to the position. entry becomes the size weighted average
    pub fn increase(
        &self,
        price: Price,
        size: u64,
        collateral: u64,
        lock: u64,
        timestamp: Timestamp,
    ) -> Result<Position, MathError> {
        let new_size = math::checked_add(self.size, size)?;
        let entry_price = if new_size == 0 {
            self.entry_price
        } else {
            let weighted = Decimal::from(self.size)
                .checked_mul(self.entry_price.value())
                .zip(Decimal::from(size).checked_mul(price.value()))
                .and_then(|(old, new)| old.checked_add(new))
                .ok_or(MathError::Overflow("average entry"))?;
            let average = weighted
                .checked_div(Decimal::from(new_size))
                .ok_or(MathError::DivisionByZero("average entry"))?;
            Price::new(average).ok_or(MathError::OutOfRange(average))?
        };

        Ok(Position {
            entry_price,
            size: new_size,
            collateral: math::checked_add(self.collateral, collateral)?,
            locked_amount: math::checked_add(self.locked_amount, lock)?,
            update_time: timestamp,
            ..self.clone()
        })
    }

    // 9.3: close `close_size` of the position at `exit_price`.
    // collateral and lock are released pro-rata, the last close releases the rest.
    pub fn close(
        &self,
        close_size: u64,
        exit_price: Price,
        decimals: u8,
        timestamp: Timestamp,
    ) -> Result<CloseSettlement, PositionError> {
        if close_size == 0 || close_size > self.size {
            return Err(PositionError::InvalidCloseSize {
                requested: close_size,
                size: self.size,
            });
        }

        let full = close_size == self.size;
        let (collateral_released, unlocked) = if full {
            (self.collateral, self.locked_amount)
        } else {
            (
                math::mul_div_floor(self.collateral, close_size, self.size)?,
                math::mul_div_floor(self.locked_amount, close_size, self.size)?,
            )
        };

        let pnl = calculate_pnl(self.side(), self.entry_price, exit_price, close_size, decimals)?;
        let payout = settle_payout(collateral_released, unlocked, &pnl);

        let remaining = if full {
            None
        } else {
            Some(Position {
                size: self.size - close_size,
                collateral: self.collateral - collateral_released,
                locked_amount: self.locked_amount - unlocked,
                realized_pnl: self.realized_pnl + pnl.usd,
                update_time: timestamp,
                ..self.clone()
            })
        };

        Ok(CloseSettlement {
            size_closed: close_size,
            collateral_released,
            unlocked,
            pnl,
            payout,
            remaining,
        })
    }
}

pub fn leverage_bps(size: u64, collateral: u64) -> u64 {
    if collateral == 0 {
        return u64::MAX;
    }
    let bps = size as u128 * BPS_POWER as u128 / collateral as u128;
    u64::try_from(bps).unwrap_or(u64::MAX)
}

// 9.1: inclusive bounds, compared exactly rather than on the floored ratio
pub fn check_leverage(size: u64, collateral: u64, pricing: &PricingParams) -> Result<u64, PositionError> {
    let scaled_size = size as u128 * BPS_POWER as u128;
    let min = pricing.min_initial_leverage.value();
    let max = pricing.max_leverage.value();
    let below = scaled_size < min as u128 * collateral as u128;
    let above = scaled_size > max as u128 * collateral as u128;
    if collateral == 0 || below || above {
        return Err(PositionError::LeverageOutOfRange {
            leverage_bps: leverage_bps(size, collateral),
            min_bps: min,
            max_bps: max,
        });
    }
    Ok(leverage_bps(size, collateral))
}

pub fn check_price(supplied: Price, oracle: &OraclePrice, max_price_error: Bps) -> Result<(), PositionError> {
    // overflowing the bps figure is past any configurable bound
    let deviation_bps = oracle.deviation_bps(supplied).unwrap_or(Decimal::MAX);
    if deviation_bps > Decimal::from(max_price_error.value()) {
        return Err(PositionError::PriceMismatch {
            supplied,
            oracle: oracle.price,
            deviation_bps,
            max_bps: max_price_error.value(),
        });
    }
    Ok(())
}

pub fn calculate_pnl(
    side: Side,
    entry_price: Price,
    exit_price: Price,
    size: u64,
    decimals: u8,
) -> Result<Pnl, MathError> {
    let size = math::native_to_decimal(size, decimals)?;
    let usd = (exit_price.value() - entry_price.value())
        .checked_mul(size)
        .map(|v| v * side.sign())
        .ok_or(MathError::Overflow("pnl"))?;
    let usd = math::truncate(usd, USD_DECIMALS);
    let tokens = math::usd_to_token(usd.abs(), decimals, exit_price)?;
    if usd.is_sign_negative() {
        Ok(Pnl { profit: 0, loss: tokens, usd })
    } else {
        Ok(Pnl { profit: tokens, loss: 0, usd })
    }
}

// profit is capped at the reserve, loss at the collateral
pub fn settle_payout(collateral: u64, unlocked: u64, pnl: &Pnl) -> u64 {
    if pnl.profit > 0 {
        collateral.saturating_add(pnl.profit.min(unlocked))
    } else {
        collateral.saturating_sub(pnl.loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, CustodyId, PoolId};
    use rust_decimal_macros::dec;

    fn key(side: Side) -> PositionKey {
        PositionKey::new(AccountId(1), PoolId(1), CustodyId(1), side)
    }

    fn price(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    fn long_10x() -> Position {
        // 1 token collateral, 10 tokens size, 9 decimals
        Position::new(
            key(Side::Long),
            price(dec!(1.23)),
            10_000_000_000,
            1_000_000_000,
            10_000_000_000,
            Timestamp::from_secs(0),
        )
    }

    #[test]
    fn pnl_signs() {
        let long = calculate_pnl(Side::Long, price(dec!(100)), price(dec!(110)), 1_000_000, 6).unwrap();
        assert_eq!(long.usd, dec!(10));
        // $10 at $110 -> 0.090909 tokens
        assert_eq!(long.profit, 90_909);
        assert_eq!(long.loss, 0);

        let short = calculate_pnl(Side::Short, price(dec!(100)), price(dec!(110)), 1_000_000, 6).unwrap();
        assert_eq!(short.usd, dec!(-10));
        assert_eq!(short.loss, 90_909);
    }

    #[test]
    fn leverage_bounds_are_inclusive() {
        let pricing = PricingParams::new(1, 100);
        assert_eq!(check_leverage(100, 1, &pricing).unwrap(), 1_000_000);
        assert_eq!(check_leverage(1, 1, &pricing).unwrap(), 10_000);

        assert!(matches!(
            check_leverage(101, 1, &pricing),
            Err(PositionError::LeverageOutOfRange { .. })
        ));
        assert!(check_leverage(1, 2, &pricing).is_err()); // 0.5x
        assert!(check_leverage(10, 0, &pricing).is_err());
        // 100.5x floors to 100x but is still rejected
        assert!(check_leverage(201, 2, &pricing).is_err());
    }

    #[test]
    fn price_check_uses_max_error() {
        let oracle = OraclePrice {
            price: price(dec!(100)),
            publish_time: Timestamp::from_secs(0),
        };
        assert!(check_price(price(dec!(101)), &oracle, Bps::new(100)).is_ok());
        assert!(matches!(
            check_price(price(dec!(101.01)), &oracle, Bps::new(100)),
            Err(PositionError::PriceMismatch { .. })
        ));
        // far enough off that the deviation itself overflows
        let absurd = price(Decimal::from_i128_with_scale(10i128.pow(27), 0));
        assert!(matches!(
            check_price(absurd, &oracle, Bps::new(100)),
            Err(PositionError::PriceMismatch { .. })
        ));
    }

    #[test]
    fn increase_averages_entry() {
        let position = Position::new(key(Side::Long), price(dec!(100)), 1_000, 100, 1_000, Timestamp::from_secs(0));
        let bigger = position.increase(price(dec!(110)), 1_000, 100, 1_000, Timestamp::from_secs(5)).unwrap();
        assert_eq!(bigger.entry_price.value(), dec!(105));
        assert_eq!(bigger.size, 2_000);
        assert_eq!(bigger.collateral, 200);
        assert_eq!(bigger.locked_amount, 2_000);
        assert_eq!(bigger.open_time, Timestamp::from_secs(0));
        assert_eq!(bigger.update_time, Timestamp::from_secs(5));
    }

    #[test]
    fn partial_close_at_entry_is_pro_rata() {
        let position = long_10x();
        let settlement = position.close(5_000_000_000, price(dec!(1.23)), 9, Timestamp::from_secs(10)).unwrap();

        assert_eq!(settlement.collateral_released, 500_000_000);
        assert_eq!(settlement.unlocked, 5_000_000_000);
        assert_eq!(settlement.payout, 500_000_000);

        let remaining = settlement.remaining.unwrap();
        assert_eq!(remaining.size, 5_000_000_000);
        assert_eq!(remaining.collateral, 500_000_000);
        assert_eq!(remaining.locked_amount, 5_000_000_000);
    }

    #[test]
    fn loss_beyond_collateral_pays_nothing() {
        let position = long_10x();
        // -20% on 10x wipes out twice the collateral
        let settlement = position.close(position.size, price(dec!(0.984)), 9, Timestamp::from_secs(10)).unwrap();
        assert_eq!(settlement.payout, 0);
        assert!(settlement.remaining.is_none());
    }

    #[test]
    fn profit_capped_by_lock() {
        let position = Position::new(key(Side::Long), price(dec!(1)), 1_000, 100, 50, Timestamp::from_secs(0));
        // doubling the price earns 500 tokens but only 50 are reserved
        let settlement = position.close(1_000, price(dec!(2)), 0, Timestamp::from_secs(1)).unwrap();
        assert_eq!(settlement.pnl.profit, 500);
        assert_eq!(settlement.payout, 150);
    }

    #[test]
    fn close_size_validated() {
        let position = long_10x();
        assert!(matches!(
            position.close(0, price(dec!(1.23)), 9, Timestamp::from_secs(0)),
            Err(PositionError::InvalidCloseSize { .. })
        ));
        assert!(position.close(position.size + 1, price(dec!(1.23)), 9, Timestamp::from_secs(0)).is_err());
    }
}
