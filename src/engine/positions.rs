//! Opening and closing leveraged positions.

use super::core::Engine;
use super::results::{ClosePositionResult, EngineError};
use crate::events::{EventPayload, PositionClosedEvent, PositionOpenedEvent};
use crate::ledger::{Holder, TokenOp};
use crate::position::{check_leverage, check_price, Position};
use crate::types::{AccountId, CustodyId, PoolId, PositionKey, Price, Side};

impl Engine {
    /// Open a position, or add to the one already held under the same key.
    ///
    /// `price` is the caller's expected price and becomes the entry price. It
    /// must sit within the custody's `max_price_error` of the oracle. The
    /// custody locks `size` tokens of its free liquidity to cover profit.
    #[allow(clippy::too_many_arguments)]
    pub fn open_position(
        &mut self,
        owner: AccountId,
        pool_id: PoolId,
        custody_id: CustodyId,
        side: Side,
        price: Price,
        collateral: u64,
        size: u64,
    ) -> Result<Position, EngineError> {
        self.require_init()?;
        let custody = self.pool_custody(pool_id, custody_id)?;
        let oracle_price = self.read_price(custody)?;
        check_price(price, &oracle_price, custody.oracle.max_price_error)?;

        let key = PositionKey::new(owner, pool_id, custody_id, side);
        let position = match self.positions.get(&key) {
            Some(existing) => existing.increase(price, size, collateral, size, self.current_time)?,
            None => Position::new(key, price, size, collateral, size, self.current_time),
        };
        let leverage_bps = check_leverage(position.size, position.collateral, &custody.pricing)?;

        let assets = custody.assets.add_collateral(collateral)?.lock(size)?;
        let mint = custody.mint;

        self.ledger.execute(&[TokenOp::Transfer {
            mint,
            from: Holder::User(owner),
            to: Holder::Custody(custody_id),
            amount: collateral,
        }])?;

        if let Some(custody) = self.custodies.get_mut(&custody_id) {
            custody.assets = assets;
        }
        self.positions.insert(key, position.clone());

        tracing::info!(
            position = %key,
            price = %price,
            size,
            collateral,
            leverage_bps,
            total_size = position.size,
            "position opened"
        );
        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            key,
            price,
            size,
            collateral,
            locked: size,
            total_size: position.size,
        }));
        Ok(position)
    }

    /// Close `size` of a position at `price`. only the owner may close.
    pub fn close_position(
        &mut self,
        caller: AccountId,
        key: PositionKey,
        price: Price,
        size: u64,
    ) -> Result<ClosePositionResult, EngineError> {
        self.require_init()?;
        let position = self.positions.get(&key).ok_or(EngineError::PositionNotFound(key))?;
        if caller != key.owner {
            tracing::warn!(caller = %caller, position = %key, "close rejected");
            return Err(EngineError::Unauthorized(caller));
        }
        let custody = self.pool_custody(key.pool, key.custody)?;
        let oracle_price = self.read_price(custody)?;
        check_price(price, &oracle_price, custody.oracle.max_price_error)?;

        let settlement = position.close(size, price, custody.decimals, self.current_time)?;
        let assets = custody
            .assets
            .settle(settlement.collateral_released, settlement.unlocked, settlement.payout)?;
        let mint = custody.mint;

        self.ledger.execute(&[TokenOp::Transfer {
            mint,
            from: Holder::Custody(key.custody),
            to: Holder::User(key.owner),
            amount: settlement.payout,
        }])?;

        if let Some(custody) = self.custodies.get_mut(&key.custody) {
            custody.assets = assets;
        }
        let remaining_size = match settlement.remaining {
            Some(remaining) => {
                let remaining_size = remaining.size;
                self.positions.insert(key, remaining);
                remaining_size
            }
            None => {
                self.positions.remove(&key);
                0
            }
        };

        tracing::info!(
            position = %key,
            price = %price,
            size_closed = settlement.size_closed,
            payout = settlement.payout,
            pnl_usd = %settlement.pnl.usd,
            remaining_size,
            "position closed"
        );
        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            key,
            price,
            size_closed: settlement.size_closed,
            payout: settlement.payout,
            pnl_usd: settlement.pnl.usd,
            remaining_size,
        }));
        Ok(ClosePositionResult {
            payout: settlement.payout,
            pnl_usd: settlement.pnl.usd,
            size_closed: settlement.size_closed,
            remaining_size,
        })
    }
}
