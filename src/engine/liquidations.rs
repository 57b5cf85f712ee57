//! Liquidation detection and execution.

use super::core::Engine;
use super::results::{EngineError, LiquidationResult};
use crate::events::{EventPayload, PositionLiquidatedEvent};
use crate::ledger::{Holder, TokenOp};
use crate::liquidation::{self, split_reward, LiquidationParams};
use crate::types::{AccountId, PoolId, PositionKey};

impl Engine {
    /// Positions in a pool that `liquidate` would currently accept.
    /// a custody whose oracle can't be read is skipped.
    pub fn liquidatable_positions(&self, pool_id: PoolId) -> Result<Vec<PositionKey>, EngineError> {
        self.require_init()?;
        self.pool(pool_id)?;
        let mut keys: Vec<PositionKey> = self
            .positions
            .keys()
            .filter(|key| key.pool == pool_id)
            .filter(|key| {
                self.liquidation_state(key)
                    .map(|state| state.liquidatable)
                    .unwrap_or(false)
            })
            .copied()
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Force-close an unhealthy position at the oracle price. any caller may
    /// liquidate; the caller receives `liquidation_reward` bps of the payout.
    pub fn liquidate(&mut self, caller: AccountId, key: PositionKey) -> Result<LiquidationResult, EngineError> {
        self.require_init()?;
        let position = self.positions.get(&key).ok_or(EngineError::PositionNotFound(key))?;
        let custody = self.pool_custody(key.pool, key.custody)?;
        let oracle_price = self.read_price(custody)?;
        let params = LiquidationParams {
            max_leverage: custody.pricing.max_leverage,
            reward: custody.fees.liquidation_reward,
        };

        let state = liquidation::evaluate(position, oracle_price.price, custody.decimals, &params)?;
        if !state.liquidatable {
            return Err(EngineError::PositionHealthy {
                margin_ratio_bps: state.margin_ratio_bps,
                maintenance_ratio_bps: state.maintenance_ratio_bps,
            });
        }

        let settlement = position.close(position.size, oracle_price.price, custody.decimals, self.current_time)?;
        let split = split_reward(settlement.payout, params.reward)?;
        let assets = custody
            .assets
            .settle(settlement.collateral_released, settlement.unlocked, settlement.payout)?;
        let mint = custody.mint;
        let size = position.size;

        self.ledger.execute(&[
            TokenOp::Transfer {
                mint,
                from: Holder::Custody(key.custody),
                to: Holder::User(key.owner),
                amount: split.owner,
            },
            TokenOp::Transfer {
                mint,
                from: Holder::Custody(key.custody),
                to: Holder::User(caller),
                amount: split.liquidator,
            },
        ])?;

        if let Some(custody) = self.custodies.get_mut(&key.custody) {
            custody.assets = assets;
        }
        self.positions.remove(&key);

        tracing::warn!(
            position = %key,
            liquidator = %caller,
            price = %oracle_price.price,
            margin_ratio_bps = %state.margin_ratio_bps,
            owner_payout = split.owner,
            reward = split.liquidator,
            "position liquidated"
        );
        self.emit_event(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            key,
            liquidator: caller,
            price: oracle_price.price,
            size,
            owner_payout: split.owner,
            reward: split.liquidator,
            pnl_usd: settlement.pnl.usd,
        }));
        Ok(LiquidationResult {
            key,
            liquidator: caller,
            price: oracle_price.price,
            pnl_usd: settlement.pnl.usd,
            payout: settlement.payout,
            owner_payout: split.owner,
            reward: split.liquidator,
        })
    }
}
