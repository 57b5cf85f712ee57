// 13.8 engine/views.rs: read-only getters. same oracle checks as the mutating paths.

use super::core::Engine;
use super::results::EngineError;
use crate::liquidation::{self, LiquidationParams, LiquidationState};
use crate::pool::PoolValuation;
use crate::position::Pnl;
use crate::types::{PoolId, PositionKey};
use rust_decimal::Decimal;

impl Engine {
    // reads every custody of the pool. one failed oracle fails the whole valuation
    pub fn pool_valuation(&self, pool_id: PoolId) -> Result<PoolValuation, EngineError> {
        let pool = self.pool(pool_id)?;
        let mut entries = Vec::with_capacity(pool.custodies.len());
        for custody_id in &pool.custodies {
            let custody = self.custody(*custody_id)?;
            let price = self.read_price(custody)?;
            entries.push((custody, price));
        }
        let lp_supply = self.ledger.supply(pool.lp_mint)?;
        let valuation = PoolValuation::compute(entries, lp_supply)?;
        Ok(valuation)
    }

    pub fn assets_under_management(&self, pool_id: PoolId) -> Result<Decimal, EngineError> {
        self.require_init()?;
        Ok(self.pool_valuation(pool_id)?.aum_usd)
    }

    pub fn lp_token_price(&self, pool_id: PoolId) -> Result<Decimal, EngineError> {
        self.require_init()?;
        let price = self.pool_valuation(pool_id)?.lp_unit_value()?;
        Ok(price)
    }

    pub fn position_pnl(&self, key: &PositionKey) -> Result<Pnl, EngineError> {
        let position = self.positions.get(key).ok_or(EngineError::PositionNotFound(*key))?;
        let custody = self.custody(key.custody)?;
        let price = self.read_price(custody)?;
        let pnl = position.pnl(price.price, custody.decimals)?;
        Ok(pnl)
    }

    pub fn liquidation_state(&self, key: &PositionKey) -> Result<LiquidationState, EngineError> {
        let position = self.positions.get(key).ok_or(EngineError::PositionNotFound(*key))?;
        let custody = self.custody(key.custody)?;
        let price = self.read_price(custody)?;
        let params = LiquidationParams {
            max_leverage: custody.pricing.max_leverage,
            reward: custody.fees.liquidation_reward,
        };
        let state = liquidation::evaluate(position, price.price, custody.decimals, &params)?;
        Ok(state)
    }
}
