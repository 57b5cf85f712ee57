// 13.5 engine/liquidity.rs: LP deposits and withdrawals.
// both operations value the whole pool first, before touching any balance.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, LiquidityAddedEvent, LiquidityRemovedEvent};
use crate::ledger::{Holder, TokenOp};
use crate::liquidity::{self, AddLiquidityQuote, RemoveLiquidityQuote};
use crate::pool::PoolValuation;
use crate::types::{AccountId, CustodyId, PoolId};

impl Engine {
    pub fn quote_add_liquidity(
        &self,
        pool_id: PoolId,
        custody_id: CustodyId,
        amount: u64,
    ) -> Result<AddLiquidityQuote, EngineError> {
        self.plan_add_liquidity(pool_id, custody_id, amount).map(|(quote, _)| quote)
    }

    fn plan_add_liquidity(
        &self,
        pool_id: PoolId,
        custody_id: CustodyId,
        amount: u64,
    ) -> Result<(AddLiquidityQuote, PoolValuation), EngineError> {
        self.require_init()?;
        if amount == 0 {
            return Err(EngineError::InvalidAmount("deposit must be positive"));
        }
        let custody = self.pool_custody(pool_id, custody_id)?;
        let valuation = self.pool_valuation(pool_id)?;
        let price = valuation
            .price_of(custody_id)
            .ok_or(EngineError::CustodyNotFound(custody_id))?;
        let quote = liquidity::quote_add_liquidity(amount, custody, &price, &valuation)?;
        Ok((quote, valuation))
    }

    pub fn add_liquidity(
        &mut self,
        owner: AccountId,
        pool_id: PoolId,
        custody_id: CustodyId,
        amount: u64,
    ) -> Result<AddLiquidityQuote, EngineError> {
        let (quote, valuation) = self.plan_add_liquidity(pool_id, custody_id, amount)?;
        if quote.lp_minted == 0 {
            return Err(EngineError::InvalidAmount("deposit too small to mint LP"));
        }
        let aum_usd = valuation.aum_usd;

        let custody = self.custody(custody_id)?;
        let assets = custody.assets.deposit(amount)?;
        let mint = custody.mint;
        let lp_mint = self.pool(pool_id)?.lp_mint;

        self.ledger.execute(&[
            TokenOp::Transfer {
                mint,
                from: Holder::User(owner),
                to: Holder::Custody(custody_id),
                amount,
            },
            TokenOp::MintTo {
                mint: lp_mint,
                to: Holder::User(owner),
                amount: quote.lp_minted,
            },
        ])?;

        if let Some(custody) = self.custodies.get_mut(&custody_id) {
            custody.assets = assets;
        }
        if let Some(pool) = self.pools.get_mut(&pool_id) {
            pool.aum_usd = aum_usd;
        }

        tracing::info!(
            owner = %owner,
            pool = %pool_id,
            custody = %custody_id,
            amount,
            lp_minted = quote.lp_minted,
            aum_usd = %aum_usd,
            "liquidity added"
        );
        self.emit_event(EventPayload::LiquidityAdded(LiquidityAddedEvent {
            owner,
            pool: pool_id,
            custody: custody_id,
            amount,
            fee: quote.fee,
            lp_minted: quote.lp_minted,
            aum_usd,
        }));
        Ok(quote)
    }

    pub fn quote_remove_liquidity(
        &self,
        pool_id: PoolId,
        custody_id: CustodyId,
        lp_amount: u64,
    ) -> Result<RemoveLiquidityQuote, EngineError> {
        self.plan_remove_liquidity(pool_id, custody_id, lp_amount).map(|(quote, _)| quote)
    }

    fn plan_remove_liquidity(
        &self,
        pool_id: PoolId,
        custody_id: CustodyId,
        lp_amount: u64,
    ) -> Result<(RemoveLiquidityQuote, PoolValuation), EngineError> {
        self.require_init()?;
        if lp_amount == 0 {
            return Err(EngineError::InvalidAmount("lp amount must be positive"));
        }
        let custody = self.pool_custody(pool_id, custody_id)?;
        let valuation = self.pool_valuation(pool_id)?;
        if lp_amount > valuation.lp_supply {
            return Err(EngineError::InvalidAmount("lp amount exceeds supply"));
        }
        let price = valuation
            .price_of(custody_id)
            .ok_or(EngineError::CustodyNotFound(custody_id))?;
        let quote = liquidity::quote_remove_liquidity(lp_amount, custody, &price, &valuation)?;
        Ok((quote, valuation))
    }

    pub fn remove_liquidity(
        &mut self,
        owner: AccountId,
        pool_id: PoolId,
        custody_id: CustodyId,
        lp_amount: u64,
    ) -> Result<RemoveLiquidityQuote, EngineError> {
        let (quote, valuation) = self.plan_remove_liquidity(pool_id, custody_id, lp_amount)?;
        let aum_usd = valuation.aum_usd;

        let custody = self.custody(custody_id)?;
        let assets = custody.assets.withdraw(quote.amount_out)?;
        let mint = custody.mint;
        let lp_mint = self.pool(pool_id)?.lp_mint;

        // burn first so a caller without the LP fails before any payout
        self.ledger.execute(&[
            TokenOp::Burn {
                mint: lp_mint,
                from: Holder::User(owner),
                amount: lp_amount,
            },
            TokenOp::Transfer {
                mint,
                from: Holder::Custody(custody_id),
                to: Holder::User(owner),
                amount: quote.amount_out,
            },
        ])?;

        if let Some(custody) = self.custodies.get_mut(&custody_id) {
            custody.assets = assets;
        }
        if let Some(pool) = self.pools.get_mut(&pool_id) {
            pool.aum_usd = aum_usd;
        }

        tracing::info!(
            owner = %owner,
            pool = %pool_id,
            custody = %custody_id,
            lp_burned = lp_amount,
            amount_out = quote.amount_out,
            aum_usd = %aum_usd,
            "liquidity removed"
        );
        self.emit_event(EventPayload::LiquidityRemoved(LiquidityRemovedEvent {
            owner,
            pool: pool_id,
            custody: custody_id,
            lp_burned: lp_amount,
            amount_out: quote.amount_out,
            fee: quote.fee,
            aum_usd,
        }));
        Ok(quote)
    }
}
