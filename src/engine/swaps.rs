// 13.4 engine/swaps.rs: oracle priced swap between two custodies of a pool.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, SwapEvent};
use crate::ledger::{Holder, TokenOp};
use crate::swap::{self, SwapQuote};
use crate::types::{AccountId, CustodyId, PoolId};

impl Engine {
    pub fn quote_swap(
        &self,
        pool_id: PoolId,
        custody_in: CustodyId,
        custody_out: CustodyId,
        amount_in: u64,
    ) -> Result<SwapQuote, EngineError> {
        self.require_init()?;
        if amount_in == 0 {
            return Err(EngineError::InvalidAmount("amount_in must be positive"));
        }
        if custody_in == custody_out {
            return Err(EngineError::SameCustody(custody_in));
        }
        let receiving = self.pool_custody(pool_id, custody_in)?;
        let dispensing = self.pool_custody(pool_id, custody_out)?;
        let price_in = self.read_price(receiving)?;
        let price_out = self.read_price(dispensing)?;
        let quote = swap::quote_swap(amount_in, receiving, &price_in, dispensing, &price_out)?;
        Ok(quote)
    }

    pub fn swap(
        &mut self,
        owner: AccountId,
        pool_id: PoolId,
        custody_in: CustodyId,
        custody_out: CustodyId,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<SwapQuote, EngineError> {
        let quote = self.quote_swap(pool_id, custody_in, custody_out, amount_in)?;
        if quote.amount_out == 0 {
            return Err(EngineError::InvalidAmount("swap too small to pay out"));
        }
        if quote.amount_out < min_amount_out {
            tracing::warn!(
                owner = %owner,
                minimum = min_amount_out,
                actual = quote.amount_out,
                "swap slippage exceeded"
            );
            return Err(EngineError::SlippageExceeded {
                minimum: min_amount_out,
                actual: quote.amount_out,
            });
        }

        let receiving = self.custody(custody_in)?;
        let dispensing = self.custody(custody_out)?;
        let receiving_assets = receiving.assets.deposit(amount_in)?;
        let dispensing_assets = dispensing.assets.withdraw(quote.amount_out)?;
        let (mint_in, mint_out) = (receiving.mint, dispensing.mint);

        self.ledger.execute(&[
            TokenOp::Transfer {
                mint: mint_in,
                from: Holder::User(owner),
                to: Holder::Custody(custody_in),
                amount: amount_in,
            },
            TokenOp::Transfer {
                mint: mint_out,
                from: Holder::Custody(custody_out),
                to: Holder::User(owner),
                amount: quote.amount_out,
            },
        ])?;

        if let Some(custody) = self.custodies.get_mut(&custody_in) {
            custody.assets = receiving_assets;
        }
        if let Some(custody) = self.custodies.get_mut(&custody_out) {
            custody.assets = dispensing_assets;
        }

        tracing::info!(
            owner = %owner,
            pool = %pool_id,
            custody_in = %custody_in,
            custody_out = %custody_out,
            amount_in,
            amount_out = quote.amount_out,
            fee = quote.fee,
            "swap"
        );
        self.emit_event(EventPayload::Swap(SwapEvent {
            owner,
            pool: pool_id,
            custody_in,
            custody_out,
            amount_in,
            amount_out: quote.amount_out,
            fee: quote.fee,
        }));
        Ok(quote)
    }
}
