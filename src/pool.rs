// 6.0 pool.rs: pool record and pool valuation (AUM, LP unit value).
// valuation is a snapshot: the engine reads every custody's oracle first and
// hands the lot to `PoolValuation::compute`. nothing here is cached.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::custody::Custody;
use crate::math::{self, MathError};
use crate::oracle::OraclePrice;
use crate::types::{CustodyId, MintId, PoolId, Timestamp, LP_DECIMALS, USD_DECIMALS};

pub const MAX_POOL_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    // insertion order, never reordered
    pub custodies: Vec<CustodyId>,
    pub lp_mint: MintId,
    // last valuation seen by a liquidity operation. informational only
    pub aum_usd: Decimal,
    pub inception_time: Timestamp,
}

impl Pool {
    pub fn new(id: PoolId, name: String, lp_mint: MintId, inception_time: Timestamp) -> Self {
        Self {
            id,
            name,
            custodies: Vec::new(),
            lp_mint,
            aum_usd: Decimal::ZERO,
            inception_time,
        }
    }

    pub fn is_valid_name(name: &str) -> bool {
        !name.trim().is_empty() && name.len() <= MAX_POOL_NAME_LEN
    }

    pub fn token_index(&self, custody: CustodyId) -> Option<usize> {
        self.custodies.iter().position(|id| *id == custody)
    }

    pub fn contains(&self, custody: CustodyId) -> bool {
        self.token_index(custody).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyValuation {
    pub custody: CustodyId,
    pub price: OraclePrice,
    pub owned: u64,
    pub value_usd: Decimal,
}

/// AUM and LP supply read at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolValuation {
    pub aum_usd: Decimal,
    pub lp_supply: u64,
    pub custodies: Vec<CustodyValuation>,
}

impl PoolValuation {
    // AUM = sum(owned * price). every term truncates at USD_DECIMALS.
    pub fn compute<'a, I>(entries: I, lp_supply: u64) -> Result<Self, MathError>
    where
        I: IntoIterator<Item = (&'a Custody, OraclePrice)>,
    {
        let mut aum_usd = Decimal::ZERO;
        let mut custodies = Vec::new();
        for (custody, price) in entries {
            let value_usd = price.get_asset_amount_usd(custody.assets.owned, custody.decimals)?;
            aum_usd = aum_usd
                .checked_add(value_usd)
                .ok_or(MathError::Overflow("aum"))?;
            custodies.push(CustodyValuation {
                custody: custody.id,
                price,
                owned: custody.assets.owned,
                value_usd,
            });
        }
        Ok(Self {
            aum_usd,
            lp_supply,
            custodies,
        })
    }

    pub fn price_of(&self, custody: CustodyId) -> Option<OraclePrice> {
        self.custodies
            .iter()
            .find(|entry| entry.custody == custody)
            .map(|entry| entry.price)
    }

    fn is_bootstrap(&self) -> bool {
        self.lp_supply == 0 || self.aum_usd.is_zero()
    }

    /// USD per whole LP token. 1 for an empty pool.
    pub fn lp_unit_value(&self) -> Result<Decimal, MathError> {
        if self.is_bootstrap() {
            return Ok(Decimal::ONE);
        }
        let supply = math::native_to_decimal(self.lp_supply, LP_DECIMALS)?;
        let value = self
            .aum_usd
            .checked_div(supply)
            .ok_or(MathError::DivisionByZero("lp_unit_value"))?;
        Ok(math::truncate(value, USD_DECIMALS))
    }

    // lp = usd * supply / aum, or 1:1 with usd on the first deposit
    pub fn lp_for_usd(&self, usd: Decimal) -> Result<u64, MathError> {
        if self.is_bootstrap() {
            return math::decimal_to_native(usd, LP_DECIMALS);
        }
        let supply = Decimal::from(self.lp_supply);
        let lp = usd
            .checked_mul(supply)
            .and_then(|v| v.checked_div(self.aum_usd))
            .ok_or(MathError::Overflow("lp_for_usd"))?;
        math::decimal_to_native(lp, 0)
    }

    // usd = aum * lp / supply
    pub fn usd_for_lp(&self, lp_amount: u64) -> Result<Decimal, MathError> {
        if self.lp_supply == 0 {
            return Err(MathError::DivisionByZero("usd_for_lp"));
        }
        let supply = Decimal::from(self.lp_supply);
        let lp = Decimal::from(lp_amount);
        let usd = self
            .aum_usd
            .checked_mul(lp)
            .and_then(|v| v.checked_div(supply))
            .or_else(|| self.aum_usd.checked_div(supply).and_then(|v| v.checked_mul(lp)))
            .ok_or(MathError::Overflow("usd_for_lp"))?;
        Ok(math::truncate(usd, USD_DECIMALS))
    }
}
