// 3.0 custody.rs: per asset ledger inside a pool. owned, locked, collateral.
// the vault token account of a custody always holds owned + collateral.
// every mutation returns a new Assets value so the engine can build the full
// post-state before writing anything.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{self, MathError};
use crate::oracle::OracleParams;
use crate::types::{Bps, CustodyId, MintId, PoolId, BPS_POWER};

// decimals beyond this don't fit Decimal's 28 digit mantissa next to a u64 amount
pub const MAX_TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u64, available: u64 },

    #[error("Collateral underflow: releasing {requested}, held {held}")]
    CollateralUnderflow { requested: u64, held: u64 },

    #[error("Invalid token config: {0}")]
    InvalidTokenConfig(&'static str),

    #[error("Custody math: {0}")]
    Math(#[from] MathError),
}

// highest max_leverage a custody may be configured with
pub const MAX_LEVERAGE_MULTIPLE: u64 = 1_000;

// 3.1: leverage bounds, both in bps (10x = 100_000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingParams {
    pub min_initial_leverage: Bps,
    pub max_leverage: Bps,
}

impl PricingParams {
    pub fn new(min_multiple: u64, max_multiple: u64) -> Self {
        Self {
            min_initial_leverage: Bps::from_multiple(min_multiple),
            max_leverage: Bps::from_multiple(max_multiple),
        }
    }

    pub fn validate(&self) -> bool {
        self.min_initial_leverage.value() >= BPS_POWER
            && self.min_initial_leverage <= self.max_leverage
            && self.max_leverage <= Bps::from_multiple(MAX_LEVERAGE_MULTIPLE)
    }
}

impl Default for PricingParams {
    fn default() -> Self {
        Self::new(1, 100)
    }
}

// 3.2: fee schedule. zero everywhere unless configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fees {
    // charged on the dispensed side of a swap
    pub swap: Bps,
    pub add_liquidity: Bps,
    pub remove_liquidity: Bps,
    // liquidator's cut of a liquidated payout
    pub liquidation_reward: Bps,
}

impl Fees {
    pub fn validate(&self) -> bool {
        [self.swap, self.add_liquidity, self.remove_liquidity, self.liquidation_reward]
            .iter()
            .all(|fee| fee.value() <= BPS_POWER)
    }
}

// 3.3: the three balances. locked <= owned always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Assets {
    // collateral posted by open positions
    pub collateral: u64,
    // tokens the pool owns (liquidity + swaps + realized trader losses)
    pub owned: u64,
    // part of owned reserved for position payouts
    pub locked: u64,
}

impl Assets {
    pub fn available(&self) -> u64 {
        self.owned.saturating_sub(self.locked)
    }

    pub fn vault_balance(&self) -> u64 {
        self.owned.saturating_add(self.collateral)
    }

    pub fn is_consistent(&self) -> bool {
        self.locked <= self.owned
    }

    pub fn deposit(&self, amount: u64) -> Result<Self, CustodyError> {
        Ok(Self {
            owned: math::checked_add(self.owned, amount)?,
            ..*self
        })
    }

    // outgoing transfer, only from unlocked funds
    pub fn withdraw(&self, amount: u64) -> Result<Self, CustodyError> {
        let available = self.available();
        if amount > available {
            return Err(CustodyError::InsufficientLiquidity {
                requested: amount,
                available,
            });
        }
        Ok(Self {
            owned: self.owned - amount,
            ..*self
        })
    }

    pub fn lock(&self, amount: u64) -> Result<Self, CustodyError> {
        let available = self.available();
        if amount > available {
            return Err(CustodyError::InsufficientLiquidity {
                requested: amount,
                available,
            });
        }
        Ok(Self {
            locked: self.locked + amount,
            ..*self
        })
    }

    // over-unlocking clamps at zero
    pub fn unlock(&self, amount: u64) -> Self {
        Self {
            locked: self.locked.saturating_sub(amount),
            ..*self
        }
    }

    pub fn add_collateral(&self, amount: u64) -> Result<Self, CustodyError> {
        Ok(Self {
            collateral: math::checked_add(self.collateral, amount)?,
            ..*self
        })
    }

    // position collateral returns to the pool's own balance
    pub fn release_collateral(&self, amount: u64) -> Result<Self, CustodyError> {
        if amount > self.collateral {
            return Err(CustodyError::CollateralUnderflow {
                requested: amount,
                held: self.collateral,
            });
        }
        Ok(Self {
            collateral: self.collateral - amount,
            owned: math::checked_add(self.owned, amount)?,
            ..*self
        })
    }

    // settle a position: release its collateral and lock, then pay out of owned.
    // payout never exceeds collateral + lock, so locked <= owned survives.
    pub fn settle(&self, collateral: u64, locked: u64, payout: u64) -> Result<Self, CustodyError> {
        let released = self.release_collateral(collateral)?.unlock(locked);
        if payout > released.owned {
            return Err(CustodyError::InsufficientLiquidity {
                requested: payout,
                available: released.owned,
            });
        }
        let settled = Self {
            owned: released.owned - payout,
            ..released
        };
        if !settled.is_consistent() {
            return Err(CustodyError::InsufficientLiquidity {
                requested: payout,
                available: released.available(),
            });
        }
        Ok(settled)
    }
}

/** 3.4: one token inside one pool */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Custody {
    pub id: CustodyId,
    pub pool: PoolId,
    pub mint: MintId,
    pub decimals: u8,
    pub oracle: OracleParams,
    pub pricing: PricingParams,
    pub fees: Fees,
    pub assets: Assets,
}

impl Custody {
    pub fn new(
        id: CustodyId,
        pool: PoolId,
        mint: MintId,
        decimals: u8,
        oracle: OracleParams,
        pricing: PricingParams,
        fees: Fees,
    ) -> Self {
        Self {
            id,
            pool,
            mint,
            decimals,
            oracle,
            pricing,
            fees,
            assets: Assets::default(),
        }
    }

    pub fn validate(&self) -> Result<(), CustodyError> {
        if self.decimals > MAX_TOKEN_DECIMALS {
            return Err(CustodyError::InvalidTokenConfig("too many decimals"));
        }
        if !self.oracle.validate() {
            return Err(CustodyError::InvalidTokenConfig("oracle params"));
        }
        if !self.pricing.validate() {
            return Err(CustodyError::InvalidTokenConfig("pricing params"));
        }
        if !self.fees.validate() {
            return Err(CustodyError::InvalidTokenConfig("fees"));
        }
        Ok(())
    }

    pub fn with_assets(&self, assets: Assets) -> Self {
        Self {
            assets,
            ..self.clone()
        }
    }
}
