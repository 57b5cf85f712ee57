// 13.0.2: result types and errors for engine operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::custody::CustodyError;
use crate::ledger::LedgerError;
use crate::math::MathError;
use crate::oracle::OracleError;
use crate::position::PositionError;
use crate::types::{AccountId, CustodyId, OracleId, PoolId, PositionKey, Price};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePositionResult {
    pub payout: u64,
    pub pnl_usd: Decimal,
    pub size_closed: u64,
    pub remaining_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub key: PositionKey,
    pub liquidator: AccountId,
    pub price: Price,
    pub pnl_usd: Decimal,
    // total settlement, split below
    pub payout: u64,
    pub owner_payout: u64,
    pub reward: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Engine already initialized")]
    AlreadyInitialized,

    #[error("Unauthorized caller {0}")]
    Unauthorized(AccountId),

    #[error("Pool {0} not found")]
    PoolNotFound(PoolId),

    #[error("Custody {0} not found")]
    CustodyNotFound(CustodyId),

    #[error("Custody {custody} does not belong to {pool}")]
    CustodyNotInPool { pool: PoolId, custody: CustodyId },

    #[error("Oracle account {0:?} not found")]
    OracleNotFound(OracleId),

    #[error("Position {0} not found")]
    PositionNotFound(PositionKey),

    #[error("Invalid pool name {0:?}")]
    InvalidPoolName(String),

    #[error("Pool name {0:?} already taken")]
    DuplicatePoolName(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("Swap needs two different custodies, got {0} twice")]
    SameCustody(CustodyId),

    #[error("Slippage exceeded: minimum {minimum}, got {actual}")]
    SlippageExceeded { minimum: u64, actual: u64 },

    #[error("Position is healthy: margin ratio {margin_ratio_bps} bps, maintenance {maintenance_ratio_bps} bps")]
    PositionHealthy {
        margin_ratio_bps: Decimal,
        maintenance_ratio_bps: Decimal,
    },

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

/// Flat error codes for callers that only need the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    StaleOracle,
    OracleConfidenceExceeded,
    OracleTypeMismatch,
    InvalidOracle,
    SlippageExceeded,
    InsufficientLiquidity,
    InsufficientFunds,
    LeverageOutOfRange,
    PriceMismatch,
    PositionHealthy,
    Unauthorized,
    NotInitialized,
    AlreadyInitialized,
    InvalidTokenConfig,
    InvalidArgument,
    NotFound,
    MathOverflow,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NotInitialized => ErrorCode::NotInitialized,
            EngineError::AlreadyInitialized => ErrorCode::AlreadyInitialized,
            EngineError::Unauthorized(_) => ErrorCode::Unauthorized,
            EngineError::PoolNotFound(_)
            | EngineError::CustodyNotFound(_)
            | EngineError::OracleNotFound(_)
            | EngineError::PositionNotFound(_) => ErrorCode::NotFound,
            EngineError::CustodyNotInPool { .. }
            | EngineError::InvalidPoolName(_)
            | EngineError::DuplicatePoolName(_)
            | EngineError::InvalidAmount(_)
            | EngineError::SameCustody(_) => ErrorCode::InvalidArgument,
            EngineError::SlippageExceeded { .. } => ErrorCode::SlippageExceeded,
            EngineError::PositionHealthy { .. } => ErrorCode::PositionHealthy,
            EngineError::Oracle(e) => match e {
                OracleError::StaleOracle { .. } => ErrorCode::StaleOracle,
                OracleError::OracleConfidenceExceeded { .. } => ErrorCode::OracleConfidenceExceeded,
                OracleError::OracleTypeMismatch { .. } => ErrorCode::OracleTypeMismatch,
                OracleError::InvalidOraclePrice(_) | OracleError::InvalidOracleAccount(_) => ErrorCode::InvalidOracle,
                OracleError::Math(_) => ErrorCode::MathOverflow,
            },
            EngineError::Custody(e) => match e {
                CustodyError::InsufficientLiquidity { .. } | CustodyError::CollateralUnderflow { .. } => {
                    ErrorCode::InsufficientLiquidity
                }
                CustodyError::InvalidTokenConfig(_) => ErrorCode::InvalidTokenConfig,
                CustodyError::Math(_) => ErrorCode::MathOverflow,
            },
            EngineError::Position(e) => match e {
                PositionError::LeverageOutOfRange { .. } => ErrorCode::LeverageOutOfRange,
                PositionError::PriceMismatch { .. } => ErrorCode::PriceMismatch,
                PositionError::InvalidCloseSize { .. } => ErrorCode::InvalidArgument,
                PositionError::Math(_) => ErrorCode::MathOverflow,
            },
            EngineError::Ledger(e) => match e {
                LedgerError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
                LedgerError::MintNotFound(_) => ErrorCode::NotFound,
                LedgerError::SupplyOverflow(_) => ErrorCode::MathOverflow,
            },
            EngineError::Math(_) => ErrorCode::MathOverflow,
        }
    }
}
