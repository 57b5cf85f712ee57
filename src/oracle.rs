// Oracle Reader
//
// This module turns a raw price account into a validated price. The engine does
// not care whether a quote was written by an admin (test oracle) or published
// by an external feed: every variant implements `PriceSource` and goes through
// the same staleness and confidence checks in `OraclePrice::new_from_oracle`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::math::{self, MathError};
use crate::types::{Bps, OracleId, Price, Timestamp, BPS_POWER};

/// Marker at the head of an external price account.
pub const EXTERNAL_ACCOUNT_MAGIC: u32 = 0xa1b2_c3d4;
/// magic(4) + expo(4) + price(8) + conf(8) + publish_time(8)
pub const EXTERNAL_ACCOUNT_LEN: usize = 32;

/// Which kind of account a custody expects its price from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleType {
    Test,
    External,
}

impl fmt::Display for OracleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleType::Test => write!(f, "test"),
            OracleType::External => write!(f, "external"),
        }
    }
}

/// Per custody oracle configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleParams {
    pub oracle_account: OracleId,
    pub oracle_type: OracleType,
    /// Maximum confidence interval relative to price, in bps.
    pub max_price_error: Bps,
    /// Quotes older than this are rejected.
    pub max_price_age_sec: u32,
}

impl OracleParams {
    pub fn validate(&self) -> bool {
        self.max_price_error.value() <= BPS_POWER && self.max_price_age_sec > 0
    }
}

/// Raw quote as published: value = price * 10^expo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: i64,
    pub expo: i32,
    pub conf: u64,
    pub publish_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("Stale oracle price: age {age_sec}s exceeds {max_age_sec}s")]
    StaleOracle { age_sec: i64, max_age_sec: u32 },

    #[error("Oracle confidence {conf_bps} bps exceeds {max_bps} bps")]
    OracleConfidenceExceeded { conf_bps: u64, max_bps: u64 },

    #[error("Oracle type mismatch: custody expects {expected}, account is {found}")]
    OracleTypeMismatch { expected: OracleType, found: OracleType },

    #[error("Invalid oracle price {0}")]
    InvalidOraclePrice(i64),

    #[error("Invalid oracle account: {0}")]
    InvalidOracleAccount(&'static str),

    #[error("Oracle math: {0}")]
    Math(#[from] MathError),
}

/// Anything that can hand the reader a raw quote.
pub trait PriceSource {
    fn oracle_type(&self) -> OracleType;

    fn quote(&self) -> Result<PriceQuote, OracleError>;
}

/// Admin writable price account for deterministic tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestOracle {
    pub price: u64,
    pub expo: i32,
    pub conf: u64,
    pub publish_time: Timestamp,
}

impl TestOracle {
    pub fn set(&mut self, price: u64, expo: i32, conf: u64, publish_time: Timestamp) {
        self.price = price;
        self.expo = expo;
        self.conf = conf;
        self.publish_time = publish_time;
    }
}

impl PriceSource for TestOracle {
    fn oracle_type(&self) -> OracleType {
        OracleType::Test
    }

    fn quote(&self) -> Result<PriceQuote, OracleError> {
        let price = i64::try_from(self.price).map_err(|_| OracleError::InvalidOraclePrice(i64::MAX))?;
        Ok(PriceQuote {
            price,
            expo: self.expo,
            conf: self.conf,
            publish_time: self.publish_time,
        })
    }
}

/// Externally published price account, kept as raw bytes and parsed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPriceAccount {
    data: Vec<u8>,
}

impl ExternalPriceAccount {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Lay out a quote the way the external publisher does.
    pub fn encode(quote: &PriceQuote) -> Self {
        let mut data = Vec::with_capacity(EXTERNAL_ACCOUNT_LEN);
        data.extend_from_slice(&EXTERNAL_ACCOUNT_MAGIC.to_le_bytes());
        data.extend_from_slice(&quote.expo.to_le_bytes());
        data.extend_from_slice(&quote.price.to_le_bytes());
        data.extend_from_slice(&quote.conf.to_le_bytes());
        data.extend_from_slice(&quote.publish_time.as_secs().to_le_bytes());
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn field<const N: usize>(&self, offset: usize) -> Result<[u8; N], OracleError> {
        self.data
            .get(offset..offset + N)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(OracleError::InvalidOracleAccount("account data too short"))
    }
}

impl PriceSource for ExternalPriceAccount {
    fn oracle_type(&self) -> OracleType {
        OracleType::External
    }

    fn quote(&self) -> Result<PriceQuote, OracleError> {
        if self.data.len() < EXTERNAL_ACCOUNT_LEN {
            return Err(OracleError::InvalidOracleAccount("account data too short"));
        }
        if u32::from_le_bytes(self.field::<4>(0)?) != EXTERNAL_ACCOUNT_MAGIC {
            return Err(OracleError::InvalidOracleAccount("bad magic"));
        }
        Ok(PriceQuote {
            expo: i32::from_le_bytes(self.field::<4>(4)?),
            price: i64::from_le_bytes(self.field::<8>(8)?),
            conf: u64::from_le_bytes(self.field::<8>(16)?),
            publish_time: Timestamp::from_secs(i64::from_le_bytes(self.field::<8>(24)?)),
        })
    }
}

/// An oracle account as the engine stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleAccount {
    Test(TestOracle),
    External(ExternalPriceAccount),
}

impl OracleAccount {
    pub fn empty(oracle_type: OracleType) -> Self {
        match oracle_type {
            OracleType::Test => OracleAccount::Test(TestOracle::default()),
            OracleType::External => OracleAccount::External(ExternalPriceAccount::from_bytes(Vec::new())),
        }
    }
}

impl PriceSource for OracleAccount {
    fn oracle_type(&self) -> OracleType {
        match self {
            OracleAccount::Test(oracle) => oracle.oracle_type(),
            OracleAccount::External(account) => account.oracle_type(),
        }
    }

    fn quote(&self) -> Result<PriceQuote, OracleError> {
        match self {
            OracleAccount::Test(oracle) => oracle.quote(),
            OracleAccount::External(account) => account.quote(),
        }
    }
}

/// A quote that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePrice {
    pub price: Price,
    pub publish_time: Timestamp,
}

impl OraclePrice {
    /// Read and validate a price for a custody configured with `params`.
    pub fn new_from_oracle<S: PriceSource + ?Sized>(
        params: &OracleParams,
        source: &S,
        now: Timestamp,
    ) -> Result<Self, OracleError> {
        if source.oracle_type() != params.oracle_type {
            return Err(OracleError::OracleTypeMismatch {
                expected: params.oracle_type,
                found: source.oracle_type(),
            });
        }

        let quote = source.quote()?;

        let age_sec = now.seconds_since(quote.publish_time);
        if age_sec > params.max_price_age_sec as i64 {
            return Err(OracleError::StaleOracle {
                age_sec,
                max_age_sec: params.max_price_age_sec,
            });
        }

        if quote.price <= 0 {
            return Err(OracleError::InvalidOraclePrice(quote.price));
        }
        let mantissa = quote.price as u64;

        // conf shares the price exponent, so the ratio is scale free
        let conf_bps = (quote.conf as u128 * BPS_POWER as u128) / mantissa as u128;
        if conf_bps > params.max_price_error.value() as u128 {
            return Err(OracleError::OracleConfidenceExceeded {
                conf_bps: u64::try_from(conf_bps).unwrap_or(u64::MAX),
                max_bps: params.max_price_error.value(),
            });
        }

        let value = math::scaled_to_decimal(mantissa, quote.expo)?;
        let price = Price::new(value).ok_or(OracleError::InvalidOraclePrice(quote.price))?;

        Ok(Self {
            price,
            publish_time: quote.publish_time,
        })
    }

    pub fn value(&self) -> Decimal {
        self.price.value()
    }

    pub fn get_asset_amount_usd(&self, token_amount: u64, token_decimals: u8) -> Result<Decimal, MathError> {
        math::token_to_usd(token_amount, token_decimals, self.price)
    }

    pub fn get_token_amount(&self, amount_usd: Decimal, token_decimals: u8) -> Result<u64, MathError> {
        math::usd_to_token(amount_usd, token_decimals, self.price)
    }

    /// |other - self| / self in bps.
    pub fn deviation_bps(&self, other: Price) -> Result<Decimal, MathError> {
        other
            .value()
            .checked_sub(self.price.value())
            .map(|diff| diff.abs())
            .and_then(|diff| diff.checked_div(self.price.value()))
            .and_then(|ratio| ratio.checked_mul(Decimal::from(BPS_POWER)))
            .ok_or(MathError::Overflow("price deviation"))
    }
}
