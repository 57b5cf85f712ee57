// 2.0: fixed point helpers. native token units are u64 scaled by mint decimals,
// prices and usd values are Decimal. every conversion truncates toward zero
// so the pool never pays out a fraction of a unit it doesn't have.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::types::{Bps, Price, BPS_POWER, USD_DECIMALS};

// Decimal carries at most 28 fractional digits
const MAX_SCALE: u32 = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("math overflow in {0}")]
    Overflow(&'static str),

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("value {0} does not fit in a native amount")]
    OutOfRange(Decimal),
}

pub fn checked_add(a: u64, b: u64) -> Result<u64, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow("add"))
}

pub fn checked_sub(a: u64, b: u64) -> Result<u64, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow("sub"))
}

// a * b / c in u128, floored
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> Result<u64, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero("mul_div_floor"));
    }
    let product = (a as u128)
        .checked_mul(b as u128)
        .ok_or(MathError::Overflow("mul_div_floor"))?;
    u64::try_from(product / c as u128).map_err(|_| MathError::Overflow("mul_div_floor"))
}

pub fn pow10(exp: u32) -> Result<Decimal, MathError> {
    let mut out = Decimal::ONE;
    for _ in 0..exp {
        out = out.checked_mul(Decimal::TEN).ok_or(MathError::Overflow("pow10"))?;
    }
    Ok(out)
}

// mantissa * 10^expo, the way oracles publish prices
pub fn scaled_to_decimal(mantissa: u64, expo: i32) -> Result<Decimal, MathError> {
    if expo <= 0 {
        let scale = expo.unsigned_abs();
        if scale > MAX_SCALE {
            return Err(MathError::Overflow("scaled_to_decimal"));
        }
        Decimal::try_from_i128_with_scale(mantissa as i128, scale)
            .map_err(|_| MathError::Overflow("scaled_to_decimal"))
    } else {
        Decimal::from(mantissa)
            .checked_mul(pow10(expo as u32)?)
            .ok_or(MathError::Overflow("scaled_to_decimal"))
    }
}

pub fn native_to_decimal(amount: u64, decimals: u8) -> Result<Decimal, MathError> {
    Decimal::try_from_i128_with_scale(amount as i128, decimals as u32)
        .map_err(|_| MathError::Overflow("native_to_decimal"))
}

pub fn decimal_to_native(value: Decimal, decimals: u8) -> Result<u64, MathError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MathError::OutOfRange(value));
    }
    let scaled = value
        .checked_mul(pow10(decimals as u32)?)
        .ok_or(MathError::Overflow("decimal_to_native"))?;
    scaled.trunc().to_u64().ok_or(MathError::OutOfRange(value))
}

pub fn truncate(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

// token units -> usd at USD_DECIMALS
pub fn token_to_usd(amount: u64, decimals: u8, price: Price) -> Result<Decimal, MathError> {
    if amount == 0 {
        return Ok(Decimal::ZERO);
    }
    let value = native_to_decimal(amount, decimals)?
        .checked_mul(price.value())
        .ok_or(MathError::Overflow("token_to_usd"))?;
    Ok(truncate(value, USD_DECIMALS))
}

// usd -> token units of a mint with `decimals`
pub fn usd_to_token(usd: Decimal, decimals: u8, price: Price) -> Result<u64, MathError> {
    if usd.is_zero() {
        return Ok(0);
    }
    let tokens = usd
        .checked_div(price.value())
        .ok_or(MathError::DivisionByZero("usd_to_token"))?;
    decimal_to_native(tokens, decimals)
}

// fees round up so the pool keeps the dust
pub fn fee_amount(fee: Bps, amount: u64) -> Result<u64, MathError> {
    if fee.is_zero() || amount == 0 {
        return Ok(0);
    }
    let numerator = (amount as u128)
        .checked_mul(fee.value() as u128)
        .ok_or(MathError::Overflow("fee_amount"))?;
    let fee = numerator.div_ceil(BPS_POWER as u128);
    u64::try_from(fee).map_err(|_| MathError::Overflow("fee_amount"))
}

// numerator / denominator expressed in bps, floored
pub fn ratio_bps(numerator: u64, denominator: u64) -> Result<u64, MathError> {
    mul_div_floor(numerator, BPS_POWER, denominator)
}
