// 7.0 swap.rs: oracle priced conversion between two custodies of one pool.
// amount_out = amount_in * price_in / price_out, truncated at the output decimals.
// the swap fee is taken from the dispensed side and never leaves the vault.

use serde::{Deserialize, Serialize};

use crate::custody::Custody;
use crate::math::{self, MathError};
use crate::oracle::OraclePrice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub amount_in: u64,
    // before fee
    pub gross_out: u64,
    pub fee: u64,
    // what the user receives
    pub amount_out: u64,
}

pub fn get_swap_amount(
    amount_in: u64,
    custody_in: &Custody,
    price_in: &OraclePrice,
    custody_out: &Custody,
    price_out: &OraclePrice,
) -> Result<u64, MathError> {
    let value = math::native_to_decimal(amount_in, custody_in.decimals)?
        .checked_mul(price_in.value())
        .ok_or(MathError::Overflow("swap value"))?;
    let tokens = value
        .checked_div(price_out.value())
        .ok_or(MathError::DivisionByZero("swap"))?;
    math::decimal_to_native(tokens, custody_out.decimals)
}

pub fn quote_swap(
    amount_in: u64,
    custody_in: &Custody,
    price_in: &OraclePrice,
    custody_out: &Custody,
    price_out: &OraclePrice,
) -> Result<SwapQuote, MathError> {
    let gross_out = get_swap_amount(amount_in, custody_in, price_in, custody_out, price_out)?;
    let fee = math::fee_amount(custody_out.fees.swap, gross_out)?;
    Ok(SwapQuote {
        amount_in,
        gross_out,
        fee,
        amount_out: gross_out - fee.min(gross_out),
    })
}
