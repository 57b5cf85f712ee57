// 8.0 liquidity.rs: LP mint and burn math against a pool valuation.
// the valuation must be taken before the deposit or burn is applied.
// fees are charged in the custody's token and stay in its owned balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::custody::Custody;
use crate::math::{self, MathError};
use crate::oracle::OraclePrice;
use crate::pool::PoolValuation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityQuote {
    pub amount_in: u64,
    pub fee: u64,
    // usd credited for minting, after fee
    pub usd_value: Decimal,
    pub lp_minted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityQuote {
    pub lp_burned: u64,
    pub usd_value: Decimal,
    pub gross_out: u64,
    pub fee: u64,
    pub amount_out: u64,
}

pub fn quote_add_liquidity(
    amount: u64,
    custody: &Custody,
    price: &OraclePrice,
    valuation: &PoolValuation,
) -> Result<AddLiquidityQuote, MathError> {
    let fee = math::fee_amount(custody.fees.add_liquidity, amount)?;
    let credited = amount - fee.min(amount);
    let usd_value = price.get_asset_amount_usd(credited, custody.decimals)?;
    let lp_minted = valuation.lp_for_usd(usd_value)?;
    Ok(AddLiquidityQuote {
        amount_in: amount,
        fee,
        usd_value,
        lp_minted,
    })
}

pub fn quote_remove_liquidity(
    lp_amount: u64,
    custody: &Custody,
    price: &OraclePrice,
    valuation: &PoolValuation,
) -> Result<RemoveLiquidityQuote, MathError> {
    let usd_value = valuation.usd_for_lp(lp_amount)?;
    let gross_out = price.get_token_amount(usd_value, custody.decimals)?;
    let fee = math::fee_amount(custody.fees.remove_liquidity, gross_out)?;
    Ok(RemoveLiquidityQuote {
        lp_burned: lp_amount,
        usd_value,
        gross_out,
        fee,
        amount_out: gross_out - fee.min(gross_out),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::{Assets, Fees, PricingParams};
    use crate::oracle::{OracleParams, OracleType};
    use crate::types::{Bps, CustodyId, MintId, OracleId, PoolId, Price, Timestamp};
    use rust_decimal_macros::dec;

    fn custody(id: u32, decimals: u8, owned: u64, fees: Fees) -> Custody {
        let mut custody = Custody::new(
            CustodyId(id),
            PoolId(1),
            MintId(id),
            decimals,
            OracleParams {
                oracle_account: OracleId(id),
                oracle_type: OracleType::Test,
                max_price_error: Bps::new(10_000),
                max_price_age_sec: 60,
            },
            PricingParams::default(),
            fees,
        );
        custody.assets = Assets {
            owned,
            ..Assets::default()
        };
        custody
    }

    fn price(v: Decimal) -> OraclePrice {
        OraclePrice {
            price: Price::new_unchecked(v),
            publish_time: Timestamp::from_secs(0),
        }
    }

    #[test]
    fn first_deposit_mints_usd_value() {
        let a = custody(1, 9, 0, Fees::default());
        let p = price(dec!(1.23));
        let valuation = PoolValuation::compute([(&a, p)], 0).unwrap();

        let quote = quote_add_liquidity(10_000_000_000, &a, &p, &valuation).unwrap();
        assert_eq!(quote.usd_value, dec!(12.3));
        assert_eq!(quote.lp_minted, 12_300_000);
    }

    #[test]
    fn remove_after_swap_pays_from_whole_pool_value() {
        let a = custody(1, 9, 15_000_000_000, Fees::default());
        let b = custody(2, 6, 6_925_000, Fees::default());
        let pa = price(dec!(1.23));
        let valuation = PoolValuation::compute([(&a, pa), (&b, price(dec!(2)))], 32_300_000).unwrap();

        let quote = quote_remove_liquidity(10_000_000, &a, &pa, &valuation).unwrap();
        assert_eq!(quote.usd_value, dec!(10));
        assert_eq!(quote.amount_out, 8_130_081_300);
        assert_eq!(15_000_000_000 - quote.amount_out, 6_869_918_700);
    }

    #[test]
    fn fees_reduce_both_directions() {
        let fees = Fees {
            add_liquidity: Bps::new(100),
            remove_liquidity: Bps::new(100),
            ..Fees::default()
        };
        let a = custody(1, 6, 0, fees);
        let p = price(dec!(1));
        let empty = PoolValuation::compute([(&a, p)], 0).unwrap();

        let add = quote_add_liquidity(1_000_000, &a, &p, &empty).unwrap();
        assert_eq!(add.fee, 10_000);
        assert_eq!(add.lp_minted, 990_000);

        let funded = custody(1, 6, 1_000_000, fees);
        let valuation = PoolValuation::compute([(&funded, p)], 990_000).unwrap();
        let remove = quote_remove_liquidity(990_000, &funded, &p, &valuation).unwrap();
        assert_eq!(remove.gross_out, 1_000_000);
        assert_eq!(remove.fee, 10_000);
        assert_eq!(remove.amount_out, 990_000);
    }
}
