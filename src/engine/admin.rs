// 13.3 engine/admin.rs: init, pools, tokens and oracle administration.
// everything here except load_external_oracle is gated on the stored admin.

use super::core::Engine;
use super::results::EngineError;
use crate::custody::{Custody, Fees, PricingParams};
use crate::events::{
    EventPayload, ExternalOracleLoadedEvent, InitializedEvent, PoolAddedEvent, TestOraclePriceSetEvent,
    TokenAddedEvent,
};
use crate::oracle::{ExternalPriceAccount, OracleAccount, OracleError, OracleParams, OracleType, PriceSource};
use crate::pool::Pool;
use crate::types::{AccountId, CustodyId, MintId, OracleId, PoolId, Timestamp, LP_DECIMALS};
use serde::{Deserialize, Serialize};

/** 13.3.1: protocol singleton */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perpetuals {
    pub admin: AccountId,
    // insertion order
    pub pools: Vec<PoolId>,
    pub inception_time: Timestamp,
}

impl Engine {
    pub fn init(&mut self, admin: AccountId) -> Result<&Perpetuals, EngineError> {
        if self.perpetuals.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        self.perpetuals = Some(Perpetuals {
            admin,
            pools: Vec::new(),
            inception_time: self.current_time,
        });
        tracing::info!(admin = %admin, "perpetuals initialized");
        self.emit_event(EventPayload::Initialized(InitializedEvent { admin }));
        self.require_init()
    }

    pub fn add_pool(&mut self, caller: AccountId, name: &str) -> Result<PoolId, EngineError> {
        self.require_admin(caller)?;
        if !Pool::is_valid_name(name) {
            return Err(EngineError::InvalidPoolName(name.to_string()));
        }
        if self.pool_by_name(name).is_some() {
            return Err(EngineError::DuplicatePoolName(name.to_string()));
        }

        let pool_id = PoolId(self.next_pool_id);
        self.next_pool_id += 1;
        let lp_mint = self.ledger.create_mint(LP_DECIMALS);
        let pool = Pool::new(pool_id, name.to_string(), lp_mint, self.current_time);
        self.pools.insert(pool_id, pool);
        if let Some(perpetuals) = self.perpetuals.as_mut() {
            perpetuals.pools.push(pool_id);
        }

        tracing::info!(pool = %pool_id, name, lp_mint = %lp_mint, "pool added");
        self.emit_event(EventPayload::PoolAdded(PoolAddedEvent {
            pool: pool_id,
            name: name.to_string(),
            lp_mint,
        }));
        Ok(pool_id)
    }

    // re-adding a mint already in the pool replaces its configuration
    pub fn add_token(
        &mut self,
        caller: AccountId,
        pool_id: PoolId,
        mint: MintId,
        oracle: OracleParams,
        pricing: PricingParams,
        fees: Fees,
    ) -> Result<CustodyId, EngineError> {
        self.require_admin(caller)?;
        let pool = self.pool(pool_id)?;
        let decimals = self.ledger.decimals(mint)?;
        let account = self.oracle_account(oracle.oracle_account)?;
        if account.oracle_type() != oracle.oracle_type {
            return Err(OracleError::OracleTypeMismatch {
                expected: oracle.oracle_type,
                found: account.oracle_type(),
            }
            .into());
        }

        let existing = pool
            .custodies
            .iter()
            .filter_map(|id| self.custodies.get(id))
            .find(|custody| custody.mint == mint)
            .map(|custody| custody.id);

        let custody_id = existing.unwrap_or(CustodyId(self.next_custody_id));
        let custody = match existing {
            Some(id) => Custody {
                oracle,
                pricing,
                fees,
                ..self.custody(id)?.clone()
            },
            None => Custody::new(custody_id, pool_id, mint, decimals, oracle, pricing, fees),
        };
        custody.validate()?;

        if existing.is_none() {
            self.next_custody_id += 1;
            if let Some(pool) = self.pools.get_mut(&pool_id) {
                pool.custodies.push(custody_id);
            }
        }
        self.custodies.insert(custody_id, custody);

        tracing::info!(
            pool = %pool_id,
            custody = %custody_id,
            mint = %mint,
            oracle_type = %oracle.oracle_type,
            updated = existing.is_some(),
            "token added"
        );
        self.emit_event(EventPayload::TokenAdded(TokenAddedEvent {
            pool: pool_id,
            custody: custody_id,
            mint,
            oracle_type: oracle.oracle_type,
            updated: existing.is_some(),
        }));
        Ok(custody_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_test_oracle_price(
        &mut self,
        caller: AccountId,
        pool_id: PoolId,
        custody_id: CustodyId,
        price: u64,
        expo: i32,
        conf: u64,
        publish_time: Timestamp,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        let custody = self.pool_custody(pool_id, custody_id)?;
        let oracle_id = custody.oracle.oracle_account;
        if custody.oracle.oracle_type != OracleType::Test {
            return Err(OracleError::OracleTypeMismatch {
                expected: OracleType::Test,
                found: custody.oracle.oracle_type,
            }
            .into());
        }
        if i64::try_from(price).is_err() {
            return Err(OracleError::InvalidOraclePrice(i64::MAX).into());
        }

        match self.oracles.get_mut(&oracle_id) {
            Some(OracleAccount::Test(oracle)) => oracle.set(price, expo, conf, publish_time),
            Some(OracleAccount::External(_)) => {
                return Err(OracleError::OracleTypeMismatch {
                    expected: OracleType::Test,
                    found: OracleType::External,
                }
                .into())
            }
            None => return Err(EngineError::OracleNotFound(oracle_id)),
        }

        tracing::debug!(custody = %custody_id, price, expo, conf, publish_time = %publish_time, "test oracle price set");
        self.emit_event(EventPayload::TestOraclePriceSet(TestOraclePriceSetEvent {
            custody: custody_id,
            oracle: oracle_id,
            price,
            expo,
            conf,
            publish_time,
        }));
        Ok(())
    }

    // the external publisher writes raw account data. contents are only
    // validated when a custody reads the price.
    pub fn load_external_oracle(&mut self, oracle_id: OracleId, data: Vec<u8>) -> Result<(), EngineError> {
        let account = self
            .oracles
            .get_mut(&oracle_id)
            .ok_or(EngineError::OracleNotFound(oracle_id))?;
        if let OracleAccount::Test(_) = account {
            return Err(OracleError::OracleTypeMismatch {
                expected: OracleType::External,
                found: OracleType::Test,
            }
            .into());
        }
        let len = data.len();
        *account = OracleAccount::External(ExternalPriceAccount::from_bytes(data));

        self.emit_event(EventPayload::ExternalOracleLoaded(ExternalOracleLoadedEvent {
            oracle: oracle_id,
            len,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::CustodyError;
    use crate::types::Bps;

    const ADMIN: AccountId = AccountId(1);
    const MALLORY: AccountId = AccountId(666);

    fn oracle_params(oracle_account: OracleId, oracle_type: OracleType) -> OracleParams {
        OracleParams {
            oracle_account,
            oracle_type,
            max_price_error: Bps::new(10_000),
            max_price_age_sec: 60,
        }
    }

    #[test]
    fn init_once() {
        let mut engine = Engine::default();
        assert_eq!(engine.add_pool(ADMIN, "main"), Err(EngineError::NotInitialized));

        engine.init(ADMIN).unwrap();
        assert_eq!(engine.init(ADMIN).unwrap_err(), EngineError::AlreadyInitialized);
    }

    #[test]
    fn pools_admin_gated_and_unique() {
        let mut engine = Engine::default();
        engine.init(ADMIN).unwrap();

        assert_eq!(engine.add_pool(MALLORY, "main"), Err(EngineError::Unauthorized(MALLORY)));
        assert!(matches!(engine.add_pool(ADMIN, ""), Err(EngineError::InvalidPoolName(_))));

        let pool = engine.add_pool(ADMIN, "main").unwrap();
        assert!(matches!(engine.add_pool(ADMIN, "main"), Err(EngineError::DuplicatePoolName(_))));

        let lp_mint = engine.pool(pool).unwrap().lp_mint;
        assert_eq!(engine.ledger().decimals(lp_mint).unwrap(), LP_DECIMALS);
        assert_eq!(engine.perpetuals().unwrap().pools, vec![pool]);
    }

    #[test]
    fn re_adding_a_token_updates_in_place() {
        let mut engine = Engine::default();
        engine.init(ADMIN).unwrap();
        let pool = engine.add_pool(ADMIN, "main").unwrap();
        let mint = engine.create_mint(9);
        let oracle = engine.create_oracle_account(OracleType::Test);

        let first = engine
            .add_token(ADMIN, pool, mint, oracle_params(oracle, OracleType::Test), PricingParams::default(), Fees::default())
            .unwrap();
        let second = engine
            .add_token(ADMIN, pool, mint, oracle_params(oracle, OracleType::Test), PricingParams::new(2, 50), Fees::default())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.pool(pool).unwrap().custodies, vec![first]);
        assert_eq!(engine.custody(first).unwrap().pricing, PricingParams::new(2, 50));
    }

    #[test]
    fn bad_token_config_rejected() {
        let mut engine = Engine::default();
        engine.init(ADMIN).unwrap();
        let pool = engine.add_pool(ADMIN, "main").unwrap();
        let mint = engine.create_mint(9);
        let oracle = engine.create_oracle_account(OracleType::Test);

        let result = engine.add_token(
            ADMIN,
            pool,
            mint,
            oracle_params(oracle, OracleType::Test),
            PricingParams::new(50, 10),
            Fees::default(),
        );
        assert_eq!(result, Err(EngineError::Custody(CustodyError::InvalidTokenConfig("pricing params"))));
        assert!(engine.pool(pool).unwrap().custodies.is_empty());
    }

    #[test]
    fn test_price_rejected_on_external_custody() {
        let mut engine = Engine::default();
        engine.init(ADMIN).unwrap();
        let pool = engine.add_pool(ADMIN, "main").unwrap();
        let mint = engine.create_mint(6);
        let oracle = engine.create_oracle_account(OracleType::External);
        let custody = engine
            .add_token(ADMIN, pool, mint, oracle_params(oracle, OracleType::External), PricingParams::default(), Fees::default())
            .unwrap();

        let result = engine.set_test_oracle_price(ADMIN, pool, custody, 2_000, -3, 0, Timestamp::from_secs(0));
        assert!(matches!(result, Err(EngineError::Oracle(OracleError::OracleTypeMismatch { .. }))));

        let data = ExternalPriceAccount::encode(&crate::oracle::PriceQuote {
            price: 2_000,
            expo: -3,
            conf: 0,
            publish_time: Timestamp::from_secs(0),
        })
        .data()
        .to_vec();
        engine.load_external_oracle(oracle, data).unwrap();
        assert_eq!(engine.oracle_account(oracle).unwrap().quote().unwrap().price, 2_000);
    }

    #[test]
    fn test_price_admin_gated() {
        let mut engine = Engine::default();
        engine.init(ADMIN).unwrap();
        let pool = engine.add_pool(ADMIN, "main").unwrap();
        let mint = engine.create_mint(6);
        let oracle = engine.create_oracle_account(OracleType::Test);
        let custody = engine
            .add_token(ADMIN, pool, mint, oracle_params(oracle, OracleType::Test), PricingParams::default(), Fees::default())
            .unwrap();

        let before = engine.events().len();
        let result = engine.set_test_oracle_price(MALLORY, pool, custody, 2_000, -3, 0, Timestamp::from_secs(0));
        assert_eq!(result, Err(EngineError::Unauthorized(MALLORY)));
        assert_eq!(engine.events().len(), before);
    }
}
