// 12.0 config.rs: deployment description. pools, their tokens, oracle and fee
// settings, loaded from json and applied to an engine through the admin calls.
// 12.1 has the demo preset used by the simulation binary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::custody::{Fees, PricingParams, MAX_TOKEN_DECIMALS};
use crate::engine::{Engine, EngineConfig, EngineError};
use crate::oracle::{OracleParams, OracleType};
use crate::pool::Pool;
use crate::types::{AccountId, Bps, CustodyId, MintId, OracleId, PoolId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub pools: Vec<PoolSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    pub tokens: Vec<TokenSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    // only used to look the token up after deployment
    pub symbol: String,
    pub decimals: u8,
    pub oracle: OracleSpec,
    #[serde(default)]
    pub pricing: PricingParams,
    #[serde(default)]
    pub fees: Fees,
    // written to the test oracle right after the token is added
    #[serde(default)]
    pub initial_price: Option<TestPrice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleSpec {
    pub oracle_type: OracleType,
    pub max_price_error: Bps,
    pub max_price_age_sec: u32,
}

/// value = price * 10^expo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPrice {
    pub price: u64,
    pub expo: i32,
    #[serde(default)]
    pub conf: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid deployment: {0}")]
    Invalid(String),

    #[error("Config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deployment failed: {0}")]
    Engine(#[from] EngineError),
}

/// Ids handed out while applying a `DeploymentConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub pools: Vec<DeployedPool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedPool {
    pub id: PoolId,
    pub name: String,
    pub lp_mint: MintId,
    pub tokens: Vec<DeployedToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedToken {
    pub symbol: String,
    pub mint: MintId,
    pub custody: CustodyId,
    pub oracle: OracleId,
}

impl Deployment {
    pub fn pool(&self, name: &str) -> Option<&DeployedPool> {
        self.pools.iter().find(|pool| pool.name == name)
    }

    pub fn token(&self, pool: &str, symbol: &str) -> Option<&DeployedToken> {
        self.pool(pool)?.token(symbol)
    }
}

impl DeployedPool {
    pub fn token(&self, symbol: &str) -> Option<&DeployedToken> {
        self.tokens.iter().find(|token| token.symbol == symbol)
    }
}

impl DeploymentConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // 12.1: one pool, two test-oracle tokens. A at 1.23 with 9 decimals,
    // B at 2.00 with 6 decimals, no fees.
    pub fn demo() -> Self {
        let oracle = OracleSpec {
            oracle_type: OracleType::Test,
            max_price_error: Bps::new(100),
            max_price_age_sec: 60,
        };
        let token = |symbol: &str, decimals: u8, price: u64, expo: i32| TokenSpec {
            symbol: symbol.to_string(),
            decimals,
            oracle,
            pricing: PricingParams::default(),
            fees: Fees::default(),
            initial_price: Some(TestPrice { price, expo, conf: 0 }),
        };
        Self {
            engine: EngineConfig::default(),
            pools: vec![PoolSpec {
                name: "pool1".to_string(),
                tokens: vec![token("A", 9, 123, -2), token("B", 6, 200, -2)],
            }],
        }
    }

    /// Checks that don't need an engine. `add_token` repeats the token checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, pool) in self.pools.iter().enumerate() {
            if !Pool::is_valid_name(&pool.name) {
                return Err(ConfigError::Invalid(format!("bad pool name {:?}", pool.name)));
            }
            if self.pools[..i].iter().any(|other| other.name == pool.name) {
                return Err(ConfigError::Invalid(format!("duplicate pool {:?}", pool.name)));
            }
            for (j, token) in pool.tokens.iter().enumerate() {
                if pool.tokens[..j].iter().any(|other| other.symbol == token.symbol) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate token {} in pool {}",
                        token.symbol, pool.name
                    )));
                }
                if token.decimals > MAX_TOKEN_DECIMALS {
                    return Err(ConfigError::Invalid(format!("{}: too many decimals", token.symbol)));
                }
                if !token.pricing.validate() || !token.fees.validate() {
                    return Err(ConfigError::Invalid(format!("{}: pricing or fees out of range", token.symbol)));
                }
                if token.initial_price.is_some() && token.oracle.oracle_type != OracleType::Test {
                    return Err(ConfigError::Invalid(format!(
                        "{}: initial price needs a test oracle",
                        token.symbol
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fresh engine with this deployment applied.
    pub fn build(&self, admin: AccountId) -> Result<(Engine, Deployment), ConfigError> {
        let mut engine = Engine::new(self.engine.clone());
        let deployment = self.apply(&mut engine, admin)?;
        Ok((engine, deployment))
    }

    /// Initializes the engine if needed, then adds every pool and token.
    /// mints and oracle accounts are created on the host side.
    pub fn apply(&self, engine: &mut Engine, admin: AccountId) -> Result<Deployment, ConfigError> {
        self.validate()?;
        if engine.perpetuals().is_none() {
            engine.init(admin)?;
        }

        let mut pools = Vec::with_capacity(self.pools.len());
        for spec in &self.pools {
            let pool_id = engine.add_pool(admin, &spec.name)?;
            let lp_mint = engine.pool(pool_id)?.lp_mint;

            let mut tokens = Vec::with_capacity(spec.tokens.len());
            for token in &spec.tokens {
                let mint = engine.create_mint(token.decimals);
                let oracle_id = engine.create_oracle_account(token.oracle.oracle_type);
                let oracle = OracleParams {
                    oracle_account: oracle_id,
                    oracle_type: token.oracle.oracle_type,
                    max_price_error: token.oracle.max_price_error,
                    max_price_age_sec: token.oracle.max_price_age_sec,
                };
                let custody = engine.add_token(admin, pool_id, mint, oracle, token.pricing, token.fees)?;
                if let Some(price) = token.initial_price {
                    let now = engine.time();
                    engine.set_test_oracle_price(admin, pool_id, custody, price.price, price.expo, price.conf, now)?;
                }
                tokens.push(DeployedToken {
                    symbol: token.symbol.clone(),
                    mint,
                    custody,
                    oracle: oracle_id,
                });
            }

            tracing::info!(pool = %pool_id, name = %spec.name, tokens = tokens.len(), "pool deployed");
            pools.push(DeployedPool {
                id: pool_id,
                name: spec.name.clone(),
                lp_mint,
                tokens,
            });
        }
        Ok(Deployment { pools })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ADMIN: AccountId = AccountId(1);

    #[test]
    fn demo_is_valid() {
        assert!(DeploymentConfig::demo().validate().is_ok());
    }

    #[test]
    fn demo_deploys_two_priced_tokens() {
        let (engine, deployment) = DeploymentConfig::demo().build(ADMIN).unwrap();
        let pool = deployment.pool("pool1").unwrap();
        assert_eq!(pool.tokens.len(), 2);
        assert_eq!(engine.pool(pool.id).unwrap().custodies.len(), 2);

        let a = deployment.token("pool1", "A").unwrap();
        assert_eq!(engine.custody(a.custody).unwrap().decimals, 9);
        assert_eq!(engine.perpetuals().unwrap().admin, ADMIN);

        // empty pool: AUM is zero and LP bootstraps at 1 usd
        assert_eq!(engine.assets_under_management(pool.id).unwrap(), dec!(0));
        assert_eq!(engine.lp_token_price(pool.id).unwrap(), dec!(1));
    }

    #[test]
    fn json_keeps_everything() {
        let config = DeploymentConfig::demo();
        let json = config.to_json().unwrap();
        let back = DeploymentConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let json = r#"{
            "pools": [{
                "name": "main",
                "tokens": [{
                    "symbol": "SOL",
                    "decimals": 9,
                    "oracle": { "oracle_type": "external", "max_price_error": 50, "max_price_age_sec": 30 }
                }]
            }]
        }"#;
        let config = DeploymentConfig::from_json(json).unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        let token = &config.pools[0].tokens[0];
        assert_eq!(token.pricing, PricingParams::default());
        assert_eq!(token.fees, Fees::default());
        assert_eq!(token.initial_price, None);
    }

    #[test]
    fn rejects_duplicates_and_bad_tokens() {
        let mut config = DeploymentConfig::demo();
        config.pools.push(config.pools[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DeploymentConfig::demo();
        config.pools[0].tokens[1].symbol = "A".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DeploymentConfig::demo();
        config.pools[0].tokens[0].oracle.oracle_type = OracleType::External;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DeploymentConfig::demo();
        config.pools[0].tokens[0].pricing = PricingParams::new(10, 5);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(DeploymentConfig::from_json("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn apply_reuses_an_initialized_engine() {
        let mut engine = Engine::default();
        engine.init(ADMIN).unwrap();
        let deployment = DeploymentConfig::demo().apply(&mut engine, ADMIN).unwrap();
        assert_eq!(deployment.pools.len(), 1);

        // second apply hits the duplicate pool name inside the engine
        let err = DeploymentConfig::demo().apply(&mut engine, ADMIN).unwrap_err();
        assert!(matches!(err, ConfigError::Engine(EngineError::DuplicatePoolName(_))));
    }
}
