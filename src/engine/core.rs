// 13.0 engine/core.rs: main engine. holds the perpetuals record, pools,
// custodies, oracle accounts, positions and the token ledger.

use super::admin::Perpetuals;
use super::config::EngineConfig;
use super::results::EngineError;
use crate::custody::Custody;
use crate::events::{Event, EventLog, EventPayload};
use crate::ledger::{Holder, TokenLedger};
use crate::oracle::{OracleAccount, OraclePrice, OracleType};
use crate::pool::Pool;
use crate::position::Position;
use crate::types::{AccountId, CustodyId, MintId, OracleId, PoolId, PositionKey, Timestamp};
use std::collections::HashMap;

/** 13.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) perpetuals: Option<Perpetuals>,
    pub(super) pools: HashMap<PoolId, Pool>,
    pub(super) custodies: HashMap<CustodyId, Custody>,
    pub(super) oracles: HashMap<OracleId, OracleAccount>,
    pub(super) positions: HashMap<PositionKey, Position>,
    pub(super) ledger: TokenLedger,
    pub(super) events: EventLog,
    pub(super) next_pool_id: u32,
    pub(super) next_custody_id: u32,
    pub(super) next_oracle_id: u32,
    pub(super) current_time: Timestamp,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let events = EventLog::new(config.max_events);
        Self {
            config,
            perpetuals: None,
            pools: HashMap::new(),
            custodies: HashMap::new(),
            oracles: HashMap::new(),
            positions: HashMap::new(),
            ledger: TokenLedger::new(),
            events,
            next_pool_id: 1,
            next_custody_id: 1,
            next_oracle_id: 1,
            current_time: Timestamp::from_secs(0),
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: i64) {
        self.current_time = self.current_time.plus_secs(secs);
    }

    // 13.2: host side setup. wallets and token mints live outside the protocol,
    // these stand in for them.
    pub fn create_mint(&mut self, decimals: u8) -> MintId {
        self.ledger.create_mint(decimals)
    }

    pub fn fund(&mut self, owner: AccountId, mint: MintId, amount: u64) -> Result<(), EngineError> {
        self.ledger.mint_to(mint, Holder::User(owner), amount)?;
        Ok(())
    }

    pub fn create_oracle_account(&mut self, oracle_type: OracleType) -> OracleId {
        let id = OracleId(self.next_oracle_id);
        self.next_oracle_id += 1;
        self.oracles.insert(id, OracleAccount::empty(oracle_type));
        id
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn balance(&self, owner: AccountId, mint: MintId) -> u64 {
        self.ledger.balance(Holder::User(owner), mint)
    }

    pub fn vault_balance(&self, custody: CustodyId) -> Result<u64, EngineError> {
        let custody = self.custody(custody)?;
        Ok(self.ledger.balance(Holder::Custody(custody.id), custody.mint))
    }

    pub fn perpetuals(&self) -> Option<&Perpetuals> {
        self.perpetuals.as_ref()
    }

    pub fn pool(&self, pool_id: PoolId) -> Result<&Pool, EngineError> {
        self.pools.get(&pool_id).ok_or(EngineError::PoolNotFound(pool_id))
    }

    pub fn pool_by_name(&self, name: &str) -> Option<&Pool> {
        self.pools.values().find(|pool| pool.name == name)
    }

    pub fn custody(&self, custody_id: CustodyId) -> Result<&Custody, EngineError> {
        self.custodies
            .get(&custody_id)
            .ok_or(EngineError::CustodyNotFound(custody_id))
    }

    pub fn custodies_iter(&self) -> impl Iterator<Item = (&CustodyId, &Custody)> {
        self.custodies.iter()
    }

    pub fn oracle_account(&self, oracle_id: OracleId) -> Result<&OracleAccount, EngineError> {
        self.oracles.get(&oracle_id).ok_or(EngineError::OracleNotFound(oracle_id))
    }

    pub fn position(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn positions_iter(&self) -> impl Iterator<Item = (&PositionKey, &Position)> {
        self.positions.iter()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub(super) fn require_init(&self) -> Result<&Perpetuals, EngineError> {
        self.perpetuals.as_ref().ok_or(EngineError::NotInitialized)
    }

    pub(super) fn require_admin(&self, caller: AccountId) -> Result<(), EngineError> {
        let perpetuals = self.require_init()?;
        if perpetuals.admin != caller {
            tracing::warn!(caller = %caller, "admin operation rejected");
            return Err(EngineError::Unauthorized(caller));
        }
        Ok(())
    }

    // custody that must sit in `pool_id`
    pub(super) fn pool_custody(&self, pool_id: PoolId, custody_id: CustodyId) -> Result<&Custody, EngineError> {
        let pool = self.pool(pool_id)?;
        let custody = self.custody(custody_id)?;
        if !pool.contains(custody_id) || custody.pool != pool_id {
            return Err(EngineError::CustodyNotInPool {
                pool: pool_id,
                custody: custody_id,
            });
        }
        Ok(custody)
    }

    // fresh oracle read for one custody, never cached
    pub(super) fn read_price(&self, custody: &Custody) -> Result<OraclePrice, EngineError> {
        let account = self.oracle_account(custody.oracle.oracle_account)?;
        let price = OraclePrice::new_from_oracle(&custody.oracle, account, self.current_time)?;
        Ok(price)
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let log_events = self.config.log_events;
        let event = self.events.push(self.current_time, payload);
        if log_events {
            tracing::debug!(
                event_id = event.id.0,
                kind = event.payload.name(),
                payload = ?event.payload,
                "event"
            );
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
