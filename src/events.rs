// 11.0: every successful state change produces an event. used for audit trails
// and for tests that check what an operation did. failed operations emit nothing.

use crate::oracle::OracleType;
use crate::types::{AccountId, CustodyId, MintId, OracleId, PoolId, PositionKey, Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    // Admin events
    Initialized(InitializedEvent),
    PoolAdded(PoolAddedEvent),
    TokenAdded(TokenAddedEvent),

    // Oracle events
    TestOraclePriceSet(TestOraclePriceSetEvent),
    ExternalOracleLoaded(ExternalOracleLoadedEvent),

    // Pool events
    Swap(SwapEvent),
    LiquidityAdded(LiquidityAddedEvent),
    LiquidityRemoved(LiquidityRemovedEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),
    PositionLiquidated(PositionLiquidatedEvent),
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::Initialized(_) => "initialized",
            EventPayload::PoolAdded(_) => "pool_added",
            EventPayload::TokenAdded(_) => "token_added",
            EventPayload::TestOraclePriceSet(_) => "test_oracle_price_set",
            EventPayload::ExternalOracleLoaded(_) => "external_oracle_loaded",
            EventPayload::Swap(_) => "swap",
            EventPayload::LiquidityAdded(_) => "liquidity_added",
            EventPayload::LiquidityRemoved(_) => "liquidity_removed",
            EventPayload::PositionOpened(_) => "position_opened",
            EventPayload::PositionClosed(_) => "position_closed",
            EventPayload::PositionLiquidated(_) => "position_liquidated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializedEvent {
    pub admin: AccountId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolAddedEvent {
    pub pool: PoolId,
    pub name: String,
    pub lp_mint: MintId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAddedEvent {
    pub pool: PoolId,
    pub custody: CustodyId,
    pub mint: MintId,
    pub oracle_type: OracleType,
    // true when an existing custody's config was replaced
    pub updated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOraclePriceSetEvent {
    pub custody: CustodyId,
    pub oracle: OracleId,
    pub price: u64,
    pub expo: i32,
    pub conf: u64,
    pub publish_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalOracleLoadedEvent {
    pub oracle: OracleId,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub owner: AccountId,
    pub pool: PoolId,
    pub custody_in: CustodyId,
    pub custody_out: CustodyId,
    pub amount_in: u64,
    pub amount_out: u64,
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityAddedEvent {
    pub owner: AccountId,
    pub pool: PoolId,
    pub custody: CustodyId,
    pub amount: u64,
    pub fee: u64,
    pub lp_minted: u64,
    // pre-deposit valuation
    pub aum_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityRemovedEvent {
    pub owner: AccountId,
    pub pool: PoolId,
    pub custody: CustodyId,
    pub lp_burned: u64,
    pub amount_out: u64,
    pub fee: u64,
    pub aum_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub key: PositionKey,
    pub price: Price,
    pub size: u64,
    pub collateral: u64,
    pub locked: u64,
    // size of the position after this open
    pub total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub key: PositionKey,
    pub price: Price,
    pub size_closed: u64,
    pub payout: u64,
    pub pnl_usd: Decimal,
    pub remaining_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub key: PositionKey,
    pub liquidator: AccountId,
    pub price: Price,
    pub size: u64,
    pub owner_payout: u64,
    pub reward: u64,
    pub pnl_usd: Decimal,
}

/// Bounded in-memory event log. oldest events drop off first.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            // the log always keeps the event just pushed
            max_events: max_events.max(1),
        }
    }

    pub fn push(&mut self, timestamp: Timestamp, payload: EventPayload) -> &Event {
        let event = Event::new(EventId(self.next_id), timestamp, payload);
        self.next_id += 1;
        self.events.push(event);

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_added(id: u32) -> EventPayload {
        EventPayload::PoolAdded(PoolAddedEvent {
            pool: PoolId(id),
            name: format!("pool-{}", id),
            lp_mint: MintId(id),
        })
    }

    #[test]
    fn ids_increase() {
        let mut log = EventLog::new(10);
        log.push(Timestamp::from_secs(1), pool_added(1));
        let second = log.push(Timestamp::from_secs(2), pool_added(2));
        assert_eq!(second.id, EventId(2));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn bounded() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.push(Timestamp::from_secs(i as i64), pool_added(i));
        }
        assert_eq!(log.len(), 3);
        // ids keep counting after old events are dropped
        assert_eq!(log.events()[0].id, EventId(3));
        assert_eq!(log.last().unwrap().id, EventId(5));
        assert_eq!(log.recent(1)[0].payload.name(), "pool_added");
    }
}
