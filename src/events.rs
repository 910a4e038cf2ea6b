// 7.0: every state change produces an event. the view layer polls them with events_since,
// tests use them to reconstruct what a tick did. EventPayload lists all event types.

use crate::position::CloseReason;
use crate::types::{Money, PositionId, Price, Side, Symbol, Timeframe, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

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
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // Market data
    CandleAppended(CandleAppendedEvent),
    QuoteUpdated(QuoteUpdatedEvent),

    // Positions
    PositionOpened(PositionOpenedEvent),
    TriggersEdited(TriggersEditedEvent),
    PositionClosed(PositionClosedEvent),

    // View selection
    InstrumentSelected { symbol: Symbol },
    TimeframeChanged { timeframe: Timeframe },

    // Dropped ticks
    InvariantViolation { symbol: Symbol, detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleAppendedEvent {
    pub symbol: Symbol,
    pub open_time: i64,
    pub close: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteUpdatedEvent {
    pub symbol: Symbol,
    pub bid: Price,
    pub ask: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub position_id: PositionId,
    pub symbol: Symbol,
    pub side: Side,
    pub volume: Decimal,
    pub entry_price: Price,
    pub leverage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggersEditedEvent {
    pub position_id: PositionId,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub position_id: PositionId,
    pub symbol: Symbol,
    pub exit_price: Price,
    pub realized_pnl: Money,
    pub new_balance: Money,
    pub reason: CloseReason,
}

pub trait EventEmitter {
    fn emit(&mut self, timestamp: Timestamp, payload: EventPayload) -> EventId;
}

/// Bounded in-memory log. Ids keep increasing after old events are evicted.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<Event>,
    next_id: u64,
    max_events: usize,
}

impl EventLog {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::new(),
            next_id: 1,
            max_events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn last_id(&self) -> Option<EventId> {
        self.events.back().map(|e| e.id)
    }

    /// Events strictly after `after`, oldest first. Events already evicted are gone.
    pub fn since(&self, after: EventId) -> Vec<Event> {
        let start = self.events.partition_point(|e| e.id <= after);
        self.events.range(start..).cloned().collect()
    }

    pub fn recent(&self, count: usize) -> Vec<Event> {
        let start = self.events.len().saturating_sub(count);
        self.events.range(start..).cloned().collect()
    }
}

impl EventEmitter for EventLog {
    fn emit(&mut self, timestamp: Timestamp, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        debug!(event_id = id.0, ?payload, "event");
        self.events.push_back(Event::new(id, timestamp, payload));

        while self.events.len() > self.max_events {
            self.events.pop_front();
        }
        id
    }
}
