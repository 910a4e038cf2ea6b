// 8.0 engine/core.rs: main engine. owns the instrument table, generator, quote book,
// ledger and event log. every mutation goes through &mut Engine.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::config::SimConfig;
use crate::events::{Event, EventEmitter, EventId, EventLog, EventPayload};
use crate::instrument::{Instrument, InstrumentTable};
use crate::ledger::PositionLedger;
use crate::quote_book::QuoteBook;
use crate::series::PriceSeriesGenerator;
use crate::types::{Symbol, Timeframe, Timestamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) instruments: InstrumentTable,
    pub(super) generator: PriceSeriesGenerator,
    pub(super) quotes: QuoteBook,
    pub(super) ledger: PositionLedger,
    pub(super) events: EventLog,
    pub(super) selected: Symbol,
    pub(super) timeframe: Timeframe,
    pub(super) current_time: Timestamp,
}

impl Engine {
    /// Engine on the wall clock
    pub fn new(config: &SimConfig) -> Result<Self, EngineError> {
        Self::starting_at(config, Timestamp::now())
    }

    /// Validate the config, seed every instrument's history ending at `now` and quote
    /// it. With a configured seed the result is fully reproducible.
    pub fn starting_at(config: &SimConfig, now: Timestamp) -> Result<Self, EngineError> {
        config.validate()?;
        let instruments = config.instrument_table()?;
        let engine_config = EngineConfig::from(config);

        let mut root = match engine_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let generator = PriceSeriesGenerator::new(
            StdRng::seed_from_u64(root.gen()),
            engine_config.history_len,
            engine_config.series_capacity,
        );
        let quotes = QuoteBook::new(StdRng::seed_from_u64(root.gen()), engine_config.spread_jitter);

        let mut engine = Self {
            ledger: PositionLedger::new(engine_config.starting_balance)
                .with_max_volume(engine_config.max_volume),
            events: EventLog::new(engine_config.max_events),
            config: engine_config,
            instruments,
            generator,
            quotes,
            selected: config.default_symbol.clone(),
            timeframe: config.default_timeframe,
            current_time: now,
        };

        let symbols = engine.instruments.symbols();
        for symbol in &symbols {
            engine.advance_instrument(symbol)?;
        }
        info!(
            instruments = symbols.len(),
            timeframe = %engine.timeframe,
            seed = ?engine.config.seed,
            "engine started"
        );
        Ok(engine)
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn instruments(&self) -> &InstrumentTable {
        &self.instruments
    }

    pub fn instrument(&self, symbol: &Symbol) -> Result<&Instrument, EngineError> {
        self.instruments
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownInstrument(symbol.clone()))
    }

    pub fn selected_instrument(&self) -> &Symbol {
        &self.selected
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn recent_events(&self, count: usize) -> Vec<Event> {
        self.events.recent(count)
    }

    /// Events after `after`, oldest first
    pub fn events_since(&self, after: EventId) -> Vec<Event> {
        self.events.since(after)
    }

    pub fn last_event_id(&self) -> Option<EventId> {
        self.events.last_id()
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) -> EventId {
        self.events.emit(self.current_time, payload)
    }
}
