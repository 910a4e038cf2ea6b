// 8.2 engine/market.rs: price ticks, chart selection, and the read side of market data.
// a tick extends every series by one candle and requotes it. one instrument's broken
// tick never blocks the others.

use super::core::Engine;
use super::results::{EngineError, MarketTick};
use crate::events::{CandleAppendedEvent, EventPayload, QuoteUpdatedEvent};
use crate::indicator::{Indicator, IndicatorOutput, SeriesArrays};
use crate::instrument::Instrument;
use crate::quote_book::Quote;
use crate::series::{Candle, InvariantViolation};
use crate::types::{Symbol, Timeframe};
use tracing::{debug, info};

impl Engine {
    /// One price tick for every instrument in the table
    pub fn advance_market(&mut self) -> MarketTick {
        let mut tick = MarketTick::default();
        let instruments: Vec<Instrument> = self.instruments.iter().cloned().collect();
        for instrument in &instruments {
            let symbol = instrument.symbol.clone();
            match self.tick_instrument(instrument) {
                Ok(candle) => tick.candles.push((symbol, candle)),
                Err(violation) => tick.violations.push((symbol, violation)),
            }
        }
        debug!(
            candles = tick.candles.len(),
            violations = tick.violations.len(),
            "market tick"
        );
        tick
    }

    /// Extend one instrument by a candle, or seed it if it has no series, then requote.
    pub fn advance_instrument(&mut self, symbol: &Symbol) -> Result<Candle, EngineError> {
        let instrument = self.instrument(symbol)?.clone();
        Ok(self.tick_instrument(&instrument)?)
    }

    fn tick_instrument(&mut self, instrument: &Instrument) -> Result<Candle, InvariantViolation> {
        let symbol = &instrument.symbol;
        let candle = match self
            .generator
            .advance(instrument, self.timeframe, self.current_time)
        {
            Ok(candle) => candle,
            Err(violation) => return Err(self.record_violation(symbol, violation)),
        };
        self.emit_event(EventPayload::CandleAppended(CandleAppendedEvent {
            symbol: symbol.clone(),
            open_time: candle.open_time,
            close: candle.close,
        }));

        let quote = match self.quotes.refresh(instrument, &candle, self.current_time) {
            Ok(quote) => quote,
            Err(violation) => return Err(self.record_violation(symbol, violation)),
        };
        self.emit_event(EventPayload::QuoteUpdated(QuoteUpdatedEvent {
            symbol: symbol.clone(),
            bid: quote.bid,
            ask: quote.ask,
        }));
        Ok(candle)
    }

    fn record_violation(
        &mut self,
        symbol: &Symbol,
        violation: InvariantViolation,
    ) -> InvariantViolation {
        self.emit_event(EventPayload::InvariantViolation {
            symbol: symbol.clone(),
            detail: violation.to_string(),
        });
        violation
    }

    /// Switch the chart to `symbol`. Its series is discarded and seeded afresh.
    pub fn select_instrument(&mut self, symbol: &Symbol) -> Result<(), EngineError> {
        if !self.instruments.contains(symbol) {
            return Err(EngineError::UnknownInstrument(symbol.clone()));
        }
        self.generator.reset(symbol);
        self.advance_instrument(symbol)?;
        self.selected = symbol.clone();
        self.emit_event(EventPayload::InstrumentSelected {
            symbol: symbol.clone(),
        });
        info!(%symbol, "instrument selected");
        Ok(())
    }

    /// Change the candle duration. Every series is regenerated at the new spacing.
    pub fn set_timeframe(&mut self, timeframe: Timeframe) -> Result<MarketTick, EngineError> {
        if timeframe == self.timeframe {
            return Ok(MarketTick::default());
        }
        self.timeframe = timeframe;
        let tick = self.advance_market();
        self.emit_event(EventPayload::TimeframeChanged { timeframe });
        info!(%timeframe, "timeframe changed");
        Ok(tick)
    }

    /// Same as [`Engine::set_timeframe`] for a toolbar label ("1", "15", "240", "D").
    pub fn set_timeframe_label(&mut self, label: &str) -> Result<MarketTick, EngineError> {
        let timeframe = Timeframe::from_label(label)
            .ok_or_else(|| EngineError::InvalidTimeframe(label.to_string()))?;
        self.set_timeframe(timeframe)
    }

    /// Oldest first
    pub fn latest_candles(&self, symbol: &Symbol) -> Result<Vec<Candle>, EngineError> {
        self.instrument(symbol)?;
        Ok(self
            .generator
            .series(symbol)
            .map(|series| series.to_vec())
            .unwrap_or_default())
    }

    pub fn quote(&self, symbol: &Symbol) -> Result<Quote, EngineError> {
        self.instrument(symbol)?;
        self.quotes
            .quote(symbol)
            .cloned()
            .ok_or_else(|| EngineError::NoQuote(symbol.clone()))
    }

    /// Market watch
    pub fn quotes(&self) -> Vec<Quote> {
        self.quotes.quotes()
    }

    pub fn indicator_input(&self, symbol: &Symbol) -> Result<SeriesArrays, EngineError> {
        self.instrument(symbol)?;
        let arrays = match self.generator.series(symbol) {
            Some(series) => SeriesArrays::from_candles(series.iter()),
            None => SeriesArrays::default(),
        };
        Ok(arrays)
    }

    pub fn evaluate_indicator(
        &self,
        symbol: &Symbol,
        indicator: &dyn Indicator,
    ) -> Result<IndicatorOutput, EngineError> {
        let input = self.indicator_input(symbol)?;
        Ok(indicator.evaluate(&input)?)
    }
}
