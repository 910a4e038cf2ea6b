// 2.0: synthetic candle streams. one bounded, time-ordered window per instrument.
// 2.1 is the random-walk step, 2.2 the generator that seeds and extends series.

use crate::instrument::Instrument;
use crate::types::{Price, Symbol, Timeframe, Timestamp};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error};

/// One OHLC bar. `open_time` is epoch seconds at the start of the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    /// Synthetic tick count, always positive
    pub volume: u64,
}

impl Candle {
    /// low <= min(open, close) and high >= max(open, close)
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low || self.high < body_high {
            return Err(InvariantViolation::CandleOrdering {
                open_time: self.open_time,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }
}

/// Internal consistency failures. Fatal to the tick that produced them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("candle at {open_time} breaks OHLC ordering: o={open} h={high} l={low} c={close}")]
    CandleOrdering {
        open_time: i64,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
    },

    #[error("candle at {next} does not follow {previous} by {timeframe_secs}s")]
    CandleSpacing {
        previous: i64,
        next: i64,
        timeframe_secs: i64,
    },

    #[error("negative spread on {symbol}: bid {bid} > ask {ask}")]
    NegativeSpread { symbol: Symbol, bid: Price, ask: Price },
}

/// 2.0.1: bounded sliding window. oldest candle is evicted first.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    symbol: Symbol,
    timeframe: Timeframe,
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleSeries {
    pub fn new(symbol: Symbol, timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            symbol,
            timeframe,
            capacity: capacity.max(1),
            candles: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Append after validating OHLC ordering and spacing. Rejected candles leave the
    /// series untouched.
    pub fn push(&mut self, candle: Candle) -> Result<(), InvariantViolation> {
        candle.validate()?;
        if let Some(last) = self.candles.back() {
            if candle.open_time != last.open_time + self.timeframe.secs() {
                return Err(InvariantViolation::CandleSpacing {
                    previous: last.open_time,
                    next: candle.open_time,
                    timeframe_secs: self.timeframe.secs(),
                });
            }
        }
        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
        Ok(())
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }
}

/// 2.1: one random-walk step from `open`. every price is rounded to the instrument's
/// digits before it is stored.
pub fn step_candle<R: Rng + ?Sized>(
    rng: &mut R,
    instrument: &Instrument,
    open: Price,
    open_time: i64,
) -> Candle {
    let vol = instrument.volatility;
    let drift = draw(rng.gen_range(-1.0..=1.0)) * vol;
    let wick_up = draw(rng.gen::<f64>()) * vol;
    let wick_down = draw(rng.gen::<f64>()) * vol;

    let close = instrument.to_price(open.value() + drift);
    let high = instrument.to_price(open.max(close).value() + wick_up);
    let low = instrument.to_price(open.min(close).value() - wick_down);

    Candle {
        open_time,
        open,
        high,
        low,
        close,
        volume: rng.gen_range(1..=250),
    }
}

fn draw(sample: f64) -> Decimal {
    Decimal::from_f64(sample).unwrap_or(Decimal::ZERO)
}

/// 2.2: owns every instrument's candle window. sole writer of candle history.
#[derive(Debug)]
pub struct PriceSeriesGenerator {
    rng: StdRng,
    history_len: usize,
    capacity: usize,
    series: HashMap<Symbol, CandleSeries>,
}

impl PriceSeriesGenerator {
    pub fn new(rng: StdRng, history_len: usize, capacity: usize) -> Self {
        Self {
            rng,
            history_len: history_len.clamp(1, capacity.max(1)),
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    /// Extend the instrument's series by one candle, seeding a fresh history first if
    /// there is none or it was built for another timeframe. Returns the newest candle.
    pub fn advance(
        &mut self,
        instrument: &Instrument,
        timeframe: Timeframe,
        now: Timestamp,
    ) -> Result<Candle, InvariantViolation> {
        if let Some(series) = self
            .series
            .get_mut(&instrument.symbol)
            .filter(|s| s.timeframe() == timeframe)
        {
            if let Some(last) = series.last().copied() {
                let candle = step_candle(
                    &mut self.rng,
                    instrument,
                    last.close,
                    last.open_time + timeframe.secs(),
                );
                if let Err(violation) = series.push(candle) {
                    error!(symbol = %instrument.symbol, %violation, "dropping generated candle");
                    return Err(violation);
                }
                debug!(
                    symbol = %instrument.symbol,
                    open_time = candle.open_time,
                    close = %candle.close,
                    "candle appended"
                );
                return Ok(candle);
            }
        }
        self.seed(instrument, timeframe, now)
    }

    // fresh history ending at `now` floored to the timeframe. swapped in only if every
    // candle is valid.
    fn seed(
        &mut self,
        instrument: &Instrument,
        timeframe: Timeframe,
        now: Timestamp,
    ) -> Result<Candle, InvariantViolation> {
        let last_open = timeframe.floor(now);
        let first_open = last_open - (self.history_len as i64 - 1) * timeframe.secs();

        let mut series = CandleSeries::new(instrument.symbol.clone(), timeframe, self.capacity);
        let mut newest = step_candle(
            &mut self.rng,
            instrument,
            instrument.to_price(instrument.base_price),
            first_open,
        );
        for i in 0..self.history_len {
            if i > 0 {
                let open_time = first_open + i as i64 * timeframe.secs();
                newest = step_candle(&mut self.rng, instrument, newest.close, open_time);
            }
            if let Err(violation) = series.push(newest) {
                error!(symbol = %instrument.symbol, %violation, "seeding aborted");
                return Err(violation);
            }
        }

        debug!(
            symbol = %instrument.symbol,
            %timeframe,
            candles = series.len(),
            "series seeded"
        );
        self.series.insert(instrument.symbol.clone(), series);
        Ok(newest)
    }

    /// Forget the instrument's series; the next advance seeds it again.
    pub fn reset(&mut self, symbol: &Symbol) {
        self.series.remove(symbol);
    }

    pub fn series(&self, symbol: &Symbol) -> Option<&CandleSeries> {
        self.series.get(symbol)
    }
}
