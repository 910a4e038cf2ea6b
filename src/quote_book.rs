// 3.0: bid/ask per watched instrument. bid is the last close, ask adds a jittered spread.
// only written from generator ticks.

use crate::instrument::Instrument;
use crate::series::{Candle, InvariantViolation};
use crate::types::{Price, Symbol, Timestamp};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid: Price,
    pub ask: Price,
    pub timestamp: Timestamp,
}

impl Quote {
    pub fn mid(&self) -> Decimal {
        (self.bid.value() + self.ask.value()) / Decimal::TWO
    }

    pub fn spread(&self) -> Decimal {
        self.ask.value() - self.bid.value()
    }
}

#[derive(Debug)]
pub struct QuoteBook {
    rng: StdRng,
    spread_jitter: Decimal,
    quotes: BTreeMap<Symbol, Quote>,
}

impl QuoteBook {
    pub fn new(rng: StdRng, spread_jitter: Decimal) -> Self {
        Self {
            rng,
            spread_jitter,
            quotes: BTreeMap::new(),
        }
    }

    // 3.1: spread = base * (1 + U(-1,1) * jitter), clamped at zero, rounded to digits
    fn jittered_spread(&mut self, instrument: &Instrument) -> Decimal {
        let noise = Decimal::from_f64(self.rng.gen_range(-1.0..=1.0)).unwrap_or(Decimal::ZERO);
        let raw = instrument.base_spread * (Decimal::ONE + noise * self.spread_jitter);
        instrument.round(raw.max(Decimal::ZERO))
    }

    /// Recompute the instrument's quote from its newest candle. A crossed book is
    /// rejected and the previous quote stays cached.
    pub fn refresh(
        &mut self,
        instrument: &Instrument,
        candle: &Candle,
        now: Timestamp,
    ) -> Result<Quote, InvariantViolation> {
        let spread = self.jittered_spread(instrument);
        let bid = candle.close;
        let ask = instrument.to_price(bid.value() + spread);
        self.install(Quote {
            symbol: instrument.symbol.clone(),
            bid,
            ask,
            timestamp: now,
        })
    }

    fn install(&mut self, quote: Quote) -> Result<Quote, InvariantViolation> {
        if quote.ask < quote.bid {
            let violation = InvariantViolation::NegativeSpread {
                symbol: quote.symbol.clone(),
                bid: quote.bid,
                ask: quote.ask,
            };
            error!(symbol = %quote.symbol, %violation, "quote rejected");
            return Err(violation);
        }
        debug!(symbol = %quote.symbol, bid = %quote.bid, ask = %quote.ask, "quote updated");
        self.quotes.insert(quote.symbol.clone(), quote.clone());
        Ok(quote)
    }

    pub fn quote(&self, symbol: &Symbol) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    /// Market watch, ordered by symbol
    pub fn quotes(&self) -> Vec<Quote> {
        self.quotes.values().cloned().collect()
    }
}
