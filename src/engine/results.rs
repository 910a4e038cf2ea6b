// 8.0.2: result types and errors for engine operations.

use crate::account::{AccountSnapshot, PositionValuation};
use crate::config::ConfigError;
use crate::indicator::IndicatorError;
use crate::ledger::{ClosedPosition, LedgerError};
use crate::position::OrderError;
use crate::series::{Candle, InvariantViolation};
use crate::types::{PositionId, Symbol, Timestamp};
use serde::Serialize;

/// Outcome of one price tick across every watched instrument
#[derive(Debug, Clone, Default)]
pub struct MarketTick {
    pub candles: Vec<(Symbol, Candle)>,
    /// Instruments whose tick was dropped. Their series and quote are unchanged.
    pub violations: Vec<(Symbol, InvariantViolation)>,
}

impl MarketTick {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// One valuation pass: what every position was worth, what got closed, and the
/// account afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationReport {
    pub timestamp: Timestamp,
    pub valuations: Vec<PositionValuation>,
    pub closed: Vec<ClosedPosition>,
    /// Positions skipped because their instrument had no quote yet
    pub unpriced: Vec<PositionId>,
    pub account: AccountSnapshot,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("position {0} not found")]
    PositionNotFound(PositionId),

    #[error("unknown instrument {0}")]
    UnknownInstrument(Symbol),

    #[error("no quote available for {0}")]
    NoQuote(Symbol),

    #[error("invalid timeframe {0:?}")]
    InvalidTimeframe(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("indicator error: {0}")]
    Indicator(#[from] IndicatorError),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => EngineError::PositionNotFound(id),
            LedgerError::Order(order) => EngineError::Order(order),
        }
    }
}
