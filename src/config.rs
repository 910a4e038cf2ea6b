// 10.0 config.rs: all simulation settings in one place. balances, cadences, history, rng.
// 10.1 every field has a serde default so a partial JSON document is a valid config.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::instrument::{Instrument, InstrumentTable};
use crate::types::{Symbol, Timeframe};

/// Which side of the book a close settles at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementConvention {
    // longs exit at bid, shorts at ask. same convention as entry.
    #[default]
    BidAsk,
    Mid,
}

// Complete configuration for one simulated terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // Demo account starting capital
    pub starting_balance: Decimal,
    // Largest accepted order, in lots
    pub max_volume: Decimal,
    // Candles emitted when a series is (re)seeded
    pub history_len: usize,
    // Sliding window capacity per instrument
    pub series_capacity: usize,
    // Price tick cadence
    pub price_tick_ms: u64,
    // Valuation pass cadence
    pub valuation_interval_ms: u64,
    // Spread jitter as a fraction of base spread (0.1 = ±10%)
    pub spread_jitter: Decimal,
    // Fixed seed for reproducible runs. None draws from OS entropy
    pub seed: Option<u64>,
    // Instrument shown on the chart at startup
    pub default_symbol: Symbol,
    // Chart timeframe at startup
    pub default_timeframe: Timeframe,
    pub settlement: SettlementConvention,
    // Maximum number of events to retain in memory
    pub max_events: usize,
    pub instruments: Vec<Instrument>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            starting_balance: dec!(10000),
            max_volume: dec!(100),
            history_len: 500,
            series_capacity: 500,
            price_tick_ms: 2_000,
            valuation_interval_ms: 1_000,
            spread_jitter: dec!(0.1),
            seed: None,
            default_symbol: Symbol::from("XAUUSD"),
            default_timeframe: Timeframe::M15,
            settlement: SettlementConvention::BidAsk,
            max_events: 10_000,
            instruments: InstrumentTable::forex_majors().iter().cloned().collect(),
        }
    }
}

impl SimConfig {
    // Reproducible preset: fixed seed, everything else default
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.starting_balance < Decimal::ZERO {
            return Err(ConfigError::InvalidAccount {
                reason: "starting balance must be non-negative".to_string(),
            });
        }
        if self.max_volume <= Decimal::ZERO {
            return Err(ConfigError::InvalidAccount {
                reason: "max volume must be positive".to_string(),
            });
        }

        // history is emitted into the window, so it has to fit
        if self.series_capacity == 0 {
            return Err(ConfigError::InvalidSeries {
                reason: "series capacity must be positive".to_string(),
            });
        }
        if self.history_len == 0 || self.history_len > self.series_capacity {
            return Err(ConfigError::InvalidSeries {
                reason: format!(
                    "history length {} must be in 1..={}",
                    self.history_len, self.series_capacity
                ),
            });
        }

        if self.price_tick_ms == 0 || self.valuation_interval_ms == 0 {
            return Err(ConfigError::InvalidSchedule {
                reason: "tick intervals must be positive".to_string(),
            });
        }

        if self.spread_jitter < Decimal::ZERO || self.spread_jitter > Decimal::ONE {
            return Err(ConfigError::InvalidSpread {
                reason: "spread jitter must be between 0 and 1".to_string(),
            });
        }

        let table = self.instrument_table()?;
        if !table.contains(&self.default_symbol) {
            return Err(ConfigError::invalid_instrument(format!(
                "default symbol {} is not in the instrument table",
                self.default_symbol
            )));
        }

        Ok(())
    }

    pub fn instrument_table(&self) -> Result<InstrumentTable, ConfigError> {
        InstrumentTable::new(self.instruments.clone())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid account settings: {reason}")]
    InvalidAccount { reason: String },

    #[error("invalid series settings: {reason}")]
    InvalidSeries { reason: String },

    #[error("invalid schedule: {reason}")]
    InvalidSchedule { reason: String },

    #[error("invalid spread settings: {reason}")]
    InvalidSpread { reason: String },

    #[error("invalid instrument: {reason}")]
    InvalidInstrument { reason: String },

    #[error("config parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid_instrument(reason: impl Into<String>) -> Self {
        Self::InvalidInstrument {
            reason: reason.into(),
        }
    }
}
