//! Engine configuration options.

use crate::config::{SettlementConvention, SimConfig};
use crate::types::Money;
use rust_decimal::Decimal;

/// The part of [`SimConfig`] the engine itself reads after startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Balance of a fresh demo account.
    pub starting_balance: Money,
    /// Largest accepted order, in lots.
    pub max_volume: Decimal,
    /// Candles emitted when a series is seeded.
    pub history_len: usize,
    /// Candles kept per instrument.
    pub series_capacity: usize,
    /// Spread jitter as a fraction of the base spread.
    pub spread_jitter: Decimal,
    /// Which side of the book closes settle at.
    pub settlement: SettlementConvention,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Root RNG seed. None draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&SimConfig::default())
    }
}

impl From<&SimConfig> for EngineConfig {
    fn from(config: &SimConfig) -> Self {
        Self {
            starting_balance: Money::new(config.starting_balance),
            max_volume: config.max_volume,
            history_len: config.history_len,
            series_capacity: config.series_capacity,
            spread_jitter: config.spread_jitter,
            settlement: config.settlement,
            max_events: config.max_events,
            seed: config.seed,
        }
    }
}
