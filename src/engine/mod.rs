// 8.0: core simulation engine. owns instruments, candle series, quotes, positions and
// the event log. deterministic given a seed and a clock, no I/O. the async driver in
// scheduler.rs only decides when the step functions run.

mod config;
mod core;
mod market;
mod orders;
mod results;
mod valuation;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{EngineError, MarketTick, ValuationReport};
