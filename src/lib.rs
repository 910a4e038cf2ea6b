// mocktrade-core: mock trading terminal engine.
// synthetic candles per instrument, a jittered quote book, an in-memory position ledger
// with stop loss / take profit, and the account view derived from them.
// the engine is deterministic given a seed and a clock. only scheduler.rs touches tokio.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Symbol, Side, Price, Money, Leverage, Timestamp, Timeframe
//   1.6  instrument.rs: instrument table, precision and rounding
//   2.x  series.rs: candle series, random-walk step, generator
//   3.x  quote_book.rs: bid/ask per instrument, spread jitter
//   4.x  position.rs: position struct, PnL, trigger checks, order validation
//   5.x  ledger.rs: open / edit / close, balance settlement
//   6.x  account.rs: balance, equity, margin, free margin
//   7.x  events.rs: state transition events, bounded log
//   8.x  engine/: core engine: market ticks, orders, valuation pass
//   9.x  scheduler.rs: async driver for price and valuation ticks
//   10.x config.rs: simulation settings, JSON loading, validation
//   11.x indicator.rs: series arrays for indicators, RSI, SMA crossover

// market data
pub mod instrument;
pub mod quote_book;
pub mod series;
pub mod types;

// trading
pub mod account;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod position;

// integration
pub mod config;
pub mod indicator;
pub mod scheduler;

// re exports for convenience
pub use account::*;
pub use config::*;
pub use engine::*;
pub use events::*;
pub use indicator::*;
pub use instrument::*;
pub use ledger::*;
pub use position::*;
pub use quote_book::*;
pub use scheduler::*;
pub use series::*;
pub use types::*;
