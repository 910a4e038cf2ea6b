//! Instrument reference data.
//!
//! Every per-symbol constant (display precision, volatility, spread, pip value,
//! lot size, seed price) lives in one table fixed at startup, so no other module
//! ever branches on a symbol string.

use crate::config::ConfigError;
use crate::types::{Price, Symbol};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static instrument configuration (immutable after startup)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    /// Human-readable name (e.g., "Euro vs Dollar")
    pub name: String,
    /// Digits after the decimal point for display and storage
    pub digits: u32,
    /// Amplitude of one random-walk step
    pub volatility: Decimal,
    /// Spread before per-tick jitter
    pub base_spread: Decimal,
    /// Account currency per price point per lot
    pub pip_value: Decimal,
    /// Contract units per lot, used for margin
    pub lot_size: Decimal,
    /// Seed price for a fresh series
    pub base_price: Decimal,
}

impl Instrument {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: &str,
        name: &str,
        digits: u32,
        volatility: Decimal,
        base_spread: Decimal,
        pip_value: Decimal,
        lot_size: Decimal,
        base_price: Decimal,
    ) -> Self {
        Self {
            symbol: Symbol::from(symbol),
            name: name.to_string(),
            digits,
            volatility,
            base_spread,
            pip_value,
            lot_size,
            base_price,
        }
    }

    /// Smallest representable price increment (10^-digits)
    pub fn tick_size(&self) -> Decimal {
        Decimal::new(1, self.digits)
    }

    /// Round to display precision. Rounded values are authoritative.
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.digits, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Round and floor at one tick so the result is always a valid price
    pub fn to_price(&self, value: Decimal) -> Price {
        Price::new_unchecked(self.round(value).max(self.tick_size()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.as_str().is_empty() {
            return Err(ConfigError::invalid_instrument("empty symbol"));
        }
        if self.digits > 10 {
            return Err(ConfigError::invalid_instrument(
                format!("{}: digits {} out of range", self.symbol, self.digits),
            ));
        }
        if self.volatility < Decimal::ZERO {
            return Err(ConfigError::invalid_instrument(
                format!("{}: volatility must be non-negative", self.symbol),
            ));
        }
        if self.base_spread < Decimal::ZERO {
            return Err(ConfigError::invalid_instrument(
                format!("{}: spread must be non-negative", self.symbol),
            ));
        }
        if self.pip_value <= Decimal::ZERO || self.lot_size <= Decimal::ZERO {
            return Err(ConfigError::invalid_instrument(
                format!("{}: pip value and lot size must be positive", self.symbol),
            ));
        }
        if self.base_price <= Decimal::ZERO {
            return Err(ConfigError::invalid_instrument(
                format!("{}: base price must be positive", self.symbol),
            ));
        }
        Ok(())
    }
}

/// The fixed set of supported instruments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentTable {
    instruments: BTreeMap<Symbol, Instrument>,
}

impl InstrumentTable {
    pub fn new(instruments: Vec<Instrument>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for instrument in instruments {
            instrument.validate()?;
            let symbol = instrument.symbol.clone();
            if map.insert(symbol.clone(), instrument).is_some() {
                return Err(ConfigError::invalid_instrument(
                    format!("duplicate instrument {symbol}"),
                ));
            }
        }
        if map.is_empty() {
            return Err(ConfigError::invalid_instrument("instrument table is empty"));
        }
        Ok(Self { instruments: map })
    }

    /// Gold plus the seven majors of the market watch
    pub fn forex_majors() -> Self {
        let fx = |symbol: &str, name: &str, base_price: Decimal| {
            Instrument::new(
                symbol,
                name,
                5,
                dec!(0.0015),
                dec!(0.00015),
                dec!(100000),
                dec!(100000),
                base_price,
            )
        };
        let instruments = vec![
            Instrument::new(
                "XAUUSD",
                "Gold",
                2,
                dec!(2),
                dec!(0.30),
                dec!(1),
                dec!(100),
                dec!(2650.50),
            ),
            fx("EURUSD", "Euro vs Dollar", dec!(1.08500)),
            fx("GBPUSD", "Pound vs Dollar", dec!(1.26500)),
            Instrument::new(
                "USDJPY",
                "Dollar vs Yen",
                3,
                dec!(0.15),
                dec!(0.015),
                dec!(1000),
                dec!(100000),
                dec!(149.250),
            ),
            fx("AUDUSD", "Aussie vs Dollar", dec!(0.63200)),
            fx("USDCAD", "Dollar vs Canadian", dec!(1.38500)),
            fx("NZDUSD", "Kiwi vs Dollar", dec!(0.57800)),
            fx("USDCHF", "Dollar vs Franc", dec!(0.88900)),
        ];
        let instruments = instruments
            .into_iter()
            .map(|i| (i.symbol.clone(), i))
            .collect();
        Self { instruments }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.instruments.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.instruments.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

impl Default for InstrumentTable {
    fn default() -> Self {
        Self::forex_majors()
    }
}
