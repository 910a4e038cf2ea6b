//! Indicator inputs and the two built-in studies.
//!
//! Indicators see a read-only column view of one candle series and return either a
//! scalar value or a trading signal. Nothing here can reach back into the engine.

use crate::series::Candle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Column view of a candle series, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesArrays {
    pub open: Vec<Decimal>,
    pub high: Vec<Decimal>,
    pub low: Vec<Decimal>,
    pub close: Vec<Decimal>,
    pub volume: Vec<Decimal>,
}

impl SeriesArrays {
    pub fn from_candles<'a>(candles: impl IntoIterator<Item = &'a Candle>) -> Self {
        let mut arrays = Self::default();
        for c in candles {
            arrays.open.push(c.open.value());
            arrays.high.push(c.high.value());
            arrays.low.push(c.low.value());
            arrays.close.push(c.close.value());
            arrays.volume.push(Decimal::from(c.volume));
        }
        arrays
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => f.write_str("BUY"),
            Signal::Sell => f.write_str("SELL"),
            Signal::Hold => f.write_str("HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorOutput {
    Value(Decimal),
    Signal { signal: Signal, strength: Decimal },
}

impl IndicatorOutput {
    /// Signal output with strength checked to lie in [0, 1]
    pub fn signal(signal: Signal, strength: Decimal) -> Result<Self, IndicatorError> {
        if strength < Decimal::ZERO || strength > Decimal::ONE {
            return Err(IndicatorError::StrengthOutOfRange(strength));
        }
        Ok(Self::Signal { signal, strength })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("{name} requires period > 0 (got {period})")]
    InvalidPeriod { name: &'static str, period: usize },

    #[error("{name} needs {required} closes, series has {available}")]
    NotEnoughData {
        name: &'static str,
        required: usize,
        available: usize,
    },

    #[error("signal strength {0} outside [0, 1]")]
    StrengthOutOfRange(Decimal),
}

pub trait Indicator {
    fn name(&self) -> &'static str;

    fn evaluate(&self, data: &SeriesArrays) -> Result<IndicatorOutput, IndicatorError>;
}

fn sma(values: &[Decimal], period: usize) -> Decimal {
    let window = &values[values.len() - period..];
    window.iter().sum::<Decimal>() / Decimal::from(period)
}

/// Relative strength index over the most recent `period` close-to-close changes,
/// simple averages of gains and losses.
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidPeriod {
                name: "RSI",
                period,
            });
        }
        Ok(Self { period })
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &'static str {
        "RSI"
    }

    fn evaluate(&self, data: &SeriesArrays) -> Result<IndicatorOutput, IndicatorError> {
        let closes = &data.close;
        if closes.len() < self.period + 1 {
            return Err(IndicatorError::NotEnoughData {
                name: self.name(),
                required: self.period + 1,
                available: closes.len(),
            });
        }

        let window = &closes[closes.len() - self.period - 1..];
        let (mut gains, mut losses) = (Decimal::ZERO, Decimal::ZERO);
        for pair in window.windows(2) {
            let change = pair[1] - pair[0];
            if change > Decimal::ZERO {
                gains += change;
            } else {
                losses -= change;
            }
        }

        let period = Decimal::from(self.period);
        let (avg_gain, avg_loss) = (gains / period, losses / period);
        // flat window reads neutral, no losses reads fully overbought
        let rsi = if avg_loss.is_zero() {
            if avg_gain.is_zero() {
                dec!(50)
            } else {
                dec!(100)
            }
        } else {
            let rs = avg_gain / avg_loss;
            dec!(100) - dec!(100) / (Decimal::ONE + rs)
        };
        Ok(IndicatorOutput::Value(rsi))
    }
}

/// Fast/slow simple moving average crossover. BUY when fast is above slow, SELL when
/// below, HOLD with zero strength when they are equal.
#[derive(Debug, Clone, Copy)]
pub struct SmaCrossover {
    fast: usize,
    slow: usize,
    strength: Decimal,
}

impl SmaCrossover {
    pub fn new(fast: usize, slow: usize, strength: Decimal) -> Result<Self, IndicatorError> {
        for period in [fast, slow] {
            if period == 0 {
                return Err(IndicatorError::InvalidPeriod {
                    name: "SMA crossover",
                    period,
                });
            }
        }
        // validated once here, reused for every evaluation
        IndicatorOutput::signal(Signal::Hold, strength)?;
        Ok(Self {
            fast,
            slow,
            strength,
        })
    }
}

impl Default for SmaCrossover {
    fn default() -> Self {
        Self {
            fast: 20,
            slow: 50,
            strength: dec!(0.8),
        }
    }
}

impl Indicator for SmaCrossover {
    fn name(&self) -> &'static str {
        "SMA crossover"
    }

    fn evaluate(&self, data: &SeriesArrays) -> Result<IndicatorOutput, IndicatorError> {
        let required = self.fast.max(self.slow);
        if data.close.len() < required {
            return Err(IndicatorError::NotEnoughData {
                name: self.name(),
                required,
                available: data.close.len(),
            });
        }

        let fast = sma(&data.close, self.fast);
        let slow = sma(&data.close, self.slow);
        if fast > slow {
            IndicatorOutput::signal(Signal::Buy, self.strength)
        } else if fast < slow {
            IndicatorOutput::signal(Signal::Sell, self.strength)
        } else {
            IndicatorOutput::signal(Signal::Hold, Decimal::ZERO)
        }
    }
}
