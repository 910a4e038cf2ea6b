// 1.0: all the primitives live here. symbols, ids, prices, money, leverage, time.
// each is a newtype so the compiler catches type mixups.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

// instrument symbol as shown in the market watch (e.g. "XAUUSD")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for Symbol {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// Long = buy at ask, profit when bid rises. Short = sell at bid, profit when ask falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("buy"),
            Side::Short => f.write_str("sell"),
        }
    }
}

// 1.1: price in quote currency. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: account currency amount. balance, margin, pnl all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn add(&self, other: Money) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Money) -> Self {
        Self(self.0 - other.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Money {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc.add(m))
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc.add(*m))
    }
}

// 1.3: leverage multiplier, whole numbers only (1:100, 1:500 ...). must be >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leverage(u32);

impl Leverage {
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        if value >= 1 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1:{}", self.0)
    }
}

// 1.4: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs * 1000)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn as_secs(&self) -> i64 {
        self.0.div_euclid(1000)
    }
}

// 1.5: candle duration in seconds. the chart toolbar offers 1/5/15/30/60/240 minutes and D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Timeframe(u32);

impl Timeframe {
    pub const M1: Timeframe = Timeframe(60);
    pub const M5: Timeframe = Timeframe(300);
    pub const M15: Timeframe = Timeframe(900);
    pub const M30: Timeframe = Timeframe(1_800);
    pub const H1: Timeframe = Timeframe(3_600);
    pub const H4: Timeframe = Timeframe(14_400);
    pub const D1: Timeframe = Timeframe(86_400);

    #[must_use]
    pub fn from_secs(secs: u32) -> Option<Self> {
        if secs > 0 {
            Some(Self(secs))
        } else {
            None
        }
    }

    /// Parse a toolbar label: minutes as digits, or `D` for one day.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "D" | "d" => Some(Self::D1),
            minutes => minutes
                .parse::<u32>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .and_then(Self::from_secs),
        }
    }

    pub fn secs(&self) -> i64 {
        self.0 as i64
    }

    // start of the bucket containing `at`
    pub fn floor(&self, at: Timestamp) -> i64 {
        let secs = at.as_secs();
        secs - secs.rem_euclid(self.secs())
    }
}

impl TryFrom<u32> for Timeframe {
    type Error = String;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        Self::from_secs(secs).ok_or_else(|| format!("timeframe must be positive, got {secs}"))
    }
}

impl From<Timeframe> for u32 {
    fn from(timeframe: Timeframe) -> Self {
        timeframe.0
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::M15
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 86_400 == 0 {
            write!(f, "{}D", self.0 / 86_400)
        } else {
            write!(f, "{}M", self.0 / 60)
        }
    }
}
