// 4.0: open positions and everything computed from one position alone.
// pnl, margin, trigger checks, order validation. no state lives here, see ledger.rs.

use crate::config::SettlementConvention;
use crate::instrument::Instrument;
use crate::quote_book::Quote;
use crate::types::{Leverage, Money, PositionId, Price, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: Symbol,
    pub side: Side,
    /// Lots, always positive
    pub volume: Decimal,
    pub entry_price: Price,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
    pub leverage: Leverage,
    pub opened_at: Timestamp,
}

impl Position {
    // 4.1: paper gains/losses at the price this position would close at right now
    pub fn unrealized_pnl(&self, quote: &Quote, pip_value: Decimal) -> Money {
        calculate_unrealized_pnl(self, quote, pip_value)
    }

    /// Capital tied up: entry * volume * lot_size / leverage. Saturates instead of
    /// overflowing.
    pub fn margin(&self, lot_size: Decimal) -> Money {
        let notional = self
            .entry_price
            .value()
            .saturating_mul(self.volume)
            .saturating_mul(lot_size);
        Money::new(notional / self.leverage.as_decimal())
    }

    pub fn check_triggers(&self, quote: &Quote) -> TriggerOutcome {
        check_triggers(self, quote)
    }
}

/// What the trader asked for. Entry price is never part of the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub side: Side,
    pub volume: Decimal,
    pub leverage: u32,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
}

impl OrderIntent {
    pub fn market(symbol: impl Into<Symbol>, side: Side, volume: Decimal, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            volume,
            leverage,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn with_stop_loss(mut self, price: Price) -> Self {
        self.stop_loss = Some(price);
        self
    }

    pub fn with_take_profit(mut self, price: Price) -> Self {
        self.take_profit = Some(price);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Manual,
    StopLoss,
    TakeProfit,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Manual => f.write_str("manual"),
            CloseReason::StopLoss => f.write_str("stop loss"),
            CloseReason::TakeProfit => f.write_str("take profit"),
        }
    }
}

/// Result of comparing a position's triggers against the current quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    None,
    StopLossHit,
    TakeProfitHit,
}

impl TriggerOutcome {
    pub fn close_reason(&self) -> Option<CloseReason> {
        match self {
            TriggerOutcome::None => None,
            TriggerOutcome::StopLossHit => Some(CloseReason::StopLoss),
            TriggerOutcome::TakeProfitHit => Some(CloseReason::TakeProfit),
        }
    }
}

/// Per-field edit of a trigger: leave as is, replace, or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEdit {
    #[default]
    Keep,
    Set(Price),
    Clear,
}

impl TriggerEdit {
    pub fn apply(&self, current: Option<Price>) -> Option<Price> {
        match self {
            TriggerEdit::Keep => current,
            TriggerEdit::Set(price) => Some(*price),
            TriggerEdit::Clear => None,
        }
    }
}

/// One broken constraint of an order or trigger edit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderViolation {
    #[error("volume must be positive, got {0}")]
    NonPositiveVolume(Decimal),

    #[error("volume {volume} exceeds the maximum of {max} lots")]
    VolumeTooLarge { volume: Decimal, max: Decimal },

    #[error("leverage must be at least 1, got {0}")]
    LeverageBelowOne(u32),

    #[error("stop loss {stop_loss} is on the wrong side of entry {entry} for a {side}")]
    StopLossWrongSide {
        side: Side,
        stop_loss: Price,
        entry: Price,
    },

    #[error("take profit {take_profit} is on the wrong side of entry {entry} for a {side}")]
    TakeProfitWrongSide {
        side: Side,
        take_profit: Price,
        entry: Price,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("invalid order: {}", join_violations(.violations))]
    InvalidOrder { violations: Vec<OrderViolation> },
}

fn join_violations(violations: &[OrderViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// 4.2: size checks. every violation is collected, not just the first.
pub fn validate_order(volume: Decimal, leverage: u32, max_volume: Decimal) -> Vec<OrderViolation> {
    let mut violations = Vec::new();
    if volume <= Decimal::ZERO {
        violations.push(OrderViolation::NonPositiveVolume(volume));
    } else if volume > max_volume {
        violations.push(OrderViolation::VolumeTooLarge {
            volume,
            max: max_volume,
        });
    }
    if leverage < 1 {
        violations.push(OrderViolation::LeverageBelowOne(leverage));
    }
    violations
}

// 4.3: long needs sl < entry < tp, short needs tp < entry < sl. unset bounds are skipped.
pub fn validate_triggers(
    side: Side,
    entry: Price,
    stop_loss: Option<Price>,
    take_profit: Option<Price>,
) -> Vec<OrderViolation> {
    let mut violations = Vec::new();
    if let Some(sl) = stop_loss {
        let ok = match side {
            Side::Long => sl < entry,
            Side::Short => sl > entry,
        };
        if !ok {
            violations.push(OrderViolation::StopLossWrongSide {
                side,
                stop_loss: sl,
                entry,
            });
        }
    }
    if let Some(tp) = take_profit {
        let ok = match side {
            Side::Long => tp > entry,
            Side::Short => tp < entry,
        };
        if !ok {
            violations.push(OrderViolation::TakeProfitWrongSide {
                side,
                take_profit: tp,
                entry,
            });
        }
    }
    violations
}

/// Long buys at the ask, short sells at the bid
pub fn entry_price(side: Side, quote: &Quote) -> Price {
    match side {
        Side::Long => quote.ask,
        Side::Short => quote.bid,
    }
}

fn book_exit(side: Side, quote: &Quote) -> Price {
    match side {
        Side::Long => quote.bid,
        Side::Short => quote.ask,
    }
}

/// Price a position settles at. Under bid/ask a long exits at the bid and a short at
/// the ask; under mid both exit at the mid price, rounded to the instrument's digits.
pub fn exit_price(
    instrument: &Instrument,
    side: Side,
    quote: &Quote,
    convention: SettlementConvention,
) -> Price {
    match convention {
        SettlementConvention::BidAsk => book_exit(side, quote),
        SettlementConvention::Mid => instrument.to_price(quote.mid()),
    }
}

// 4.4: (exit - entry) * volume * pip_value, sign flipped for shorts.
// saturates at the decimal bounds rather than panicking.
pub fn pnl_at(position: &Position, exit: Price, pip_value: Decimal) -> Money {
    let delta = (exit.value() - position.entry_price.value()) * position.side.sign();
    Money::new(delta.saturating_mul(position.volume).saturating_mul(pip_value))
}

pub fn calculate_unrealized_pnl(position: &Position, quote: &Quote, pip_value: Decimal) -> Money {
    pnl_at(position, book_exit(position.side, quote), pip_value)
}

// 4.5: a long is judged against the bid, a short against the ask.
// when both triggers are crossed on the same tick the stop loss wins.
pub fn check_triggers(position: &Position, quote: &Quote) -> TriggerOutcome {
    let (sl_hit, tp_hit) = match position.side {
        Side::Long => (
            position.stop_loss.is_some_and(|sl| quote.bid <= sl),
            position.take_profit.is_some_and(|tp| quote.bid >= tp),
        ),
        Side::Short => (
            position.stop_loss.is_some_and(|sl| quote.ask >= sl),
            position.take_profit.is_some_and(|tp| quote.ask <= tp),
        ),
    };
    if sl_hit {
        TriggerOutcome::StopLossHit
    } else if tp_hit {
        TriggerOutcome::TakeProfitHit
    } else {
        TriggerOutcome::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    fn quote(bid: Decimal, ask: Decimal) -> Quote {
        Quote {
            symbol: Symbol::from("XAUUSD"),
            bid: price(bid),
            ask: price(ask),
            timestamp: Timestamp::from_millis(0),
        }
    }

    fn position(side: Side, entry: Decimal) -> Position {
        Position {
            id: PositionId(1),
            symbol: Symbol::from("XAUUSD"),
            side,
            volume: dec!(1),
            entry_price: price(entry),
            stop_loss: None,
            take_profit: None,
            leverage: Leverage::new(100).unwrap(),
            opened_at: Timestamp::from_millis(0),
        }
    }

    #[test]
    fn long_pnl_follows_bid() {
        let pos = position(Side::Long, dec!(2650.00));
        assert_eq!(
            pos.unrealized_pnl(&quote(dec!(2655), dec!(2655.3)), dec!(1)).value(),
            dec!(5)
        );
        assert_eq!(
            pos.unrealized_pnl(&quote(dec!(2640), dec!(2640.3)), dec!(1)).value(),
            dec!(-10)
        );
    }

    #[test]
    fn short_pnl_follows_ask() {
        let pos = position(Side::Short, dec!(1.08500));
        let q = quote(dec!(1.08380), dec!(1.08400));
        // 0.001 * 1 lot * 100000
        assert_eq!(pos.unrealized_pnl(&q, dec!(100000)).value(), dec!(100));
    }

    fn gold() -> Instrument {
        crate::instrument::InstrumentTable::forex_majors()
            .get(&Symbol::from("XAUUSD"))
            .cloned()
            .unwrap()
    }

    #[test]
    fn mid_settlement_uses_mid_for_both_sides() {
        let gold = gold();
        let q = quote(dec!(100), dec!(102));
        assert_eq!(exit_price(&gold, Side::Long, &q, SettlementConvention::Mid).value(), dec!(101));
        assert_eq!(exit_price(&gold, Side::Short, &q, SettlementConvention::Mid).value(), dec!(101));
        assert_eq!(exit_price(&gold, Side::Short, &q, SettlementConvention::BidAsk).value(), dec!(102));
    }

    #[test]
    fn mid_settlement_rounds_to_instrument_digits() {
        let gold = gold();
        // mid 2650.305 has one digit more than gold quotes carry
        let q = quote(dec!(2650.15), dec!(2650.46));
        let exit = exit_price(&gold, Side::Long, &q, SettlementConvention::Mid);
        assert_eq!(exit.value(), dec!(2650.31));
        assert_eq!(exit.value(), gold.round(exit.value()));
    }

    #[test]
    fn huge_volume_saturates_instead_of_panicking() {
        let mut pos = position(Side::Long, dec!(1.08500));
        pos.volume = Decimal::from_i128_with_scale(10_i128.pow(24), 0);
        let pnl = pos.unrealized_pnl(&quote(dec!(2.5), dec!(2.6)), dec!(100000));
        assert_eq!(pnl.value(), Decimal::MAX);
        assert_eq!(pos.margin(dec!(100000)).value(), Decimal::MAX / dec!(100));
    }

    #[test]
    fn margin_uses_lot_size_and_leverage() {
        let pos = position(Side::Long, dec!(2650.00));
        // 2650 * 1 * 100 / 100
        assert_eq!(pos.margin(dec!(100)).value(), dec!(2650));
    }

    #[test]
    fn stop_loss_wins_when_both_fire() {
        let mut pos = position(Side::Long, dec!(2650));
        pos.stop_loss = Some(price(dec!(2640)));
        pos.take_profit = Some(price(dec!(2660)));
        assert_eq!(pos.check_triggers(&quote(dec!(2635), dec!(2635.3))), TriggerOutcome::StopLossHit);
        assert_eq!(pos.check_triggers(&quote(dec!(2660), dec!(2660.3))), TriggerOutcome::TakeProfitHit);
        assert_eq!(pos.check_triggers(&quote(dec!(2650), dec!(2650.3))), TriggerOutcome::None);

        // inverted bounds can only come from a bad edit, but precedence still holds
        pos.stop_loss = Some(price(dec!(2670)));
        assert_eq!(pos.check_triggers(&quote(dec!(2665), dec!(2665.3))), TriggerOutcome::StopLossHit);
    }

    #[test]
    fn short_triggers_use_ask() {
        let mut pos = position(Side::Short, dec!(2650));
        pos.stop_loss = Some(price(dec!(2660)));
        pos.take_profit = Some(price(dec!(2640)));
        // bid below tp but ask is not
        assert_eq!(pos.check_triggers(&quote(dec!(2639.8), dec!(2640.1))), TriggerOutcome::None);
        assert_eq!(pos.check_triggers(&quote(dec!(2639.7), dec!(2640.0))), TriggerOutcome::TakeProfitHit);
        assert_eq!(pos.check_triggers(&quote(dec!(2659.8), dec!(2660.1))), TriggerOutcome::StopLossHit);
    }

    #[test]
    fn validation_collects_every_violation() {
        let v = validate_order(dec!(0), 0, dec!(100));
        assert_eq!(v.len(), 2);
        assert_eq!(
            validate_order(dec!(100.01), 100, dec!(100)),
            vec![OrderViolation::VolumeTooLarge { volume: dec!(100.01), max: dec!(100) }]
        );
        assert!(validate_order(dec!(100), 100, dec!(100)).is_empty());

        let entry = price(dec!(2650));
        let v = validate_triggers(Side::Long, entry, Some(price(dec!(2660))), Some(price(dec!(2640))));
        assert_eq!(v.len(), 2);
        assert!(validate_triggers(Side::Short, entry, Some(price(dec!(2660))), Some(price(dec!(2640)))).is_empty());

        let err = OrderError::InvalidOrder { violations: validate_order(dec!(-1), 1, dec!(100)) };
        assert_eq!(err.to_string(), "invalid order: volume must be positive, got -1");
    }

    #[test]
    fn trigger_edit_apply() {
        let current = Some(price(dec!(10)));
        assert_eq!(TriggerEdit::Keep.apply(current), current);
        assert_eq!(TriggerEdit::Clear.apply(current), None);
        assert_eq!(TriggerEdit::Set(price(dec!(11))).apply(None), Some(price(dec!(11))));
    }
}
