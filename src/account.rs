//! Account view.
//!
//! Everything here is derived from the ledger balance plus a per-position valuation.
//! Nothing is stored, so two snapshots taken without a mutation in between are equal.

use crate::types::{Money, PositionId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// One open position valued at the current quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionValuation {
    pub id: PositionId,
    pub unrealized_pnl: Money,
    pub margin: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: Money,
    pub equity: Money,
    pub unrealized_pnl: Money,
    pub margin: Money,
    pub free_margin: Money,
    /// equity / margin * 100. None with nothing open.
    pub margin_level: Option<Decimal>,
}

pub fn calculate_account_snapshot<'a>(
    balance: Money,
    valuations: impl IntoIterator<Item = &'a PositionValuation>,
) -> AccountSnapshot {
    let mut unrealized_pnl = Money::zero();
    let mut margin = Money::zero();
    for valuation in valuations {
        unrealized_pnl = unrealized_pnl.add(valuation.unrealized_pnl);
        margin = margin.add(valuation.margin);
    }

    let equity = balance.add(unrealized_pnl);
    let free_margin = equity.sub(margin);
    let margin_level = if margin.value().is_zero() {
        None
    } else {
        Some(equity.value() / margin.value() * dec!(100))
    };

    AccountSnapshot {
        balance,
        equity,
        unrealized_pnl,
        margin,
        free_margin,
        margin_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valuation(id: u64, pnl: Decimal, margin: Decimal) -> PositionValuation {
        PositionValuation {
            id: PositionId(id),
            unrealized_pnl: Money::new(pnl),
            margin: Money::new(margin),
        }
    }

    #[test]
    fn flat_account() {
        let snap = calculate_account_snapshot(Money::new(dec!(10000)), &[]);
        assert_eq!(snap.equity.value(), dec!(10000));
        assert_eq!(snap.free_margin.value(), dec!(10000));
        assert_eq!(snap.margin.value(), dec!(0));
        assert_eq!(snap.margin_level, None);
    }

    #[test]
    fn equity_and_free_margin() {
        let vals = [
            valuation(1, dec!(5), dec!(2650)),
            valuation(2, dec!(-12.5), dec!(1085)),
        ];
        let snap = calculate_account_snapshot(Money::new(dec!(10000)), &vals);
        assert_eq!(snap.unrealized_pnl.value(), dec!(-7.5));
        assert_eq!(snap.equity.value(), dec!(9992.5));
        assert_eq!(snap.margin.value(), dec!(3735));
        assert_eq!(snap.free_margin.value(), dec!(6257.5));
        assert_eq!(snap.margin_level.unwrap().round_dp(2), dec!(267.54));
    }

    #[test]
    fn snapshot_is_stable() {
        let vals = vec![valuation(1, dec!(3.21), dec!(100))];
        let a = calculate_account_snapshot(Money::new(dec!(500)), &vals);
        let b = calculate_account_snapshot(Money::new(dec!(500)), &vals);
        assert_eq!(a, b);
    }
}
