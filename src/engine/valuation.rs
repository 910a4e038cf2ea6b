// 8.4 engine/valuation.rs: the periodic pass over open positions.
// value each at its quote, close anything whose stop loss or take profit was crossed,
// then report the account.

use super::core::Engine;
use super::results::ValuationReport;
use crate::account::{calculate_account_snapshot, AccountSnapshot, PositionValuation};
use crate::position::{exit_price, pnl_at, Position};
use crate::types::{Money, PositionId};
use tracing::{debug, error, warn};

impl Engine {
    fn value_position(&self, position: &Position) -> Option<PositionValuation> {
        let instrument = self.instruments.get(&position.symbol)?;
        let quote = self.quotes.quote(&position.symbol)?;
        let exit = exit_price(instrument, position.side, quote, self.config.settlement);
        Some(PositionValuation {
            id: position.id,
            unrealized_pnl: pnl_at(position, exit, instrument.pip_value),
            margin: position.margin(instrument.lot_size),
        })
    }

    /// Current value of every open position that has a quote
    pub fn position_valuations(&self) -> Vec<PositionValuation> {
        self.ledger
            .positions()
            .filter_map(|p| self.value_position(p))
            .collect()
    }

    pub fn unrealized_pnl(&self, id: PositionId) -> Option<Money> {
        let position = self.ledger.get(id)?;
        self.value_position(position).map(|v| v.unrealized_pnl)
    }

    /// Balance, equity and margin as of now. Reads only.
    pub fn account_snapshot(&self) -> AccountSnapshot {
        calculate_account_snapshot(self.ledger.balance(), &self.position_valuations())
    }

    /// One valuation tick. Triggered positions are settled in id order at the quote that
    /// crossed them.
    pub fn run_valuation_pass(&mut self) -> ValuationReport {
        let mut triggered = Vec::new();
        let mut unpriced = Vec::new();
        for position in self.ledger.positions() {
            let Some(quote) = self.quotes.quote(&position.symbol) else {
                unpriced.push(position.id);
                continue;
            };
            if let Some(reason) = position.check_triggers(quote).close_reason() {
                triggered.push((position.id, reason));
            }
        }
        for id in &unpriced {
            warn!(%id, "position has no quote, skipped");
        }

        let mut closed = Vec::with_capacity(triggered.len());
        for (id, reason) in triggered {
            match self.settle(id, reason) {
                Ok(c) => closed.push(c),
                // checked above under the same borrow, so this is a broken invariant
                Err(err) => error!(%id, %reason, error = %err, "trigger close failed"),
            }
        }

        let valuations = self.position_valuations();
        let account = calculate_account_snapshot(self.ledger.balance(), &valuations);
        debug!(
            open = valuations.len(),
            closed = closed.len(),
            equity = %account.equity,
            "valuation pass"
        );
        ValuationReport {
            timestamp: self.current_time,
            valuations,
            closed,
            unpriced,
            account,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{SettlementConvention, SimConfig};
    use crate::engine::Engine;
    use crate::position::{CloseReason, OrderIntent, TriggerEdit};
    use crate::types::{Price, Side, Symbol, Timestamp};
    use rust_decimal_macros::dec;

    fn engine_with(settlement: SettlementConvention) -> Engine {
        let config = SimConfig {
            history_len: 10,
            series_capacity: 20,
            settlement,
            ..SimConfig::seeded(8)
        };
        Engine::starting_at(&config, Timestamp::from_secs(1_700_000_000)).unwrap()
    }

    #[test]
    fn pass_without_triggers_only_values() {
        let mut engine = engine_with(SettlementConvention::BidAsk);
        engine
            .open_position(OrderIntent::market("EURUSD", Side::Short, dec!(0.1), 500))
            .unwrap();
        let report = engine.run_valuation_pass();
        assert!(report.closed.is_empty());
        assert_eq!(report.valuations.len(), 1);
        assert_eq!(report.account, engine.account_snapshot());
    }

    #[test]
    fn crossed_stop_loss_closes_on_next_pass() {
        let mut engine = engine_with(SettlementConvention::BidAsk);
        let gold = Symbol::from("XAUUSD");
        let pos = engine
            .open_position(OrderIntent::market("XAUUSD", Side::Long, dec!(1), 100))
            .unwrap();
        // entry is the ask, so a stop at the bid is valid and already crossed
        let bid = engine.quote(&gold).unwrap().bid;
        let sl = Price::new_unchecked(bid.value());
        engine
            .edit_triggers(pos.id, TriggerEdit::Set(sl), TriggerEdit::Keep)
            .unwrap();

        let report = engine.run_valuation_pass();
        assert_eq!(report.closed.len(), 1);
        assert_eq!(report.closed[0].reason, CloseReason::StopLoss);
        assert_eq!(report.closed[0].exit_price, bid);
        assert!(engine.open_positions().is_empty());
        assert!(report.valuations.is_empty());

        // nothing left to settle twice
        assert!(engine.run_valuation_pass().closed.is_empty());
    }

    #[test]
    fn mid_settlement_halves_the_spread_cost() {
        let mut engine = engine_with(SettlementConvention::Mid);
        let gold = Symbol::from("XAUUSD");
        let quote = engine.quote(&gold).unwrap();
        let pos = engine
            .open_position(OrderIntent::market("XAUUSD", Side::Long, dec!(1), 100))
            .unwrap();
        let pnl = engine.unrealized_pnl(pos.id).unwrap();
        assert_eq!(pnl.value(), quote.mid() - quote.ask.value());
    }

    #[test]
    fn snapshot_is_stable_between_mutations() {
        let mut engine = engine_with(SettlementConvention::BidAsk);
        engine
            .open_position(OrderIntent::market("GBPUSD", Side::Long, dec!(0.2), 200))
            .unwrap();
        assert_eq!(engine.account_snapshot(), engine.account_snapshot());
    }
}
