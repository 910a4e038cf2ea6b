// 8.3 engine/orders.rs: inbound trader intents. open, edit triggers, close.
// quote read and ledger write happen under the same &mut self, so an entry price can
// never be stale by the time the position is stored.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, PositionClosedEvent, PositionOpenedEvent, TriggersEditedEvent};
use crate::ledger::ClosedPosition;
use crate::position::{exit_price, CloseReason, OrderIntent, Position, TriggerEdit};
use crate::types::PositionId;
use tracing::{info, warn};

impl Engine {
    pub fn open_position(&mut self, intent: OrderIntent) -> Result<Position, EngineError> {
        let quote = self.quote(&intent.symbol)?;

        let position = match self.ledger.open(&intent, &quote, self.current_time) {
            Ok(position) => position,
            Err(err) => {
                let err = EngineError::from(err);
                warn!(symbol = %intent.symbol, side = %intent.side, error = %err, "order rejected");
                return Err(err);
            }
        };

        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            position_id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            volume: position.volume,
            entry_price: position.entry_price,
            leverage: position.leverage.value(),
        }));
        info!(
            id = %position.id,
            symbol = %position.symbol,
            side = %position.side,
            volume = %position.volume,
            entry = %position.entry_price,
            leverage = %position.leverage,
            "position opened"
        );
        Ok(position)
    }

    pub fn edit_triggers(
        &mut self,
        id: PositionId,
        stop_loss: TriggerEdit,
        take_profit: TriggerEdit,
    ) -> Result<Position, EngineError> {
        let position = match self.ledger.edit_triggers(id, stop_loss, take_profit) {
            Ok(position) => position,
            Err(err) => {
                let err = EngineError::from(err);
                warn!(%id, error = %err, "trigger edit rejected");
                return Err(err);
            }
        };
        self.emit_event(EventPayload::TriggersEdited(TriggersEditedEvent {
            position_id: id,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
        }));
        info!(%id, stop_loss = ?position.stop_loss, take_profit = ?position.take_profit, "triggers edited");
        Ok(position)
    }

    /// Manual close at the current quote
    pub fn close_position(&mut self, id: PositionId) -> Result<ClosedPosition, EngineError> {
        let result = self.settle(id, CloseReason::Manual);
        if let Err(err) = &result {
            warn!(%id, error = %err, "close rejected");
        }
        result
    }

    // shared by manual closes and trigger closes
    pub(super) fn settle(
        &mut self,
        id: PositionId,
        reason: CloseReason,
    ) -> Result<ClosedPosition, EngineError> {
        let position = self.ledger.get(id).ok_or(EngineError::PositionNotFound(id))?;
        let symbol = position.symbol.clone();
        let side = position.side;
        let instrument = self.instrument(&symbol)?;
        let pip_value = instrument.pip_value;
        let quote = self.quote(&symbol)?;
        let exit = exit_price(instrument, side, &quote, self.config.settlement);

        let closed = self
            .ledger
            .close(id, exit, pip_value, reason, self.current_time)?;
        let new_balance = self.ledger.balance();

        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            position_id: id,
            symbol: symbol.clone(),
            exit_price: exit,
            realized_pnl: closed.realized_pnl,
            new_balance,
            reason,
        }));
        info!(
            %id,
            %symbol,
            %reason,
            exit = %exit,
            pnl = %closed.realized_pnl,
            balance = %new_balance,
            "position closed"
        );
        Ok(closed)
    }

    /// Open positions in id order
    pub fn open_positions(&self) -> Vec<Position> {
        self.ledger.positions().cloned().collect()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.ledger.get(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SimConfig;
    use crate::engine::{Engine, EngineError};
    use crate::events::{EventId, EventPayload};
    use crate::position::{CloseReason, OrderIntent, TriggerEdit};
    use crate::types::{PositionId, Price, Side, Symbol, Timestamp};
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        let config = SimConfig {
            history_len: 10,
            series_capacity: 20,
            ..SimConfig::seeded(5)
        };
        Engine::starting_at(&config, Timestamp::from_secs(1_700_000_000)).unwrap()
    }

    #[test]
    fn open_uses_live_quote() {
        let mut engine = engine();
        let gold = Symbol::from("XAUUSD");
        let quote = engine.quote(&gold).unwrap();
        let long = engine
            .open_position(OrderIntent::market("XAUUSD", Side::Long, dec!(0.1), 100))
            .unwrap();
        let short = engine
            .open_position(OrderIntent::market("XAUUSD", Side::Short, dec!(0.1), 100))
            .unwrap();
        assert_eq!(long.entry_price, quote.ask);
        assert_eq!(short.entry_price, quote.bid);
        assert_eq!(engine.open_positions().len(), 2);
    }

    #[test]
    fn open_on_unknown_symbol() {
        let mut engine = engine();
        let result = engine.open_position(OrderIntent::market("BTCUSD", Side::Long, dec!(1), 10));
        assert_eq!(result, Err(EngineError::UnknownInstrument(Symbol::from("BTCUSD"))));
        assert!(engine.open_positions().is_empty());
    }

    #[test]
    fn manual_close_round_trip_costs_the_spread() {
        let mut engine = engine();
        let gold = Symbol::from("XAUUSD");
        let quote = engine.quote(&gold).unwrap();
        let pos = engine
            .open_position(OrderIntent::market("XAUUSD", Side::Long, dec!(1), 100))
            .unwrap();
        let closed = engine.close_position(pos.id).unwrap();
        assert_eq!(closed.reason, CloseReason::Manual);
        assert_eq!(closed.realized_pnl.value(), -quote.spread());
        assert_eq!(
            engine.account_snapshot().balance.value(),
            dec!(10000) - quote.spread()
        );
    }

    #[test]
    fn edit_and_close_emit_events() {
        let mut engine = engine();
        let start = engine.last_event_id().unwrap_or(EventId(0));
        let pos = engine
            .open_position(OrderIntent::market("XAUUSD", Side::Long, dec!(1), 100))
            .unwrap();
        let sl = Price::new_unchecked(pos.entry_price.value() - dec!(20));
        engine
            .edit_triggers(pos.id, TriggerEdit::Set(sl), TriggerEdit::Keep)
            .unwrap();
        engine.close_position(pos.id).unwrap();

        let kinds: Vec<&'static str> = engine
            .events_since(start)
            .iter()
            .map(|e| match e.payload {
                EventPayload::PositionOpened(_) => "opened",
                EventPayload::TriggersEdited(_) => "edited",
                EventPayload::PositionClosed(_) => "closed",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["opened", "edited", "closed"]);
    }

    #[test]
    fn unknown_position() {
        let mut engine = engine();
        assert_eq!(
            engine.close_position(PositionId(42)),
            Err(EngineError::PositionNotFound(PositionId(42)))
        );
        assert!(matches!(
            engine.edit_triggers(PositionId(42), TriggerEdit::Clear, TriggerEdit::Clear),
            Err(EngineError::PositionNotFound(_))
        ));
    }
}
