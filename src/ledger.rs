// 5.0: the only writer of positions and of the account balance.
// open / edit / close. settlement moves realized pnl into the balance.

use crate::position::{
    entry_price, pnl_at, validate_order, validate_triggers, CloseReason, OrderError, OrderIntent,
    Position, TriggerEdit,
};
use crate::quote_book::Quote;
use crate::types::{Leverage, Money, PositionId, Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

/// Largest order size accepted when none is configured, in lots
pub const DEFAULT_MAX_VOLUME: Decimal = dec!(100);

/// What a close hands back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_price: Price,
    pub realized_pnl: Money,
    pub reason: CloseReason,
    pub closed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("position {0} not found")]
    NotFound(PositionId),

    #[error(transparent)]
    Order(#[from] OrderError),
}

#[derive(Debug, Clone)]
pub struct PositionLedger {
    positions: BTreeMap<PositionId, Position>,
    next_id: u64,
    balance: Money,
    realized_pnl: Money,
    max_volume: Decimal,
}

impl PositionLedger {
    pub fn new(starting_balance: Money) -> Self {
        Self {
            positions: BTreeMap::new(),
            next_id: 1,
            balance: starting_balance,
            realized_pnl: Money::zero(),
            max_volume: DEFAULT_MAX_VOLUME,
        }
    }

    pub fn with_max_volume(mut self, max_volume: Decimal) -> Self {
        self.max_volume = max_volume;
        self
    }

    /// Validate the intent and book it at the quote's executable side. The id is only
    /// consumed when the position is actually stored.
    pub fn open(
        &mut self,
        intent: &OrderIntent,
        quote: &Quote,
        now: Timestamp,
    ) -> Result<Position, LedgerError> {
        debug_assert_eq!(intent.symbol, quote.symbol);

        let entry = entry_price(intent.side, quote);
        let mut violations = validate_order(intent.volume, intent.leverage, self.max_volume);
        violations.extend(validate_triggers(
            intent.side,
            entry,
            intent.stop_loss,
            intent.take_profit,
        ));
        let leverage = match Leverage::new(intent.leverage) {
            Some(leverage) if violations.is_empty() => leverage,
            _ => return Err(OrderError::InvalidOrder { violations }.into()),
        };

        let position = Position {
            id: PositionId(self.next_id),
            symbol: intent.symbol.clone(),
            side: intent.side,
            volume: intent.volume,
            entry_price: entry,
            stop_loss: intent.stop_loss,
            take_profit: intent.take_profit,
            leverage,
            opened_at: now,
        };
        self.next_id += 1;
        self.positions.insert(position.id, position.clone());
        Ok(position)
    }

    /// Replace, keep or clear each trigger. Checked against the entry price; on any
    /// violation the position is left as it was.
    pub fn edit_triggers(
        &mut self,
        id: PositionId,
        stop_loss: TriggerEdit,
        take_profit: TriggerEdit,
    ) -> Result<Position, LedgerError> {
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(LedgerError::NotFound(id))?;

        let new_sl = stop_loss.apply(position.stop_loss);
        let new_tp = take_profit.apply(position.take_profit);
        let violations = validate_triggers(position.side, position.entry_price, new_sl, new_tp);
        if !violations.is_empty() {
            return Err(OrderError::InvalidOrder { violations }.into());
        }

        position.stop_loss = new_sl;
        position.take_profit = new_tp;
        Ok(position.clone())
    }

    /// Remove the position and settle its pnl at `exit` into the balance
    pub fn close(
        &mut self,
        id: PositionId,
        exit: Price,
        pip_value: Decimal,
        reason: CloseReason,
        now: Timestamp,
    ) -> Result<ClosedPosition, LedgerError> {
        let position = self.positions.remove(&id).ok_or(LedgerError::NotFound(id))?;
        let realized_pnl = pnl_at(&position, exit, pip_value);
        self.balance = self.balance.add(realized_pnl);
        self.realized_pnl = self.realized_pnl.add(realized_pnl);
        Ok(ClosedPosition {
            position,
            exit_price: exit,
            realized_pnl,
            reason,
            closed_at: now,
        })
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    /// Open positions in id order
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn realized_pnl(&self) -> Money {
        self.realized_pnl
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
