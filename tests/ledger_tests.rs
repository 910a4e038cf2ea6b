//! Ledger and engine scenario tests
//!
//! These tests walk the trader-visible flows end to end: opening at the live
//! quote, valuation at exact prices, trigger closes, rejected intents and the
//! bounded candle window.

use mocktrade_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn gold_quote(bid: Decimal) -> Quote {
    Quote {
        symbol: Symbol::from("XAUUSD"),
        bid: Price::new_unchecked(bid),
        ask: Price::new_unchecked(bid + dec!(0.30)),
        timestamp: Timestamp(0),
    }
}

fn engine(seed: u64) -> Engine {
    let config = SimConfig {
        history_len: 50,
        series_capacity: 500,
        ..SimConfig::seeded(seed)
    };
    Engine::starting_at(&config, Timestamp::from_secs(1_700_000_000)).unwrap()
}

/// Exact PnL and trigger scenarios against hand-built quotes.
mod valuation {
    use super::*;

    fn long_at_2650(ledger: &mut PositionLedger) -> Position {
        // ask = bid + 0.30, so a 2649.70 bid books the long at 2650.00
        ledger
            .open(
                &OrderIntent::market("XAUUSD", Side::Long, dec!(1), 100)
                    .with_stop_loss(Price::new_unchecked(dec!(2640)))
                    .with_take_profit(Price::new_unchecked(dec!(2660))),
                &gold_quote(dec!(2649.70)),
                Timestamp(0),
            )
            .unwrap()
    }

    #[test]
    fn long_pnl_at_exact_prices() {
        let mut ledger = PositionLedger::new(Money::new(dec!(10000)));
        let pos = long_at_2650(&mut ledger);
        assert_eq!(pos.entry_price.value(), dec!(2650.00));

        assert_eq!(pos.unrealized_pnl(&gold_quote(dec!(2655)), dec!(1)).to_string(), "5.00");
        assert_eq!(pos.unrealized_pnl(&gold_quote(dec!(2640)), dec!(1)).to_string(), "-10.00");
    }

    #[test]
    fn gap_through_stop_loss_reports_stop_loss() {
        let mut ledger = PositionLedger::new(Money::new(dec!(10000)));
        let pos = long_at_2650(&mut ledger);
        assert_eq!(
            pos.check_triggers(&gold_quote(dec!(2635))),
            TriggerOutcome::StopLossHit
        );
        assert_eq!(
            pos.check_triggers(&gold_quote(dec!(2661))),
            TriggerOutcome::TakeProfitHit
        );
    }

    #[test]
    fn settlement_at_stop_updates_balance() {
        let mut ledger = PositionLedger::new(Money::new(dec!(10000)));
        let pos = long_at_2650(&mut ledger);
        let q = gold_quote(dec!(2635));
        let gold = InstrumentTable::forex_majors()
            .get(&Symbol::from("XAUUSD"))
            .cloned()
            .unwrap();
        let exit = exit_price(&gold, pos.side, &q, SettlementConvention::BidAsk);
        let closed = ledger
            .close(pos.id, exit, dec!(1), CloseReason::StopLoss, Timestamp(1))
            .unwrap();
        assert_eq!(closed.realized_pnl.value(), dec!(-15));
        assert_eq!(ledger.balance().value(), dec!(9985));
    }
}

/// Rejected intents leave the engine exactly as it was.
mod rejections {
    use super::*;

    #[test]
    fn non_positive_volume_is_invalid_order() {
        let mut engine = engine(1);
        let before = engine.account_snapshot();
        for volume in [dec!(0), dec!(-1)] {
            let result =
                engine.open_position(OrderIntent::market("XAUUSD", Side::Long, volume, 100));
            match result {
                Err(EngineError::Order(OrderError::InvalidOrder { violations })) => {
                    assert_eq!(violations, vec![OrderViolation::NonPositiveVolume(volume)]);
                }
                other => panic!("expected invalid order, got {other:?}"),
            }
        }
        assert!(engine.open_positions().is_empty());
        assert_eq!(engine.account_snapshot(), before);
    }

    #[test]
    fn oversized_volume_is_rejected_and_valuation_keeps_running() {
        let mut engine = engine(10);
        let huge = Decimal::from_i128_with_scale(10_i128.pow(24), 0);
        let result = engine.open_position(OrderIntent::market("EURUSD", Side::Long, huge, 1));
        match result {
            Err(EngineError::Order(OrderError::InvalidOrder { violations })) => {
                assert_eq!(
                    violations,
                    vec![OrderViolation::VolumeTooLarge { volume: huge, max: dec!(100) }]
                );
            }
            other => panic!("expected invalid order, got {other:?}"),
        }
        assert!(engine.open_positions().is_empty());

        engine
            .open_position(OrderIntent::market("EURUSD", Side::Long, dec!(100), 1))
            .unwrap();
        for _ in 0..5 {
            engine.advance_market();
            let report = engine.run_valuation_pass();
            assert_eq!(report.valuations.len(), 1);
        }
    }

    #[test]
    fn every_violation_is_listed() {
        let mut engine = engine(2);
        let quote = engine.quote(&Symbol::from("XAUUSD")).unwrap();
        let intent = OrderIntent::market("XAUUSD", Side::Short, dec!(0), 0)
            .with_stop_loss(Price::new_unchecked(quote.bid.value() - dec!(5)))
            .with_take_profit(Price::new_unchecked(quote.bid.value() + dec!(5)));
        let Err(EngineError::Order(OrderError::InvalidOrder { violations })) =
            engine.open_position(intent)
        else {
            panic!("expected invalid order");
        };
        assert_eq!(violations.len(), 4);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut engine = engine(3);
        engine
            .open_position(OrderIntent::market("EURUSD", Side::Long, dec!(1), 100))
            .unwrap();
        let before = engine.open_positions();
        assert_eq!(
            engine.close_position(PositionId(77)),
            Err(EngineError::PositionNotFound(PositionId(77)))
        );
        assert_eq!(engine.open_positions(), before);
    }

    #[test]
    fn invalid_trigger_edit_keeps_old_triggers() {
        let mut engine = engine(4);
        let pos = engine
            .open_position(OrderIntent::market("XAUUSD", Side::Long, dec!(1), 100))
            .unwrap();
        let above_entry = Price::new_unchecked(pos.entry_price.value() + dec!(1));
        let result = engine.edit_triggers(pos.id, TriggerEdit::Set(above_entry), TriggerEdit::Keep);
        assert!(matches!(result, Err(EngineError::Order(_))));
        assert_eq!(engine.position(pos.id).unwrap().stop_loss, None);
    }
}

/// Market data over many ticks.
mod market {
    use super::*;

    #[test]
    fn six_hundred_ticks_keep_the_latest_five_hundred() {
        let mut engine = engine(5);
        let gold = Symbol::from("XAUUSD");
        let seeded_last = *engine.latest_candles(&gold).unwrap().last().unwrap();

        for _ in 0..600 {
            engine.advance_time(2_000);
            assert!(engine.advance_market().is_clean());
        }

        let candles = engine.latest_candles(&gold).unwrap();
        assert_eq!(candles.len(), 500);
        let tf = engine.timeframe().secs();
        assert_eq!(candles[499].open_time, seeded_last.open_time + 600 * tf);
        assert!(candles.windows(2).all(|w| w[1].open_time - w[0].open_time == tf));
        assert!(candles.iter().all(|c| c.validate().is_ok()));
    }

    #[test]
    fn every_quote_has_ask_at_or_above_bid() {
        let mut engine = engine(6);
        for _ in 0..50 {
            engine.advance_market();
            for quote in engine.quotes() {
                assert!(quote.ask >= quote.bid, "{quote:?}");
            }
        }
    }

    #[test]
    fn same_seed_same_market() {
        let mut a = engine(7);
        let mut b = engine(7);
        for _ in 0..20 {
            a.advance_market();
            b.advance_market();
        }
        assert_eq!(a.quotes(), b.quotes());
        let eur = Symbol::from("EURUSD");
        assert_eq!(a.latest_candles(&eur).unwrap(), b.latest_candles(&eur).unwrap());
    }
}

/// Trigger closes driven by the valuation pass.
mod lifecycle {
    use super::*;

    #[test]
    fn triggered_positions_close_exactly_once() {
        let mut engine = engine(8);
        let eur = Symbol::from("EURUSD");
        let quote = engine.quote(&eur).unwrap();
        let band = dec!(0.0010);
        for _ in 0..5 {
            engine
                .open_position(
                    OrderIntent::market("EURUSD", Side::Long, dec!(0.1), 500)
                        .with_stop_loss(Price::new_unchecked(quote.bid.value() - band))
                        .with_take_profit(Price::new_unchecked(quote.ask.value() + band)),
                )
                .unwrap();
        }

        let start = engine.last_event_id().unwrap_or(EventId(0));
        let mut closed = 0;
        for _ in 0..1_000 {
            if engine.open_positions().is_empty() {
                break;
            }
            engine.advance_market();
            let report = engine.run_valuation_pass();
            assert!(report.closed.iter().all(|c| c.reason != CloseReason::Manual));
            closed += report.closed.len();
        }
        assert_eq!(closed, 5);

        let close_events = engine
            .events_since(start)
            .into_iter()
            .filter(|e| matches!(e.payload, EventPayload::PositionClosed(_)))
            .count();
        assert_eq!(close_events, 5);

        let snap = engine.account_snapshot();
        assert_eq!(snap.margin.value(), Decimal::ZERO);
        assert_eq!(snap.equity, snap.balance);
    }

    #[test]
    fn margin_follows_lot_size_and_leverage() {
        let mut engine = engine(9);
        let pos = engine
            .open_position(OrderIntent::market("EURUSD", Side::Long, dec!(1), 100))
            .unwrap();
        let snap = engine.account_snapshot();
        // 1 lot of 100,000 units at 1:100
        assert_eq!(snap.margin.value(), pos.entry_price.value() * dec!(1000));
        assert_eq!(snap.free_margin, snap.equity.sub(snap.margin));
    }
}
