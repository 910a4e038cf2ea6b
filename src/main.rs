//! Mock trading terminal simulation.
//!
//! Walks through the engine lifecycle: seeding the market watch, opening and
//! closing positions, stop loss and take profit triggers, timeframe changes,
//! then runs the async scheduler for a few seconds of live ticks.
//!
//! Pass a JSON config path as the first argument to override the defaults.
//! `RUST_LOG` controls log output (default `info`).

use mocktrade_core::*;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

type SimResult = Result<(), Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> SimResult {
    init_tracing()?;
    let config = load_config()?;

    println!("Mock Trading Terminal Simulation");
    println!("Synthetic Market, Demo Account, Full Position Lifecycle\n");

    scenario_1_market_watch(&config)?;
    scenario_2_manual_round_trip(&config)?;
    scenario_3_stop_loss_and_take_profit(&config)?;
    scenario_4_rejected_orders(&config)?;
    scenario_5_timeframes_and_indicators(&config)?;
    scenario_6_live_scheduler(&config).await?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn init_tracing() -> SimResult {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_target(false)
        .with_env_filter(filter)
        .try_init()?;
    Ok(())
}

fn load_config() -> Result<SimConfig, Box<dyn Error + Send + Sync>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            Ok(SimConfig::from_json_str(&json)?)
        }
        None => Ok(SimConfig::seeded(42)),
    }
}

/// Every instrument is seeded with history and quoted at startup.
fn scenario_1_market_watch(config: &SimConfig) -> SimResult {
    println!("Scenario 1: Market Watch\n");

    let engine = Engine::new(config)?;
    for quote in engine.quotes() {
        println!(
            "  {:<7} bid {:>11}  ask {:>11}  spread {}",
            quote.symbol.as_str(),
            quote.bid.value(),
            quote.ask.value(),
            quote.spread()
        );
    }

    let selected = engine.selected_instrument().clone();
    let candles = engine.latest_candles(&selected)?;
    if let Some(last) = candles.last() {
        println!(
            "\n  {} {}: {} candles, last O {} H {} L {} C {}\n",
            selected,
            engine.timeframe(),
            candles.len(),
            last.open,
            last.high,
            last.low,
            last.close
        );
    }
    Ok(())
}

/// Open a long, let the market move, close it by hand.
fn scenario_2_manual_round_trip(config: &SimConfig) -> SimResult {
    println!("Scenario 2: Manual Round Trip\n");

    let mut engine = Engine::new(config)?;
    let gold = Symbol::from("XAUUSD");

    let position = engine.open_position(OrderIntent::market("XAUUSD", Side::Long, dec!(0.5), 100))?;
    println!(
        "  BUY {} {} @ {} ({})",
        position.volume, position.symbol, position.entry_price, position.leverage
    );
    print_account("  after open", &engine.account_snapshot());

    for _ in 0..10 {
        engine.advance_time(2_000);
        engine.advance_market();
    }
    let quote = engine.quote(&gold)?;
    println!("  bid moved to {}", quote.bid);
    if let Some(pnl) = engine.unrealized_pnl(position.id) {
        println!("  unrealized: {}", pnl);
    }

    let closed = engine.close_position(position.id)?;
    println!(
        "  closed {} @ {}, realized {}",
        closed.position.id, closed.exit_price, closed.realized_pnl
    );
    print_account("  after close", &engine.account_snapshot());
    println!();
    Ok(())
}

/// Positions with triggers close themselves on the valuation pass.
fn scenario_3_stop_loss_and_take_profit(config: &SimConfig) -> SimResult {
    println!("Scenario 3: Stop Loss and Take Profit\n");

    let mut engine = Engine::new(config)?;
    let eur = Symbol::from("EURUSD");
    let quote = engine.quote(&eur)?;
    let band = dec!(0.0020);

    let long = OrderIntent::market("EURUSD", Side::Long, dec!(0.1), 500)
        .with_stop_loss(Price::new_unchecked(quote.bid.value() - band))
        .with_take_profit(Price::new_unchecked(quote.ask.value() + band));
    let short = OrderIntent::market("EURUSD", Side::Short, dec!(0.1), 500)
        .with_stop_loss(Price::new_unchecked(quote.ask.value() + band))
        .with_take_profit(Price::new_unchecked(quote.bid.value() - band));
    engine.open_position(long)?;
    engine.open_position(short)?;
    println!("  two EURUSD positions with a {} band each side", band);

    let mut ticks = 0;
    while !engine.open_positions().is_empty() && ticks < 500 {
        engine.advance_time(1_000);
        if ticks % 2 == 0 {
            engine.advance_market();
        }
        let report = engine.run_valuation_pass();
        for closed in &report.closed {
            println!(
                "  tick {:>3}: {} {} closed by {} @ {}, pnl {}",
                ticks,
                closed.position.id,
                closed.position.side,
                closed.reason,
                closed.exit_price,
                closed.realized_pnl
            );
        }
        ticks += 1;
    }
    print_account("  final", &engine.account_snapshot());
    println!();
    Ok(())
}

/// Invalid orders are rejected with every violated constraint listed.
fn scenario_4_rejected_orders(config: &SimConfig) -> SimResult {
    println!("Scenario 4: Rejected Orders\n");

    let mut engine = Engine::new(config)?;
    let quote = engine.quote(&Symbol::from("XAUUSD"))?;
    let bad = OrderIntent::market("XAUUSD", Side::Long, dec!(0), 0)
        .with_take_profit(Price::new_unchecked(quote.bid.value() - dec!(10)));

    match engine.open_position(bad) {
        Err(err) => println!("  rejected: {}", err),
        Ok(position) => println!("  unexpectedly opened {}", position.id),
    }
    match engine.close_position(PositionId(999)) {
        Err(err) => println!("  rejected: {}", err),
        Ok(closed) => println!("  unexpectedly closed {}", closed.position.id),
    }
    println!("  open positions: {}\n", engine.open_positions().len());
    Ok(())
}

/// Switching timeframe rebuilds the history; indicators read the new series.
fn scenario_5_timeframes_and_indicators(config: &SimConfig) -> SimResult {
    println!("Scenario 5: Timeframes and Indicators\n");

    let mut engine = Engine::new(config)?;
    let gold = Symbol::from("XAUUSD");
    for label in ["1", "60", "D"] {
        engine.set_timeframe_label(label)?;
        let rsi = engine.evaluate_indicator(&gold, &Rsi::default())?;
        let cross = engine.evaluate_indicator(&gold, &SmaCrossover::default())?;
        println!("  {:>3}: RSI {:?}, crossover {:?}", engine.timeframe(), rsi, cross);
    }
    println!();
    Ok(())
}

/// The async driver ticks prices and valuations while reports stream out.
async fn scenario_6_live_scheduler(config: &SimConfig) -> SimResult {
    println!("Scenario 6: Live Scheduler\n");

    let engine: SharedEngine = Arc::new(Mutex::new(Engine::new(config)?));
    let handle = ValuationScheduler::spawn(engine.clone(), SchedulerConfig::from(config));
    let mut reports = handle.subscribe();

    {
        let mut engine = engine.lock().await;
        engine.open_position(OrderIntent::market("GBPUSD", Side::Long, dec!(0.2), 200))?;
    }

    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            report = reports.recv() => match report {
                Ok(report) => print_account("  live", &report.account),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(lag)) => {
                    println!("  skipped {} reports", lag);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await?;
    Ok(())
}

fn print_account(label: &str, account: &AccountSnapshot) {
    let level = account
        .margin_level
        .map(|l| format!("{:.2}%", l))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}: balance {}  equity {}  margin {}  free {}  level {}",
        label, account.balance, account.equity, account.margin, account.free_margin, level
    );
}
