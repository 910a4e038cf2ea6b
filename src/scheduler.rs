// 9.0: the periodic driver. one task, two cadences: price ticks extend every series and
// requote, valuation ticks settle triggers and publish a report. every tick holds the
// engine lock for its whole duration, so user intents never interleave with a pass.

use crate::config::SimConfig;
use crate::engine::{Engine, ValuationReport};
use crate::types::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub type SharedEngine = Arc<Mutex<Engine>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub price_tick: Duration,
    pub valuation_interval: Duration,
    /// Reports buffered per subscriber before the slowest one starts lagging
    pub report_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&SimConfig::default())
    }
}

impl From<&SimConfig> for SchedulerConfig {
    fn from(config: &SimConfig) -> Self {
        Self {
            price_tick: Duration::from_millis(config.price_tick_ms),
            valuation_interval: Duration::from_millis(config.valuation_interval_ms),
            report_capacity: 64,
        }
    }
}

pub struct ValuationScheduler {
    engine: SharedEngine,
    config: SchedulerConfig,
    reports: broadcast::Sender<ValuationReport>,
    shutdown: watch::Receiver<bool>,
}

/// Owner side of a running scheduler. Dropping it without calling
/// [`SchedulerHandle::shutdown`] leaves the task stopping on its next select.
pub struct SchedulerHandle {
    reports: broadcast::Sender<ValuationReport>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ValuationReport> {
        self.reports.subscribe()
    }

    /// True once the driver task has exited, whether by shutdown or by panicking.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the driver and wait for the tick in progress, if any, to finish.
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        // the receiver only disappears once the task has already exited
        let _ = self.shutdown.send(true);
        self.task.await.inspect_err(|err| {
            error!(error = %err, "scheduler task failed");
        })
    }
}

impl ValuationScheduler {
    pub fn spawn(engine: SharedEngine, config: SchedulerConfig) -> SchedulerHandle {
        let (reports, _) = broadcast::channel(config.report_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Self {
            engine,
            config,
            reports: reports.clone(),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(scheduler.run());
        SchedulerHandle {
            reports,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(mut self) {
        let mut price = interval(self.config.price_tick);
        price.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut valuation = interval(self.config.valuation_interval);
        valuation.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // both intervals fire immediately once; the first real tick is one period out
        price.tick().await;
        valuation.tick().await;

        let started = Instant::now();
        let base = self.engine.lock().await.time();
        info!(
            price_tick_ms = self.config.price_tick.as_millis() as u64,
            valuation_ms = self.config.valuation_interval.as_millis() as u64,
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = price.tick() => {
                    let mut engine = self.engine.lock().await;
                    engine.set_time(clock(base, started));
                    let tick = engine.advance_market();
                    if !tick.is_clean() {
                        warn!(dropped = tick.violations.len(), "price tick dropped candles");
                    }
                }
                _ = valuation.tick() => {
                    let report = {
                        let mut engine = self.engine.lock().await;
                        engine.set_time(clock(base, started));
                        engine.run_valuation_pass()
                    };
                    if self.reports.send(report).is_err() {
                        debug!("valuation report has no subscribers");
                    }
                }
            }
        }
        info!("scheduler stopped");
    }
}

// engine time follows the runtime clock, so a paused test runtime drives it too
fn clock(base: Timestamp, started: Instant) -> Timestamp {
    let elapsed = Instant::now().duration_since(started).as_millis() as i64;
    Timestamp::from_millis(base.as_millis() + elapsed)
}
