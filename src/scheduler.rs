use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::monitor::Monitor;
use crate::notify::Notifier;
use crate::source::ReadingSource;

/// Create a linked trigger/token pair. Cancelling the trigger (or dropping
/// every clone of it) wakes all tokens.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(Arc::new(tx)), ShutdownToken(rx))
}

#[derive(Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Clone)]
pub struct ShutdownToken(watch::Receiver<bool>);

impl ShutdownToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled or once the trigger is gone.
    pub async fn cancelled(&mut self) {
        let _ = self.0.wait_for(|cancelled| *cancelled).await;
    }
}

/// Drives `Monitor::run_cycle` on a fixed period. Cycles never overlap: a
/// cycle is awaited before the next tick, and ticks missed while it ran are
/// pushed back rather than fired in a burst.
pub struct Scheduler {
    interval: Duration,
    first_delay: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration, first_delay: Duration) -> Self {
        Self {
            interval,
            first_delay,
        }
    }

    /// Run until `shutdown` fires. Returns the number of completed cycles.
    pub async fn run<S, N>(&self, monitor: &mut Monitor<S, N>, mut shutdown: ShutdownToken) -> u64
    where
        S: ReadingSource,
        N: Notifier,
    {
        let mut ticker = interval_at(Instant::now() + self.first_delay, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested mid-cycle, abandoning it");
                    break;
                }
                outcome = monitor.run_cycle() => {
                    cycles += 1;
                    debug!(cycle = cycles, outcome = ?outcome, "Cycle complete");
                }
            }
        }

        info!(cycles, "Scheduler stopped");
        cycles
    }
}
