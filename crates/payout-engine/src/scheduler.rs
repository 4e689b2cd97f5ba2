//! Periodic cycle scheduling.
//!
//! Ticks fire on a fixed period. A tick that arrives while the previous
//! cycle is still running is skipped, never queued, so at most one cycle
//! is in flight and a cycle is never started concurrently with itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::executor::{CycleError, CycleOutcome, PayoutExecutor};

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Result of a single tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// A cycle was already in flight; nothing ran.
    Skipped,
    /// The cycle ran to a non-error end.
    Completed {
        /// Identifier of the cycle.
        cycle_id: u64,
        /// How it ended.
        outcome: CycleOutcome,
    },
    /// The cycle failed.
    Failed(CycleError),
}

/// Clears the in-flight flag when dropped, including on panic.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fires payout cycles with a reentrancy guard.
pub struct Scheduler {
    executor: Arc<PayoutExecutor>,
    interval: Duration,
    in_flight: AtomicBool,
    next_cycle: AtomicU64,
}

impl Scheduler {
    /// Schedule `executor` every `interval`.
    pub fn new(executor: Arc<PayoutExecutor>, interval: Duration) -> Self {
        Self {
            executor,
            interval,
            in_flight: AtomicBool::new(false),
            next_cycle: AtomicU64::new(1),
        }
    }

    /// The polling period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a cycle is currently running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle unless one is already in flight.
    pub async fn tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("previous payout cycle still running, skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        let cycle_id = self.next_cycle.fetch_add(1, Ordering::Relaxed);
        debug!(cycle_id, "payout cycle started");
        match self.executor.run_cycle(cycle_id).await {
            Ok(outcome) => TickOutcome::Completed { cycle_id, outcome },
            Err(e) => TickOutcome::Failed(e),
        }
    }

    /// Tick every interval until `shutdown` fires.
    ///
    /// Each tick runs on its own task so a slow cycle cannot delay the
    /// timer; overlapping ticks are turned away by [`Scheduler::tick`].
    /// On shutdown the in-flight cycle, if any, is awaited before
    /// returning.
    pub async fn run<F>(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>, on_outcome: F)
    where
        F: Fn(TickOutcome) + Send + Sync + 'static,
    {
        let on_outcome = Arc::new(on_outcome);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();

        info!(interval_secs = self.interval.as_secs(), "payout scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    let callback = Arc::clone(&on_outcome);
                    tasks.spawn(async move {
                        let outcome = this.tick().await;
                        callback(outcome);
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        info!("payout scheduler stopped");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "payout cycle panicked");
        }
    }
}
