//! Tick reporting and external-service degradation alerts.
//!
//! Every tick outcome is turned into an event. Consecutive failures caused
//! by an unreachable or failing collaborator are counted; once the count
//! reaches the configured limit the daemon raises one alert, and stays
//! quiet until a tick gets past its external calls again.

use std::sync::Mutex;

use payout_engine::executor::CycleOutcome;
use payout_engine::scheduler::TickOutcome;
use tracing::{error, info, warn};

use crate::events::{Event, EventBus};

/// Counts consecutive external-service failures.
#[derive(Debug)]
pub struct HealthMonitor {
    alert_after: u32,
    consecutive: u32,
    alerted: bool,
}

impl HealthMonitor {
    /// Alert after `alert_after` consecutive failures. Zero disables alerts.
    pub fn new(alert_after: u32) -> Self {
        Self {
            alert_after,
            consecutive: 0,
            alerted: false,
        }
    }

    /// Current run of consecutive external-service failures.
    #[cfg(test)]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    /// Record a tick. Returns the failure count when this tick should
    /// raise the alert.
    ///
    /// Skipped ticks never reached a collaborator and leave the count
    /// unchanged.
    pub fn observe(&mut self, outcome: &TickOutcome) -> Option<u32> {
        match outcome {
            TickOutcome::Skipped => None,
            TickOutcome::Failed(err) if err.kind.is_external() => {
                self.consecutive = self.consecutive.saturating_add(1);
                if self.alert_after > 0 && self.consecutive >= self.alert_after && !self.alerted {
                    self.alerted = true;
                    Some(self.consecutive)
                } else {
                    None
                }
            }
            _ => {
                if self.alerted {
                    info!(
                        failures = self.consecutive,
                        "external services recovered"
                    );
                }
                self.consecutive = 0;
                self.alerted = false;
                None
            }
        }
    }
}

/// Turns tick outcomes into log lines and bus events.
pub struct CycleReporter {
    bus: EventBus,
    monitor: Mutex<HealthMonitor>,
}

impl CycleReporter {
    /// Report onto `bus`, alerting after `alert_after` failures.
    pub fn new(bus: EventBus, alert_after: u32) -> Self {
        Self {
            bus,
            monitor: Mutex::new(HealthMonitor::new(alert_after)),
        }
    }

    /// Handle one tick outcome.
    pub fn report(&self, outcome: TickOutcome) {
        let alert = match self.monitor.lock() {
            Ok(mut monitor) => monitor.observe(&outcome),
            Err(_) => {
                warn!("health monitor poisoned, alert state lost");
                None
            }
        };

        match &outcome {
            TickOutcome::Skipped => {}
            TickOutcome::Completed { cycle_id, outcome } => {
                if let CycleOutcome::Paid(receipt) = outcome {
                    info!(
                        cycle_id,
                        tx_id = %receipt.tx_id,
                        fee = receipt.fee,
                        change = receipt.change,
                        "payout recorded"
                    );
                }
                self.bus.emit(Event::from_outcome(*cycle_id, outcome));
            }
            TickOutcome::Failed(err) => {
                self.bus.emit(Event::cycle_failed(err));
                if let Some(failures) = alert {
                    error!(
                        failures,
                        error = %err.kind,
                        "external services failing repeatedly, payouts stalled"
                    );
                    self.bus
                        .emit(Event::external_service_degraded(failures, &err.kind.to_string()));
                }
            }
        }
    }
}
