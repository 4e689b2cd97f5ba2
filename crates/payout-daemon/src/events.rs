//! Event emission and the payout log.
//!
//! Cycle results are published on an in-process bus. The log writer
//! subscribes to it and appends each event as one JSON line to
//! `events.jsonl`, which doubles as the audit trail of broadcast payouts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use payout_engine::executor::{CycleError, CycleOutcome};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Event log file name inside the data directory.
pub const EVENT_LOG_FILE: &str = "events.jsonl";

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "PayoutBroadcast", "DaemonStarted").
    pub event_type: String,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// An event stamped with the current time.
    pub fn now(event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            payload,
        }
    }

    /// The daemon came up.
    pub fn daemon_started(funding_address: &str) -> Self {
        Self::now(
            "DaemonStarted",
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "funding_address": funding_address,
            }),
        )
    }

    /// A cycle ended without an error.
    pub fn from_outcome(cycle_id: u64, outcome: &CycleOutcome) -> Self {
        match outcome {
            CycleOutcome::Paid(receipt) => Self::now(
                "PayoutBroadcast",
                serde_json::json!({ "cycle_id": cycle_id, "receipt": receipt }),
            ),
            CycleOutcome::BelowThreshold { balance, threshold } => Self::now(
                "PayoutSkipped",
                serde_json::json!({
                    "cycle_id": cycle_id,
                    "reason": "below_threshold",
                    "balance": balance,
                    "threshold": threshold,
                }),
            ),
            CycleOutcome::Ineligible(snapshot) => Self::now(
                "PayoutSkipped",
                serde_json::json!({
                    "cycle_id": cycle_id,
                    "reason": "ineligible",
                    "failed": snapshot.failed(),
                    "conditions": snapshot.conditions,
                }),
            ),
        }
    }

    /// A cycle failed.
    pub fn cycle_failed(err: &CycleError) -> Self {
        Self::now(
            "CycleFailed",
            serde_json::json!({
                "cycle_id": err.cycle_id,
                "state": err.state,
                "error_kind": err.kind.kind(),
                "error": err.kind.to_string(),
            }),
        )
    }

    /// External services have failed `failures` ticks in a row.
    pub fn external_service_degraded(failures: u32, last_error: &str) -> Self {
        Self::now(
            "ExternalServiceDegraded",
            serde_json::json!({
                "consecutive_failures": failures,
                "last_error": last_error,
            }),
        )
    }
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

/// Append every event received on `rx` to `path`, one JSON object per line.
///
/// The task ends when the bus is dropped. Lagging only loses events from
/// the log, never from the bus.
pub fn spawn_event_log(mut rx: broadcast::Receiver<Event>, path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                error!(path = %path.display(), error = %e, "cannot open event log");
                return;
            }
        };

        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event log lagging, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let mut line = match serde_json::to_vec(&event) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "cannot encode event");
                    continue;
                }
            };
            line.push(b'\n');
            if let Err(e) = file.write_all(&line).await {
                error!(path = %path.display(), error = %e, "event log write failed");
            }
            if let Err(e) = file.flush().await {
                error!(path = %path.display(), error = %e, "event log flush failed");
            }
        }
    })
}
