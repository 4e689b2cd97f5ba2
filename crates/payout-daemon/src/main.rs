//! payout-daemon: runs the threshold-triggered payout engine.
//!
//! Single OS process on a Tokio runtime. Payout configuration lives in a
//! JSON file in the data directory; balances, UTXOs and proofs come from a
//! fixture file, and transactions are built as drafts and never sent.

mod config;
mod events;
mod file_store;
mod fixture;
mod monitor;

use std::sync::Arc;

use payout_engine::collaborators::Collaborators;
use payout_engine::executor::PayoutExecutor;
use payout_engine::scheduler::Scheduler;
use payout_engine::stub::{CharsetAddressValidator, DraftTxBuilderFactory, DryRunBroadcaster};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::DaemonConfig;
use crate::events::{spawn_event_log, Event, EventBus, EVENT_LOG_FILE};
use crate::file_store::{JsonFileConfigStore, CONFIG_STORE_FILE};
use crate::fixture::FixtureIndexer;
use crate::monitor::CycleReporter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // 2. Initialize tracing; RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.advanced.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("payout daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Secrets
    let secrets = config.secrets();
    if secrets.signing_key().is_none() {
        warn!(
            env = %config.wallet.signing_key_env,
            "signing key not set, every cycle will be ineligible"
        );
    }

    // 4. Collaborators
    let store_path = data_dir.join(CONFIG_STORE_FILE);
    let fixture_path = config.fixture_path();
    info!(
        config_store = %store_path.display(),
        fixture = %fixture_path.display(),
        "opening data files"
    );
    let indexer = Arc::new(FixtureIndexer::new(fixture_path));
    let collaborators = Collaborators {
        config_store: Arc::new(JsonFileConfigStore::new(store_path)),
        balances: indexer.clone(),
        proofs: indexer.clone(),
        addresses: Arc::new(CharsetAddressValidator::default()),
        utxos: indexer,
        builders: Arc::new(DraftTxBuilderFactory),
        broadcaster: Arc::new(DryRunBroadcaster::new()),
    };

    // 5. Engine
    let executor = Arc::new(PayoutExecutor::new(
        config.engine_settings(),
        secrets,
        collaborators,
    ));
    let scheduler = Arc::new(Scheduler::new(executor, config.poll_interval()));

    // 6. Event bus and log
    let event_bus = EventBus::new(1000);
    let log_writer = spawn_event_log(event_bus.subscribe(), data_dir.join(EVENT_LOG_FILE));
    let reporter = CycleReporter::new(event_bus.clone(), config.engine.alert_after_failures);

    // 7. Emit DaemonStarted event
    event_bus.emit(Event::daemon_started(&config.wallet.funding_address));

    // 8. Run the scheduler until shutdown
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut scheduler_task = tokio::spawn(
        scheduler.run(shutdown_rx, move |outcome| reporter.report(outcome)),
    );

    let finished = tokio::select! {
        result = &mut scheduler_task => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    match finished {
        Some(Ok(())) => warn!("scheduler stopped on its own"),
        Some(Err(e)) => error!(error = %e, "scheduler stopped unexpectedly"),
        None => {
            info!("Ctrl-C received, shutting down");
            let _ = shutdown_tx.send(());
            if let Err(e) = scheduler_task.await {
                error!(error = %e, "scheduler task failed");
            }
        }
    }

    // Graceful shutdown: closing the bus ends the log writer
    info!(events = event_bus.sequence(), "flushing event log");
    drop(event_bus);
    if let Err(e) = log_writer.await {
        error!(error = %e, "event log writer failed");
    }

    info!("payout daemon stopped");
    Ok(())
}
