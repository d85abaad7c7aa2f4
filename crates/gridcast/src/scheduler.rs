use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gridcast_agents::PipelineCoordinator;
use gridcast_store::SqliteSink;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Cycle counters shared between the scheduler and its caller.
#[derive(Debug, Default)]
pub struct WatchStats {
    pub rounds: AtomicU64,
    pub cycles_ok: AtomicU64,
    pub cycles_failed: AtomicU64,
    pub records_purged: AtomicU64,
}

/// Retention settings for the cleanup loop.
#[derive(Clone)]
pub struct Retention {
    pub store: SqliteSink,
    pub days: u32,
    pub interval: Duration,
}

/// Runs cycles for a fixed set of locations on an interval until cancelled,
/// and optionally purges old records on a second interval.
pub struct Scheduler {
    coordinator: PipelineCoordinator,
    locations: Vec<String>,
    interval: Duration,
    retention: Option<Retention>,
    stats: Arc<WatchStats>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(coordinator: PipelineCoordinator, locations: Vec<String>, interval: Duration) -> Self {
        Self {
            coordinator,
            locations,
            interval,
            retention: None,
            stats: Arc::new(WatchStats::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Returns a CancellationToken that can be used to trigger shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> Arc<WatchStats> {
        Arc::clone(&self.stats)
    }

    /// Run until cancelled. Pending sink writes are flushed before returning.
    pub async fn run(&self) {
        info!(
            locations = ?self.locations,
            interval_secs = self.interval.as_secs_f64(),
            "Scheduler starting"
        );

        let mut join_set = tokio::task::JoinSet::new();
        {
            let coordinator = self.coordinator.clone();
            let locations = self.locations.clone();
            let interval = self.interval;
            let stats = Arc::clone(&self.stats);
            let cancel = self.cancel.clone();
            join_set.spawn(async move {
                cycle_loop(coordinator, locations, interval, stats, cancel).await;
            });
        }
        if let Some(retention) = self.retention.clone() {
            let stats = Arc::clone(&self.stats);
            let cancel = self.cancel.clone();
            join_set.spawn(async move {
                cleanup_loop(retention, stats, cancel).await;
            });
        }

        while join_set.join_next().await.is_some() {}

        self.coordinator.flush_records().await;
        info!(
            rounds = self.stats.rounds.load(Ordering::Relaxed),
            ok = self.stats.cycles_ok.load(Ordering::Relaxed),
            failed = self.stats.cycles_failed.load(Ordering::Relaxed),
            "Scheduler stopped"
        );
    }
}

/// Run one round immediately, then one per interval.
async fn cycle_loop(
    coordinator: PipelineCoordinator,
    locations: Vec<String>,
    interval: Duration,
    stats: Arc<WatchStats>,
    cancel: CancellationToken,
) {
    loop {
        run_round(&coordinator, &locations, &stats).await;
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Cycle loop shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn run_round(coordinator: &PipelineCoordinator, locations: &[String], stats: &WatchStats) {
    for (location, result) in coordinator.run_cycles(locations).await {
        match result {
            Ok(cycle) => {
                stats.cycles_ok.fetch_add(1, Ordering::Relaxed);
                info!(
                    location = %location,
                    demand_mw = cycle.demand.predicted_demand_mw,
                    status = ?cycle.grid.balance_status,
                    "Scheduled cycle complete"
                );
            }
            Err(e) => {
                stats.cycles_failed.fetch_add(1, Ordering::Relaxed);
                warn!(location = %location, error = %e, "Scheduled cycle failed");
            }
        }
    }
    stats.rounds.fetch_add(1, Ordering::Relaxed);
}

/// Periodically delete records older than the retention window.
async fn cleanup_loop(retention: Retention, stats: Arc<WatchStats>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Cleanup loop shutting down");
                break;
            }
            _ = tokio::time::sleep(retention.interval) => {
                match retention.store.purge_older_than_blocking(retention.days).await {
                    Ok(deleted) => {
                        stats.records_purged.fetch_add(deleted as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        error!(error = %e, "Record cleanup failed");
                    }
                }
            }
        }
    }
}
