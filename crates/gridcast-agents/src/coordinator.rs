use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use gridcast_cache::Clock;
use gridcast_models::{
    CycleResult, DailyOutlook, DemandForecast, Outlook, PeakStatistics, PipelineRecord,
    StorageState,
};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::activity::{
    ActivityLog, TracingActivityLog, COORDINATOR_ID, DEMAND_AGENT_ID, GRID_AGENT_ID,
    WEATHER_AGENT_ID,
};
use crate::demand::DemandPredictor;
use crate::error::AgentError;
use crate::grid::GridBalancer;
use crate::sink::{NullSink, PersistenceSink};
use crate::weather::{WeatherSource, MAX_FORECAST_DAYS};

type StorageSlot = Arc<AsyncMutex<StorageState>>;

/// Runs Weather -> Demand -> Grid for a location and owns per-location storage.
///
/// Cloning is cheap and clones share agents, caches and storage slots.
#[derive(Clone)]
pub struct PipelineCoordinator {
    weather: Arc<dyn WeatherSource>,
    demand: Arc<dyn DemandPredictor>,
    grid: Arc<dyn GridBalancer>,
    sink: Arc<dyn PersistenceSink>,
    activity: Arc<dyn ActivityLog>,
    clock: Arc<dyn Clock>,
    storage: Arc<Mutex<HashMap<String, StorageSlot>>>,
    pending_records: TaskTracker,
}

impl PipelineCoordinator {
    pub fn new(
        weather: Arc<dyn WeatherSource>,
        demand: Arc<dyn DemandPredictor>,
        grid: Arc<dyn GridBalancer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            weather,
            demand,
            grid,
            sink: Arc::new(NullSink),
            activity: Arc::new(TracingActivityLog),
            clock,
            storage: Arc::new(Mutex::new(HashMap::new())),
            pending_records: TaskTracker::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = activity;
        self
    }

    fn storage_key(location: &str) -> Result<String, AgentError> {
        let key = location.trim().to_lowercase();
        if key.is_empty() {
            return Err(AgentError::InvalidLocation(location.to_string()));
        }
        Ok(key)
    }

    fn slot(&self, key: &str) -> StorageSlot {
        let mut slots = self.storage.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(self.grid.initial_storage())))
            .clone()
    }

    /// Storage state for `location`; the configured initial level if it has never cycled.
    ///
    /// Waits for any in-flight cycle on the same location.
    pub async fn storage_level(&self, location: &str) -> Result<StorageState, AgentError> {
        let key = Self::storage_key(location)?;
        let slot = self.slot(&key);
        let state = *slot.lock().await;
        Ok(state)
    }

    /// Overwrite the storage state for `location`.
    pub async fn set_storage_level(
        &self,
        location: &str,
        state: StorageState,
    ) -> Result<(), AgentError> {
        let key = Self::storage_key(location)?;
        let slot = self.slot(&key);
        *slot.lock().await = StorageState::new(state.level_fraction);
        Ok(())
    }

    /// Run one full cycle for `location`.
    ///
    /// The first failing stage aborts the cycle. On failure nothing is sent to
    /// the sink and the location's storage state is unchanged.
    pub async fn run_cycle(&self, location: &str) -> Result<CycleResult, AgentError> {
        let start = Instant::now();
        info!(location, "Starting cycle");

        match self.cycle(location).await {
            Ok(result) => {
                self.emit(&result);
                info!(
                    location = %result.location,
                    demand_mw = result.demand.predicted_demand_mw,
                    renewable_pct = result.grid.renewable_percentage,
                    storage_level = result.grid.storage_level_fraction,
                    status = ?result.grid.balance_status,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Cycle complete"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(location, error = %e, elapsed_ms = start.elapsed().as_millis(), "Cycle failed");
                self.activity
                    .log_action(COORDINATOR_ID, &format!("Cycle for {location} failed: {e}"));
                Err(e)
            }
        }
    }

    async fn cycle(&self, location: &str) -> Result<CycleResult, AgentError> {
        let key = Self::storage_key(location)?;
        let slot = self.slot(&key);
        // Held until the new state is committed so cycles for one location never interleave.
        let mut state = slot.lock().await;

        let weather = self.weather.fetch(location).await?;
        self.activity.log_action(
            WEATHER_AGENT_ID,
            &format!(
                "Fetched weather for {}: {:.1}°C, renewable score {:.2}",
                weather.location, weather.temperature_c, weather.renewable_score
            ),
        );

        let now = self.clock.now();
        let demand = self.demand.predict(location, &weather, now)?;
        self.activity.log_action(
            DEMAND_AGENT_ID,
            &format!("Predicted demand: {:.2} MW", demand.predicted_demand_mw),
        );

        let mut next = *state;
        let grid = self.grid.balance(&demand, &weather, &mut next)?;
        *state = next;
        self.activity.log_action(
            GRID_AGENT_ID,
            &format!(
                "Grid balanced: {:?}, storage at {:.0}%",
                grid.balance_status,
                grid.storage_level_fraction * 100.0
            ),
        );

        Ok(CycleResult {
            location: location.trim().to_string(),
            timestamp: now,
            weather,
            demand,
            grid,
        })
    }

    /// Hand the cycle's records to the sink without waiting on it.
    fn emit(&self, result: &CycleResult) {
        let sink = Arc::clone(&self.sink);
        let records = PipelineRecord::from_cycle(result);
        self.pending_records.spawn(async move {
            for record in records {
                let kind = record.kind();
                let location = record.location().to_string();
                if let Err(e) = sink.record(record).await {
                    warn!(kind, location = %location, error = %e, "Failed to persist record");
                }
            }
        });
    }

    /// Wait until every record handed to the sink so far has been written or dropped.
    pub async fn flush_records(&self) {
        self.pending_records.close();
        self.pending_records.wait().await;
        self.pending_records.reopen();
        debug!("Pending records flushed");
    }

    /// Run one cycle per location concurrently. Results are in input order.
    pub async fn run_cycles(
        &self,
        locations: &[String],
    ) -> Vec<(String, Result<CycleResult, AgentError>)> {
        let mut set = JoinSet::new();
        for (idx, location) in locations.iter().enumerate() {
            let coordinator = self.clone();
            let location = location.clone();
            set.spawn(async move {
                let result = coordinator.run_cycle(&location).await;
                (idx, result)
            });
        }

        let mut slots: Vec<Option<Result<CycleResult, AgentError>>> =
            locations.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => error!(error = %e, "Cycle task panicked"),
            }
        }

        locations
            .iter()
            .cloned()
            .zip(slots)
            .map(|(location, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(AgentError::InvariantViolation(format!(
                        "cycle task for {location} did not complete"
                    )))
                });
                (location, result)
            })
            .collect()
    }

    /// Weather and demand outlook for the next `days` days (clamped to 1..=5).
    ///
    /// Each forecast snapshot gets a demand prediction at its own timestamp.
    /// Storage state is neither read nor written.
    pub async fn outlook(&self, location: &str, days: u32) -> Result<Outlook, AgentError> {
        let days = days.clamp(1, MAX_FORECAST_DAYS);
        let weather = self.weather.forecast_extended(location, days).await?;
        let demand = weather
            .iter()
            .map(|snapshot| self.demand.predict(location, snapshot, snapshot.timestamp))
            .collect::<Result<Vec<DemandForecast>, AgentError>>()?;

        let daily = DailyOutlook::summarise(&weather, &demand);
        let peak_statistics = PeakStatistics::from_forecasts(&demand);
        info!(
            location,
            days,
            entries = weather.len(),
            peak_mw = ?peak_statistics.as_ref().map(|p| p.max_demand_mw),
            "Outlook built"
        );
        self.activity.log_action(
            DEMAND_AGENT_ID,
            &format!("Built {days}-day outlook with {} entries", demand.len()),
        );

        Ok(Outlook {
            location: location.trim().to_string(),
            generated_at: self.clock.now(),
            weather,
            demand,
            daily,
            peak_statistics,
        })
    }
}
