//! Test doubles for the pipeline's collaborators.
//!
//! Providers, sinks and activity logs here record what they were asked so
//! tests can assert on call counts and emitted records without a network or
//! database.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use gridcast_cache::{Clock, ManualClock};
use gridcast_models::{GridcastConfig, PipelineRecord, RawWeather};

use crate::activity::ActivityLog;
use crate::coordinator::PipelineCoordinator;
use crate::demand::{DemandAgent, NoNoise};
use crate::error::SinkError;
use crate::grid::GridBalancerAgent;
use crate::provider::{ProviderError, WeatherProvider};
use crate::sink::PersistenceSink;
use crate::weather::WeatherAgent;

/// Wednesday 2026-04-15 18:00 UTC: evening peak hour, seasonal factor 1.0.
pub fn evening_peak() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 15, 18, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(evening_peak()))
}

/// 21 °C, 40% cloud and calm wind: solar 0.6, wind 0.0, renewable score 0.3.
pub fn mild_evening(at: DateTime<Utc>) -> RawWeather {
    RawWeather {
        observed_at: at,
        temperature_c: 21.0,
        humidity_percent: 70.0,
        wind_speed_ms: 2.0,
        cloud_cover: 0.4,
        condition: "Clouds".to_string(),
        utc_offset_seconds: 0,
    }
}

/// Three-hourly readings covering five days from `start`, with a daily temperature swing.
pub fn five_day_series(start: DateTime<Utc>) -> Vec<RawWeather> {
    (0..40)
        .map(|i| {
            let at = start + ChronoDuration::hours(3 * i);
            let phase = (i % 8) as f64;
            RawWeather {
                observed_at: at,
                temperature_c: 20.0 + 4.0 * (phase - 4.0).abs() / 4.0,
                humidity_percent: 65.0,
                wind_speed_ms: 4.0 + phase,
                cloud_cover: 0.1 * phase,
                condition: "Clouds".to_string(),
                utc_offset_seconds: 0,
            }
        })
        .collect()
}

/// Serves fixed readings and counts calls.
pub struct StaticWeatherProvider {
    current: RawWeather,
    forecast: Vec<RawWeather>,
    current_calls: AtomicUsize,
    forecast_calls: AtomicUsize,
}

impl StaticWeatherProvider {
    pub fn new(current: RawWeather) -> Self {
        let forecast = five_day_series(current.observed_at);
        Self::with_forecast(current, forecast)
    }

    pub fn with_forecast(current: RawWeather, forecast: Vec<RawWeather>) -> Self {
        Self {
            current,
            forecast,
            current_calls: AtomicUsize::new(0),
            forecast_calls: AtomicUsize::new(0),
        }
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn forecast_calls(&self) -> usize {
        self.forecast_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for StaticWeatherProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn current_weather(&self, _location: &str) -> Result<RawWeather, ProviderError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.clone())
    }

    async fn forecast_5day(&self, _location: &str) -> Result<Vec<RawWeather>, ProviderError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.forecast.clone())
    }
}

/// Always answers with HTTP 503.
#[derive(Debug, Default)]
pub struct FailingWeatherProvider {
    calls: AtomicUsize,
}

impl FailingWeatherProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for FailingWeatherProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn current_weather(&self, _location: &str) -> Result<RawWeather, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }

    async fn forecast_5day(&self, _location: &str) -> Result<Vec<RawWeather>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

/// Sleeps before answering with a fixed reading.
pub struct SlowWeatherProvider {
    delay: Duration,
    reading: RawWeather,
}

impl SlowWeatherProvider {
    pub fn new(delay: Duration, reading: RawWeather) -> Self {
        Self { delay, reading }
    }
}

#[async_trait]
impl WeatherProvider for SlowWeatherProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn current_weather(&self, _location: &str) -> Result<RawWeather, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reading.clone())
    }

    async fn forecast_5day(&self, _location: &str) -> Result<Vec<RawWeather>, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![self.reading.clone()])
    }
}

/// Keeps every record it is given. Can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<PipelineRecord>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn records(&self) -> Vec<PipelineRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Poll until at least `n` records arrived or `timeout` elapsed.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> Vec<PipelineRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let records = self.records();
            if records.len() >= n || tokio::time::Instant::now() >= deadline {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl PersistenceSink for RecordingSink {
    async fn record(&self, record: PipelineRecord) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError("sink offline".to_string()));
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }
}

/// Keeps every `(agent_id, action)` pair.
#[derive(Debug, Default)]
pub struct RecordingActivityLog {
    entries: Mutex<Vec<(String, String)>>,
}

impl RecordingActivityLog {
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ActivityLog for RecordingActivityLog {
    fn log_action(&self, agent_id: &str, action: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((agent_id.to_string(), action.to_string()));
    }
}

/// Defaults with a 200 MW store and no demand noise.
pub fn test_config() -> GridcastConfig {
    let mut config = GridcastConfig::default();
    config.grid.storage_capacity_mw = 200.0;
    config.demand.noise_amplitude = 0.0;
    config
}

/// A coordinator over `provider` with deterministic demand.
pub fn coordinator(
    provider: Arc<dyn WeatherProvider>,
    config: &GridcastConfig,
    clock: Arc<dyn Clock>,
) -> PipelineCoordinator {
    let weather = WeatherAgent::new(provider, &config.weather, &config.cache, clock.clone());
    let demand = DemandAgent::new(config.demand.clone(), Arc::new(NoNoise), clock.clone());
    let grid = GridBalancerAgent::new(config.grid.clone());
    PipelineCoordinator::new(Arc::new(weather), Arc::new(demand), Arc::new(grid), clock)
}
