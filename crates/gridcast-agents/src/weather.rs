use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use gridcast_cache::{Clock, TimedCache};
use gridcast_models::{CacheConfig, RawWeather, WeatherConfig, WeatherSnapshot};
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::provider::{ProviderError, WeatherProvider};

/// Longest extended forecast the provider can serve.
pub const MAX_FORECAST_DAYS: u32 = 5;

/// Weather capability used by the coordinator. Mockable for testing.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Current snapshot for `location`.
    async fn fetch(&self, location: &str) -> Result<WeatherSnapshot, AgentError>;

    /// Snapshots for the next `days` days (clamped to 1..=5), chronological.
    async fn forecast_extended(
        &self,
        location: &str,
        days: u32,
    ) -> Result<Vec<WeatherSnapshot>, AgentError>;
}

/// Turbine power curve mapping wind speed to a 0..1 capacity factor.
///
/// Output is zero below cut-in, rises with the cube of wind speed up to the
/// rated speed and stays at 1.0 above it. With a cut-out configured, output
/// drops back to zero beyond that speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindCurve {
    pub cut_in_ms: f64,
    pub rated_ms: f64,
    pub cut_out_ms: Option<f64>,
}

impl Default for WindCurve {
    fn default() -> Self {
        Self {
            cut_in_ms: 3.0,
            rated_ms: 12.0,
            cut_out_ms: None,
        }
    }
}

impl WindCurve {
    pub fn from_config(config: &WeatherConfig) -> Self {
        Self {
            cut_in_ms: config.cut_in_speed_ms,
            rated_ms: config.rated_speed_ms,
            cut_out_ms: config.cut_out_speed_ms,
        }
    }

    pub fn potential(&self, wind_speed_ms: f64) -> f64 {
        let v = wind_speed_ms.max(0.0);
        if let Some(cut_out) = self.cut_out_ms {
            if v > cut_out {
                return 0.0;
            }
        }
        if v < self.cut_in_ms {
            return 0.0;
        }
        if v >= self.rated_ms {
            return 1.0;
        }
        let ci3 = self.cut_in_ms.powi(3);
        let span = self.rated_ms.powi(3) - ci3;
        ((v.powi(3) - ci3) / span).clamp(0.0, 1.0)
    }
}

/// `1 - cloud_cover`, clamped to [0, 1].
pub fn solar_potential(cloud_cover: f64) -> f64 {
    (1.0 - cloud_cover).clamp(0.0, 1.0)
}

pub(crate) fn current_key(location: &str) -> String {
    format!("weather:current:{}", normalize(location))
}

pub(crate) fn forecast_key(location: &str) -> String {
    format!("weather:forecast:{}", normalize(location))
}

fn normalize(location: &str) -> String {
    location.trim().to_lowercase()
}

/// Fetches weather through a provider, derives renewable potentials, and caches results.
pub struct WeatherAgent {
    provider: Arc<dyn WeatherProvider>,
    current: TimedCache<WeatherSnapshot>,
    forecasts: TimedCache<Vec<WeatherSnapshot>>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    curve: WindCurve,
    solar_weight: f64,
    wind_weight: f64,
}

impl WeatherAgent {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        weather: &WeatherConfig,
        cache: &CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = Duration::from_secs(cache.ttl_seconds);
        Self {
            provider,
            current: TimedCache::new(cache.max_capacity, ttl, clock.clone()),
            forecasts: TimedCache::new(cache.max_capacity, ttl, clock.clone()),
            clock,
            timeout: Duration::from_secs(weather.timeout_seconds),
            curve: WindCurve::from_config(weather),
            solar_weight: weather.solar_weight,
            wind_weight: weather.wind_weight,
        }
    }

    /// Override the provider timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Turn a raw provider reading into a snapshot with derived potentials.
    pub fn derive(&self, location: &str, raw: &RawWeather) -> WeatherSnapshot {
        let solar = solar_potential(raw.cloud_cover);
        let wind = self.curve.potential(raw.wind_speed_ms);
        let score = (self.solar_weight * solar + self.wind_weight * wind).clamp(0.0, 1.0);

        WeatherSnapshot {
            location: location.trim().to_string(),
            timestamp: raw.observed_at,
            temperature_c: raw.temperature_c,
            humidity_percent: raw.humidity_percent,
            wind_speed_ms: raw.wind_speed_ms,
            cloud_cover: raw.cloud_cover.clamp(0.0, 1.0),
            condition: raw.condition.clone(),
            utc_offset_seconds: raw.utc_offset_seconds,
            solar_potential: solar,
            wind_potential: wind,
            renewable_score: score,
        }
    }

    fn validate_location(location: &str) -> Result<(), AgentError> {
        if location.trim().is_empty() {
            return Err(AgentError::InvalidLocation(location.to_string()));
        }
        Ok(())
    }

    /// Run a provider call under the configured timeout.
    async fn call_provider<T, F>(&self, location: &str, call: F) -> Result<T, AgentError>
    where
        F: std::future::Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(location, provider = self.provider.name(), error = %e, "Weather provider failed");
                Err(AgentError::ProviderUnavailable {
                    location: location.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    location,
                    provider = self.provider.name(),
                    timeout_ms = self.timeout.as_millis(),
                    "Weather provider timed out"
                );
                Err(AgentError::ProviderUnavailable {
                    location: location.to_string(),
                    reason: format!("timed out after {}ms", self.timeout.as_millis()),
                })
            }
        }
    }

    fn reject_non_finite(location: &str, raw: &RawWeather) -> Result<(), AgentError> {
        if raw.is_finite() {
            return Ok(());
        }
        Err(AgentError::ProviderUnavailable {
            location: location.to_string(),
            reason: "reading contains non-finite values".to_string(),
        })
    }
}

#[async_trait]
impl WeatherSource for WeatherAgent {
    async fn fetch(&self, location: &str) -> Result<WeatherSnapshot, AgentError> {
        Self::validate_location(location)?;
        let key = current_key(location);

        if let Some(mut snapshot) = self.current.get(&key).await {
            debug!(location, "Weather cache hit");
            // Entries are shared across casings of the same location.
            snapshot.location = location.trim().to_string();
            return Ok(snapshot);
        }

        let raw = self
            .call_provider(location, self.provider.current_weather(location.trim()))
            .await?;
        Self::reject_non_finite(location, &raw)?;

        let snapshot = self.derive(location, &raw);
        info!(
            location,
            temperature_c = snapshot.temperature_c,
            solar = snapshot.solar_potential,
            wind = snapshot.wind_potential,
            score = snapshot.renewable_score,
            "Weather fetched"
        );
        self.current.put(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn forecast_extended(
        &self,
        location: &str,
        days: u32,
    ) -> Result<Vec<WeatherSnapshot>, AgentError> {
        Self::validate_location(location)?;
        let days = days.clamp(1, MAX_FORECAST_DAYS);
        let key = forecast_key(location);

        let series = match self.forecasts.get(&key).await {
            Some(series) => {
                debug!(location, "Forecast cache hit");
                series
            }
            None => {
                let raws = self
                    .call_provider(location, self.provider.forecast_5day(location.trim()))
                    .await?;
                for raw in &raws {
                    Self::reject_non_finite(location, raw)?;
                }
                let mut series: Vec<WeatherSnapshot> =
                    raws.iter().map(|raw| self.derive(location, raw)).collect();
                series.sort_by_key(|s| s.timestamp);
                info!(location, entries = series.len(), "Forecast fetched");
                self.forecasts.put(key, series.clone()).await;
                series
            }
        };

        let horizon_end = self.clock.now() + ChronoDuration::days(i64::from(days));
        Ok(series
            .into_iter()
            .filter(|s| s.timestamp <= horizon_end)
            .map(|mut s| {
                s.location = location.trim().to_string();
                s
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wind_curve_zero_below_cut_in() {
        let curve = WindCurve::default();
        assert_eq!(curve.potential(0.0), 0.0);
        assert_eq!(curve.potential(2.99), 0.0);
        assert_eq!(curve.potential(-4.0), 0.0);
    }

    #[test]
    fn wind_curve_saturates_at_rated() {
        let curve = WindCurve::default();
        assert_eq!(curve.potential(12.0), 1.0);
        assert_eq!(curve.potential(40.0), 1.0);
    }

    #[test]
    fn wind_curve_is_cubic_between() {
        let curve = WindCurve::default();
        let expected = (7.5f64.powi(3) - 27.0) / (1728.0 - 27.0);
        assert!((curve.potential(7.5) - expected).abs() < 1e-12);
        // Non-linear: the midpoint speed yields far less than half output.
        assert!(curve.potential(7.5) < 0.5);
    }

    #[test]
    fn wind_curve_monotonic_without_cut_out() {
        let curve = WindCurve::default();
        let mut last = 0.0;
        for step in 0..=300 {
            let p = curve.potential(step as f64 * 0.1);
            assert!(p >= last);
            assert!((0.0..=1.0).contains(&p));
            last = p;
        }
    }

    #[test]
    fn wind_curve_cut_out() {
        let curve = WindCurve {
            cut_out_ms: Some(25.0),
            ..WindCurve::default()
        };
        assert_eq!(curve.potential(25.0), 1.0);
        assert_eq!(curve.potential(25.1), 0.0);
    }

    #[test]
    fn solar_potential_bounds() {
        assert_eq!(solar_potential(0.0), 1.0);
        assert_eq!(solar_potential(1.0), 0.0);
        assert!((solar_potential(0.25) - 0.75).abs() < 1e-12);
        assert_eq!(solar_potential(1.3), 0.0);
        assert_eq!(solar_potential(-0.5), 1.0);
    }

    #[test]
    fn keys_are_normalized() {
        assert_eq!(current_key("  Colombo "), "weather:current:colombo");
        assert_eq!(forecast_key("JAFFNA"), "weather:forecast:jaffna");
    }
}
