use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use gridcast_cache::Clock;
use gridcast_models::{DemandConfig, DemandFactors, DemandForecast, WeatherSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error};

use crate::error::AgentError;

/// Hourly multipliers are strictly above this value during peak hours.
pub const PEAK_THRESHOLD: f64 = 0.95;

/// Load shape by local hour of day. Bounded to [0.7, 1.3].
const HOURLY_CURVE: [f64; 24] = [
    0.75, 0.72, 0.70, 0.70, 0.72, 0.78, // 00-05
    0.88, 1.00, 1.10, 1.05, 1.00, 0.98, // 06-11
    1.00, 0.98, 0.95, 0.95, 1.00, 1.10, // 12-17
    1.20, 1.30, 1.25, 1.10, 0.95, 0.85, // 18-23
];

/// Load shape by month, January first. Bounded to [0.8, 1.2].
const SEASONAL_CURVE: [f64; 12] = [
    1.20, 1.15, 1.05, 1.00, 0.90, 0.85, 0.80, 0.85, 0.90, 1.00, 1.10, 1.15,
];

/// Confidence for an immediate forecast with no noise.
const BASE_CONFIDENCE: f64 = 0.95;
const CONFIDENCE_FLOOR: f64 = 0.05;
const NOISE_CONFIDENCE_PENALTY: f64 = 2.0;
const HORIZON_CONFIDENCE_PENALTY_PER_DAY: f64 = 0.03;

pub fn hourly_factor(hour: u32) -> f64 {
    HOURLY_CURVE[(hour % 24) as usize]
}

/// `month` is 1-based.
pub fn seasonal_factor(month: u32) -> f64 {
    SEASONAL_CURVE[((month.clamp(1, 12)) - 1) as usize]
}

/// Source of the multiplicative noise applied to each forecast.
pub trait NoiseSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Always 1.0. Makes forecasts fully deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn sample(&self) -> f64 {
        1.0
    }
}

/// Uniform noise in `[1 - amplitude, 1 + amplitude]`.
pub struct UniformNoise {
    amplitude: f64,
    rng: Mutex<StdRng>,
}

impl UniformNoise {
    pub fn new(amplitude: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            amplitude: amplitude.abs(),
            rng: Mutex::new(rng),
        }
    }
}

impl NoiseSource for UniformNoise {
    fn sample(&self) -> f64 {
        if self.amplitude == 0.0 {
            return 1.0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range((1.0 - self.amplitude)..=(1.0 + self.amplitude))
    }
}

/// Demand capability used by the coordinator.
pub trait DemandPredictor: Send + Sync {
    /// Forecast demand at `at` given the weather at `location`.
    fn predict(
        &self,
        location: &str,
        snapshot: &WeatherSnapshot,
        at: DateTime<Utc>,
    ) -> Result<DemandForecast, AgentError>;

    /// Hourly forecasts for the 24 hours starting at `start`, all from one snapshot.
    fn forecast_day(
        &self,
        location: &str,
        snapshot: &WeatherSnapshot,
        start: DateTime<Utc>,
    ) -> Result<Vec<DemandForecast>, AgentError> {
        (0..24)
            .map(|h| self.predict(location, snapshot, start + Duration::hours(h)))
            .collect()
    }
}

/// Formula-based demand forecaster.
///
/// ```text
/// demand = base_mw * hourly(hour) * seasonal(month) * weather(snapshot) * weekend * noise
/// ```
pub struct DemandAgent {
    config: DemandConfig,
    noise: Arc<dyn NoiseSource>,
    clock: Arc<dyn Clock>,
}

impl DemandAgent {
    pub fn new(config: DemandConfig, noise: Arc<dyn NoiseSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            noise,
            clock,
        }
    }

    /// Lower demand when on-site renewables are strong, higher outside the comfort band.
    pub fn weather_factor(&self, snapshot: &WeatherSnapshot) -> f64 {
        let score = snapshot.renewable_score.clamp(0.0, 1.0);
        let renewable = 1.0 - self.config.renewable_offset * score;

        let t = snapshot.temperature_c;
        let deviation = if t < self.config.comfort_low_c {
            self.config.comfort_low_c - t
        } else if t > self.config.comfort_high_c {
            t - self.config.comfort_high_c
        } else {
            0.0
        };
        let thermal = 1.0 + self.config.temperature_sensitivity * deviation;

        renewable * thermal
    }

    fn noise_factor(&self) -> f64 {
        let a = self.config.noise_amplitude.abs();
        self.noise.sample().clamp(1.0 - a, 1.0 + a)
    }

    fn confidence(&self, noise: f64, at: DateTime<Utc>) -> f64 {
        let horizon_days = (at - self.clock.now()).num_seconds().max(0) as f64 / 86_400.0;
        (BASE_CONFIDENCE
            - NOISE_CONFIDENCE_PENALTY * (noise - 1.0).abs()
            - HORIZON_CONFIDENCE_PENALTY_PER_DAY * horizon_days)
            .clamp(CONFIDENCE_FLOOR, 1.0)
    }
}

impl DemandPredictor for DemandAgent {
    fn predict(
        &self,
        location: &str,
        snapshot: &WeatherSnapshot,
        at: DateTime<Utc>,
    ) -> Result<DemandForecast, AgentError> {
        let local = snapshot.local_time(at);
        let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);

        let factors = DemandFactors {
            base_mw: self.config.base_mw,
            hourly: hourly_factor(local.hour()),
            seasonal: seasonal_factor(local.month()),
            weather: self.weather_factor(snapshot),
            weekend: if weekend {
                self.config.weekend_factor
            } else {
                1.0
            },
            noise: self.noise_factor(),
            local_hour: local.hour(),
        };

        let demand = self.config.base_mw * factors.combined();
        if !(demand.is_finite() && demand > 0.0) {
            error!(location, ?factors, ?snapshot, "Non-positive demand forecast");
            return Err(AgentError::InvariantViolation(format!(
                "predicted demand must be positive, got {demand}"
            )));
        }

        let forecast = DemandForecast {
            location: location.trim().to_string(),
            timestamp: at,
            predicted_demand_mw: demand,
            confidence: self.confidence(factors.noise, at),
            is_peak: factors.hourly > PEAK_THRESHOLD,
            factors,
        };
        debug!(
            location,
            demand_mw = forecast.predicted_demand_mw,
            is_peak = forecast.is_peak,
            "Demand predicted"
        );
        Ok(forecast)
    }
}
