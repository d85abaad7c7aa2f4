use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Top-level configuration for gridcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GridcastConfig {
    pub cache: CacheConfig,
    pub weather: WeatherConfig,
    pub demand: DemandConfig,
    pub grid: GridConfig,
    pub persistence: PersistenceConfig,
}

impl GridcastConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_seconds == 0 {
            return Err(invalid("cache.ttl_seconds", "must be positive"));
        }
        if self.weather.timeout_seconds == 0 {
            return Err(invalid("weather.timeout_seconds", "must be positive"));
        }
        if !(self.weather.cut_in_speed_ms >= 0.0
            && self.weather.rated_speed_ms > self.weather.cut_in_speed_ms)
        {
            return Err(invalid(
                "weather.rated_speed_ms",
                "must be greater than a non-negative cut-in speed",
            ));
        }
        if let Some(cut_out) = self.weather.cut_out_speed_ms {
            if cut_out <= self.weather.rated_speed_ms {
                return Err(invalid("weather.cut_out_speed_ms", "must exceed rated speed"));
            }
        }
        let weights = self.weather.solar_weight + self.weather.wind_weight;
        if self.weather.solar_weight < 0.0
            || self.weather.wind_weight < 0.0
            || (weights - 1.0).abs() > 1e-9
        {
            return Err(invalid(
                "weather.solar_weight",
                "solar and wind weights must be non-negative and sum to 1",
            ));
        }
        if !(self.demand.base_mw > 0.0) {
            return Err(invalid("demand.base_mw", "must be positive"));
        }
        if self.demand.comfort_low_c > self.demand.comfort_high_c {
            return Err(invalid("demand.comfort_low_c", "must not exceed comfort_high_c"));
        }
        if !(0.0..1.0).contains(&self.demand.renewable_offset) {
            return Err(invalid("demand.renewable_offset", "must be within [0, 1)"));
        }
        if !(0.0..0.5).contains(&self.demand.noise_amplitude) {
            return Err(invalid("demand.noise_amplitude", "must be within [0, 0.5)"));
        }
        if !(self.demand.weekend_factor > 0.0) {
            return Err(invalid("demand.weekend_factor", "must be positive"));
        }
        if !(self.grid.storage_capacity_mw >= 0.0) {
            return Err(invalid("grid.storage_capacity_mw", "must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.grid.max_discharge_ratio) {
            return Err(invalid("grid.max_discharge_ratio", "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.grid.initial_storage_level) {
            return Err(invalid("grid.initial_storage_level", "must be within [0, 1]"));
        }
        if let Some(capacity) = self.grid.renewable_capacity_mw {
            if !(capacity >= 0.0) {
                return Err(invalid("grid.renewable_capacity_mw", "must not be negative"));
            }
        }
        if self.persistence.enabled && self.persistence.sqlite_path.trim().is_empty() {
            return Err(invalid("persistence.sqlite_path", "must be set when enabled"));
        }
        if self.persistence.cleanup_interval_seconds == 0 {
            return Err(invalid("persistence.cleanup_interval_seconds", "must be positive"));
        }
        Ok(())
    }
}

/// Time-bounded cache shared by the agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds after which a cached value is treated as absent.
    pub ttl_seconds: u64,
    /// Maximum number of entries per agent cache.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_capacity: 1_000,
        }
    }
}

/// Weather provider access and renewable potential derivation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    /// API key. When absent, read from the environment variable named by `api_key_env`.
    pub api_key: Option<String>,
    pub api_key_env: String,
    /// Upper bound on a single provider call.
    pub timeout_seconds: u64,
    pub cut_in_speed_ms: f64,
    pub rated_speed_ms: f64,
    /// Turbines shut down above this speed. `None` keeps output saturated.
    pub cut_out_speed_ms: Option<f64>,
    pub solar_weight: f64,
    pub wind_weight: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: None,
            api_key_env: "OPENWEATHER_API_KEY".to_string(),
            timeout_seconds: 10,
            cut_in_speed_ms: 3.0,
            rated_speed_ms: 12.0,
            cut_out_speed_ms: None,
            solar_weight: 0.5,
            wind_weight: 0.5,
        }
    }
}

impl WeatherConfig {
    /// Resolve the API key from config first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Demand model parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemandConfig {
    /// Baseline load in MW before any multiplier.
    pub base_mw: f64,
    pub comfort_low_c: f64,
    pub comfort_high_c: f64,
    /// Fractional demand increase per degree outside the comfort band.
    pub temperature_sensitivity: f64,
    /// Demand reduction at a renewable score of 1.0.
    pub renewable_offset: f64,
    /// Noise multiplier is drawn from `[1 - amplitude, 1 + amplitude]`.
    pub noise_amplitude: f64,
    /// Seed for reproducible noise. Random when absent.
    pub noise_seed: Option<u64>,
    /// Multiplier applied on Saturdays and Sundays.
    pub weekend_factor: f64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            base_mw: 1_000.0,
            comfort_low_c: 18.0,
            comfort_high_c: 24.0,
            temperature_sensitivity: 0.01,
            renewable_offset: 0.2,
            noise_amplitude: 0.05,
            noise_seed: None,
            weekend_factor: 1.0,
        }
    }
}

/// Dispatch and storage parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub storage_capacity_mw: f64,
    /// Largest share of capacity that can be discharged in one cycle, scaled by level.
    pub max_discharge_ratio: f64,
    /// Storage level assigned to a location on its first cycle.
    pub initial_storage_level: f64,
    /// Installed renewable capacity. When set, availability is
    /// `capacity * renewable_score` and may exceed demand; otherwise it is
    /// `demand * renewable_score`.
    pub renewable_capacity_mw: Option<f64>,
    /// Firm conventional capacity; exceeding it marks the cycle as a deficit.
    pub conventional_capacity_mw: f64,
    pub emission_g_per_kwh: f64,
    pub nominal_frequency_hz: f64,
    pub nominal_voltage_kv: f64,
    /// Frequency drop when demand is met entirely by conventional supply.
    pub max_frequency_deviation_hz: f64,
    /// Fractional voltage sag when demand is met entirely by conventional supply.
    pub max_voltage_deviation: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            storage_capacity_mw: 500.0,
            max_discharge_ratio: 0.8,
            initial_storage_level: 0.5,
            renewable_capacity_mw: None,
            conventional_capacity_mw: 3_000.0,
            emission_g_per_kwh: 475.0,
            nominal_frequency_hz: 50.0,
            nominal_voltage_kv: 230.0,
            max_frequency_deviation_hz: 0.5,
            max_voltage_deviation: 0.05,
        }
    }
}

/// Where cycle results are recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub sqlite_path: String,
    /// Records older than this many days are purged.
    pub retention_days: u32,
    pub cleanup_interval_seconds: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sqlite_path: "data/gridcast.db".to_string(),
            retention_days: 30,
            cleanup_interval_seconds: 3_600,
        }
    }
}
