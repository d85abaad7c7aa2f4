pub mod config;
pub mod cycle;
pub mod demand;
pub mod grid;
pub mod record;
pub mod weather;

pub use config::{
    CacheConfig, ConfigError, DemandConfig, GridConfig, GridcastConfig, PersistenceConfig,
    WeatherConfig,
};
pub use cycle::{CycleResult, DailyOutlook, Outlook, PeakStatistics};
pub use demand::{DemandFactors, DemandForecast};
pub use grid::{BalanceStatus, EnergyMix, GridBalanceResult, StorageState};
pub use record::PipelineRecord;
pub use weather::{RawWeather, WeatherSnapshot};
