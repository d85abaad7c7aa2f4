//! gridcast - weather-driven electricity demand forecasting and priority grid dispatch.
//!
//! A [`PipelineCoordinator`](agents::PipelineCoordinator) runs three agents in
//! order for a location: weather (with renewable potentials), demand, and grid
//! balance with per-location storage.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! # async fn demo() -> anyhow::Result<()> {
//! let config = gridcast::load_config(None)?;
//! let pipeline = gridcast::build_pipeline(&config)?;
//! let cycle = pipeline.coordinator.run_cycle("Colombo").await?;
//! println!("{}", serde_json::to_string(&cycle)?);
//! # Ok(())
//! # }
//! ```

pub use gridcast_agents as agents;
pub use gridcast_cache as cache;
pub use gridcast_models as models;
pub use gridcast_store as store;

pub mod scheduler;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use gridcast_agents::{
    DemandAgent, GridBalancerAgent, OpenWeatherProvider, PipelineCoordinator, UniformNoise,
    WeatherAgent, WeatherProvider,
};
use gridcast_cache::{Clock, SystemClock};
use gridcast_models::GridcastConfig;
use gridcast_store::SqliteSink;

/// A coordinator plus the record store behind it, if persistence is enabled.
#[derive(Clone)]
pub struct Pipeline {
    pub coordinator: PipelineCoordinator,
    pub store: Option<SqliteSink>,
}

/// Read, parse and validate a TOML config. `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<GridcastConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            parse_config(&text)?
        }
        None => GridcastConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn parse_config(text: &str) -> anyhow::Result<GridcastConfig> {
    toml::from_str(text).context("Failed to parse config")
}

/// Build the production pipeline: OpenWeatherMap, wall clock, seeded or random noise.
pub fn build_pipeline(config: &GridcastConfig) -> anyhow::Result<Pipeline> {
    let provider =
        OpenWeatherProvider::from_config(&config.weather).context("Failed to set up weather provider")?;
    assemble(config, Arc::new(provider), Arc::new(SystemClock))
}

/// Wire agents, storage and persistence around an arbitrary provider and clock.
pub fn assemble(
    config: &GridcastConfig,
    provider: Arc<dyn WeatherProvider>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Pipeline> {
    config.validate().context("Invalid configuration")?;
    let weather = WeatherAgent::new(provider, &config.weather, &config.cache, clock.clone());
    let noise = UniformNoise::new(config.demand.noise_amplitude, config.demand.noise_seed);
    let demand = DemandAgent::new(config.demand.clone(), Arc::new(noise), clock.clone());
    let grid = GridBalancerAgent::new(config.grid.clone());

    let mut coordinator =
        PipelineCoordinator::new(Arc::new(weather), Arc::new(demand), Arc::new(grid), clock);

    let store = if config.persistence.enabled {
        let sink = SqliteSink::open(&config.persistence.sqlite_path).with_context(|| {
            format!(
                "Failed to open record store: {}",
                config.persistence.sqlite_path
            )
        })?;
        coordinator = coordinator.with_sink(Arc::new(sink.clone()));
        Some(sink)
    } else {
        None
    };

    Ok(Pipeline { coordinator, store })
}
