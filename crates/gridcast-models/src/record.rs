use serde::{Deserialize, Serialize};

use crate::cycle::CycleResult;
use crate::demand::DemandForecast;
use crate::grid::GridBalanceResult;
use crate::weather::WeatherSnapshot;

/// A single result handed to the persistence sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PipelineRecord {
    Weather(WeatherSnapshot),
    Demand(DemandForecast),
    Grid(GridBalanceResult),
}

impl PipelineRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineRecord::Weather(_) => "weather",
            PipelineRecord::Demand(_) => "demand",
            PipelineRecord::Grid(_) => "grid",
        }
    }

    pub fn location(&self) -> &str {
        match self {
            PipelineRecord::Weather(w) => &w.location,
            PipelineRecord::Demand(d) => &d.location,
            PipelineRecord::Grid(g) => &g.location,
        }
    }

    /// Split a cycle into its three records, in pipeline order.
    pub fn from_cycle(cycle: &CycleResult) -> [PipelineRecord; 3] {
        [
            PipelineRecord::Weather(cycle.weather.clone()),
            PipelineRecord::Demand(cycle.demand.clone()),
            PipelineRecord::Grid(cycle.grid.clone()),
        ]
    }
}
