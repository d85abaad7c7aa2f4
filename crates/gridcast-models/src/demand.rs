use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Demand forecast for a location at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemandForecast {
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub predicted_demand_mw: f64,
    /// 0.0 to 1.0.
    pub confidence: f64,
    /// True when the hourly multiplier is above the peak threshold.
    pub is_peak: bool,
    pub factors: DemandFactors,
}

/// The multipliers that produced a forecast, kept for explanation and auditing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemandFactors {
    pub base_mw: f64,
    pub hourly: f64,
    pub seasonal: f64,
    pub weather: f64,
    pub weekend: f64,
    pub noise: f64,
    /// Local hour of day (0-23) the hourly multiplier was taken from.
    pub local_hour: u32,
}

impl DemandFactors {
    /// Product of all multipliers applied to the base load.
    pub fn combined(&self) -> f64 {
        self.hourly * self.seasonal * self.weather * self.weekend * self.noise
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_multiplies_every_factor() {
        let factors = DemandFactors {
            base_mw: 1000.0,
            hourly: 1.2,
            seasonal: 1.0,
            weather: 0.94,
            weekend: 1.0,
            noise: 1.0,
            local_hour: 18,
        };
        assert!((factors.combined() - 1.128).abs() < 1e-12);
    }
}
