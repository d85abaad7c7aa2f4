use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that the dispatched mix covers demand.
pub const MIX_EPSILON: f64 = 1e-6;

/// Storage state carried from one cycle to the next for a single location.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StorageState {
    /// 0.0 (empty) to 1.0 (full).
    pub level_fraction: f64,
}

impl StorageState {
    pub fn new(level_fraction: f64) -> Self {
        Self {
            level_fraction: level_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.level_fraction <= 0.0
    }

    pub fn is_full(&self) -> bool {
        self.level_fraction >= 1.0
    }
}

/// Megawatts supplied to demand by each source.
///
/// Storage is the discharge actually delivered; charging is reported on
/// [`GridBalanceResult::storage_charged_mw`] and never appears here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EnergyMix {
    pub renewable: f64,
    pub storage: f64,
    pub conventional: f64,
}

impl EnergyMix {
    pub fn total(&self) -> f64 {
        self.renewable + self.storage + self.conventional
    }

    /// Source name and supplied MW, in dispatch priority order.
    pub fn sources(&self) -> [(&'static str, f64); 3] {
        [
            ("renewable", self.renewable),
            ("storage", self.storage),
            ("conventional", self.conventional),
        ]
    }

    pub fn is_non_negative(&self) -> bool {
        self.sources().iter().all(|(_, mw)| *mw >= 0.0)
    }
}

/// Coarse classification of a dispatch outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    /// Conventional fallback exceeded the firm conventional capacity.
    Deficit,
    Balanced,
    /// Renewable output exceeded demand; surplus was stored or curtailed.
    Surplus,
}

/// Outcome of one priority-dispatch cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridBalanceResult {
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub demand_mw: f64,
    pub energy_mix: EnergyMix,
    /// 0 to 100, share of demand met by renewables.
    pub renewable_percentage: f64,
    /// Storage level after this cycle, 0.0 to 1.0.
    pub storage_level_fraction: f64,
    pub renewable_available_mw: f64,
    pub storage_charged_mw: f64,
    pub curtailed_mw: f64,
    pub grid_frequency_hz: f64,
    pub voltage_kv: f64,
    pub balance_status: BalanceStatus,
    pub carbon_intensity_g_per_kwh: f64,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_state_clamps_on_construction() {
        assert_eq!(StorageState::new(1.4).level_fraction, 1.0);
        assert_eq!(StorageState::new(-0.2).level_fraction, 0.0);
        assert!(StorageState::new(0.0).is_empty());
        assert!(StorageState::new(1.0).is_full());
    }

    #[test]
    fn mix_total_and_sign() {
        let mix = EnergyMix {
            renewable: 600.0,
            storage: 80.0,
            conventional: 320.0,
        };
        assert_eq!(mix.total(), 1000.0);
        assert!(mix.is_non_negative());
        assert_eq!(mix.sources()[0].0, "renewable");
    }

    #[test]
    fn mix_serializes_as_named_sources() {
        let mix = EnergyMix {
            renewable: 1.0,
            storage: 2.0,
            conventional: 3.0,
        };
        let json = serde_json::to_value(mix).unwrap();
        assert_eq!(json["renewable"], 1.0);
        assert_eq!(json["storage"], 2.0);
        assert_eq!(json["conventional"], 3.0);
    }

    #[test]
    fn balance_status_snake_case() {
        let json = serde_json::to_string(&BalanceStatus::Deficit).unwrap();
        assert_eq!(json, "\"deficit\"");
    }
}
