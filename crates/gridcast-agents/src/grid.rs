use gridcast_models::grid::MIX_EPSILON;
use gridcast_models::{
    BalanceStatus, DemandForecast, EnergyMix, GridBalanceResult, GridConfig, StorageState,
    WeatherSnapshot,
};
use tracing::{debug, error};

use crate::error::AgentError;

/// Storage level below which operators are told to prioritise recharging.
const LOW_STORAGE_LEVEL: f64 = 0.2;
/// Slack allowed on the storage level before clamping.
const LEVEL_EPSILON: f64 = 1e-9;

/// Grid capability used by the coordinator.
pub trait GridBalancer: Send + Sync {
    /// Dispatch sources to meet `demand` in priority order.
    ///
    /// `storage` is only written when a valid result is returned.
    fn balance(
        &self,
        demand: &DemandForecast,
        snapshot: &WeatherSnapshot,
        storage: &mut StorageState,
    ) -> Result<GridBalanceResult, AgentError>;

    /// Storage level a location starts from before its first cycle.
    fn initial_storage(&self) -> StorageState;
}

/// Priority-dispatch balancer: renewables first, then storage, then conventional.
pub struct GridBalancerAgent {
    config: GridConfig,
}

/// Flows computed for one cycle, before they are checked.
#[derive(Debug, Clone, Copy)]
struct Dispatch {
    available: f64,
    mix: EnergyMix,
    charged: f64,
    curtailed: f64,
    level_after: f64,
}

impl GridBalancerAgent {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    fn renewable_available(&self, demand_mw: f64, score: f64) -> f64 {
        match self.config.renewable_capacity_mw {
            Some(capacity) => capacity * score,
            None => demand_mw * score,
        }
    }

    fn dispatch(&self, demand_mw: f64, score: f64, storage: StorageState) -> Dispatch {
        let level = storage.level_fraction;
        let capacity = self.config.storage_capacity_mw;
        let available = self.renewable_available(demand_mw, score);
        let renewable = available.min(demand_mw);
        let mut residual = demand_mw - renewable;
        let mut level_after = level;
        let mut discharged = 0.0;
        let mut charged = 0.0;
        let mut curtailed = 0.0;

        if residual > 0.0 {
            if !storage.is_empty() && capacity > 0.0 {
                let max_discharge = capacity * self.config.max_discharge_ratio * level;
                discharged = residual.min(max_discharge);
                level_after -= discharged / capacity;
                residual -= discharged;
            }
        } else if available > demand_mw {
            let surplus = available - demand_mw;
            if !storage.is_full() && capacity > 0.0 {
                charged = surplus.min((1.0 - level) * capacity);
                level_after += charged / capacity;
            }
            curtailed = surplus - charged;
        }

        Dispatch {
            available,
            mix: EnergyMix {
                renewable,
                storage: discharged,
                conventional: residual.max(0.0),
            },
            charged,
            curtailed,
            level_after,
        }
    }

    fn check(
        &self,
        demand: &DemandForecast,
        snapshot: &WeatherSnapshot,
        level: f64,
        dispatch: &Dispatch,
    ) -> Result<(), AgentError> {
        let demand_mw = demand.predicted_demand_mw;
        let violation = if !snapshot.potentials_in_range() {
            Some("weather potentials outside [0, 1]".to_string())
        } else if !dispatch.mix.is_non_negative() {
            Some(format!("negative source in energy mix: {:?}", dispatch.mix))
        } else if (dispatch.mix.total() - demand_mw).abs() > MIX_EPSILON {
            Some(format!(
                "energy mix sums to {} MW but demand is {} MW",
                dispatch.mix.total(),
                demand_mw
            ))
        } else if !(-LEVEL_EPSILON..=1.0 + LEVEL_EPSILON).contains(&dispatch.level_after) {
            Some(format!("storage level {} outside [0, 1]", dispatch.level_after))
        } else {
            None
        };

        match violation {
            None => Ok(()),
            Some(reason) => {
                error!(
                    location = %demand.location,
                    reason = %reason,
                    ?demand,
                    ?snapshot,
                    storage_level = level,
                    ?dispatch,
                    config = ?self.config,
                    "Grid balance invariant violated"
                );
                Err(AgentError::InvariantViolation(reason))
            }
        }
    }

    fn recommendations(
        &self,
        status: BalanceStatus,
        dispatch: &Dispatch,
        renewable_percentage: f64,
        level: f64,
    ) -> Vec<String> {
        let mut out = Vec::new();
        match status {
            BalanceStatus::Deficit => {
                out.push(format!(
                    "Power shortage: {:.2} MW of conventional generation exceeds firm capacity of {:.2} MW, load shedding may be required",
                    dispatch.mix.conventional, self.config.conventional_capacity_mw
                ));
                out.push("Implement demand response to reduce load".to_string());
            }
            BalanceStatus::Surplus => {
                out.push(format!(
                    "Excess renewable energy: {:.2} MW",
                    dispatch.charged + dispatch.curtailed
                ));
                if dispatch.curtailed > 0.0 {
                    out.push(format!(
                        "Curtailing {:.2} MW; consider additional storage or export to neighbouring grids",
                        dispatch.curtailed
                    ));
                }
            }
            BalanceStatus::Balanced => {
                if dispatch.mix.conventional > 0.0 {
                    out.push("Conventional generators activated to meet demand".to_string());
                }
            }
        }
        if level < LOW_STORAGE_LEVEL {
            out.push("Storage below 20%, prioritise charging when renewables recover".to_string());
        }
        if renewable_percentage < 30.0 {
            out.push("Low renewable share, optimise conventional generation scheduling".to_string());
        }
        out
    }
}

impl GridBalancer for GridBalancerAgent {
    fn balance(
        &self,
        demand: &DemandForecast,
        snapshot: &WeatherSnapshot,
        storage: &mut StorageState,
    ) -> Result<GridBalanceResult, AgentError> {
        let demand_mw = demand.predicted_demand_mw;
        if !(demand_mw.is_finite() && demand_mw > 0.0) {
            error!(location = %demand.location, ?demand, "Demand must be positive");
            return Err(AgentError::InvariantViolation(format!(
                "demand must be positive, got {demand_mw}"
            )));
        }

        let level = storage.level_fraction;
        let dispatch = self.dispatch(demand_mw, snapshot.renewable_score, *storage);
        self.check(demand, snapshot, level, &dispatch)?;

        let level_after = dispatch.level_after.clamp(0.0, 1.0);
        let mix = dispatch.mix;
        let renewable_percentage = 100.0 * mix.renewable / demand_mw;
        let conventional_share = mix.conventional / demand_mw;

        let balance_status = if mix.conventional > self.config.conventional_capacity_mw {
            BalanceStatus::Deficit
        } else if dispatch.charged > 0.0 || dispatch.curtailed > 0.0 {
            BalanceStatus::Surplus
        } else {
            BalanceStatus::Balanced
        };

        let result = GridBalanceResult {
            location: demand.location.clone(),
            timestamp: demand.timestamp,
            demand_mw,
            energy_mix: mix,
            renewable_percentage,
            storage_level_fraction: level_after,
            renewable_available_mw: dispatch.available,
            storage_charged_mw: dispatch.charged,
            curtailed_mw: dispatch.curtailed,
            grid_frequency_hz: self.config.nominal_frequency_hz
                - conventional_share * self.config.max_frequency_deviation_hz,
            voltage_kv: self.config.nominal_voltage_kv
                * (1.0 - conventional_share * self.config.max_voltage_deviation),
            balance_status,
            carbon_intensity_g_per_kwh: conventional_share * self.config.emission_g_per_kwh,
            recommendations: self.recommendations(
                balance_status,
                &dispatch,
                renewable_percentage,
                level_after,
            ),
        };

        storage.level_fraction = level_after;
        debug!(
            location = %result.location,
            renewable_mw = mix.renewable,
            storage_mw = mix.storage,
            conventional_mw = mix.conventional,
            level_before = level,
            level_after,
            status = ?balance_status,
            "Grid balanced"
        );
        Ok(result)
    }

    fn initial_storage(&self) -> StorageState {
        StorageState::new(self.config.initial_storage_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gridcast_models::DemandFactors;

    fn config(capacity: f64) -> GridConfig {
        GridConfig {
            storage_capacity_mw: capacity,
            ..GridConfig::default()
        }
    }

    fn demand(mw: f64) -> DemandForecast {
        DemandForecast {
            location: "Colombo".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 4, 15, 18, 0, 0).unwrap(),
            predicted_demand_mw: mw,
            confidence: 0.95,
            is_peak: true,
            factors: DemandFactors {
                base_mw: 1000.0,
                hourly: 1.0,
                seasonal: 1.0,
                weather: 1.0,
                weekend: 1.0,
                noise: 1.0,
                local_hour: 18,
            },
        }
    }

    fn weather(score: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            location: "Colombo".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 4, 15, 18, 0, 0).unwrap(),
            temperature_c: 21.0,
            humidity_percent: 60.0,
            wind_speed_ms: 5.0,
            cloud_cover: 0.4,
            condition: "Clouds".to_string(),
            utc_offset_seconds: 0,
            solar_potential: 0.6,
            wind_potential: 0.6,
            renewable_score: score,
        }
    }

    #[test]
    fn priority_dispatch_scenario() {
        let agent = GridBalancerAgent::new(config(200.0));
        let mut storage = StorageState::new(0.5);
        let result = agent.balance(&demand(1000.0), &weather(0.6), &mut storage).unwrap();

        assert!((result.energy_mix.renewable - 600.0).abs() < 1e-9);
        assert!((result.energy_mix.storage - 80.0).abs() < 1e-9);
        assert!((result.energy_mix.conventional - 320.0).abs() < 1e-9);
        assert!((storage.level_fraction - 0.1).abs() < 1e-9);
        assert_eq!(result.storage_level_fraction, storage.level_fraction);
        assert!((result.renewable_percentage - 60.0).abs() < 1e-9);
        assert_eq!(result.balance_status, BalanceStatus::Balanced);
    }

    #[test]
    fn health_indicators_follow_conventional_share() {
        let agent = GridBalancerAgent::new(config(200.0));
        let mut storage = StorageState::new(0.5);
        let result = agent.balance(&demand(1000.0), &weather(0.6), &mut storage).unwrap();

        // conventional share 0.32
        assert!((result.grid_frequency_hz - 49.84).abs() < 1e-9);
        assert!((result.voltage_kv - 230.0 * (1.0 - 0.016)).abs() < 1e-9);
        assert!((result.carbon_intensity_g_per_kwh - 152.0).abs() < 1e-9);
    }

    #[test]
    fn empty_storage_falls_back_to_conventional() {
        let agent = GridBalancerAgent::new(config(200.0));
        let mut storage = StorageState::new(0.0);
        let result = agent.balance(&demand(1000.0), &weather(0.3), &mut storage).unwrap();

        assert_eq!(result.energy_mix.storage, 0.0);
        assert!((result.energy_mix.conventional - 700.0).abs() < 1e-9);
        assert_eq!(storage.level_fraction, 0.0);
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.starts_with("Storage below 20%")));
    }

    #[test]
    fn full_renewables_leave_storage_untouched() {
        let agent = GridBalancerAgent::new(config(200.0));
        let mut storage = StorageState::new(0.4);
        let result = agent.balance(&demand(1000.0), &weather(1.0), &mut storage).unwrap();

        assert_eq!(result.energy_mix.renewable, 1000.0);
        assert_eq!(result.energy_mix.storage, 0.0);
        assert_eq!(result.energy_mix.conventional, 0.0);
        assert_eq!(storage.level_fraction, 0.4);
        assert_eq!(result.grid_frequency_hz, 50.0);
        assert_eq!(result.voltage_kv, 230.0);
    }

    #[test]
    fn surplus_charges_storage_with_headroom() {
        let agent = GridBalancerAgent::new(GridConfig {
            storage_capacity_mw: 200.0,
            renewable_capacity_mw: Some(1500.0),
            ..GridConfig::default()
        });
        let mut storage = StorageState::new(0.5);
        // 1500 * 0.8 = 1200 available against 1000 demand.
        let result = agent.balance(&demand(1000.0), &weather(0.8), &mut storage).unwrap();

        assert!((result.renewable_available_mw - 1200.0).abs() < 1e-9);
        assert_eq!(result.energy_mix.renewable, 1000.0);
        assert!((result.storage_charged_mw - 100.0).abs() < 1e-9);
        assert!((result.curtailed_mw - 100.0).abs() < 1e-9);
        assert_eq!(storage.level_fraction, 1.0);
        assert_eq!(result.balance_status, BalanceStatus::Surplus);
    }

    #[test]
    fn surplus_with_full_storage_is_curtailed() {
        let agent = GridBalancerAgent::new(GridConfig {
            storage_capacity_mw: 200.0,
            renewable_capacity_mw: Some(2000.0),
            ..GridConfig::default()
        });
        let mut storage = StorageState::new(1.0);
        let result = agent.balance(&demand(1000.0), &weather(0.75), &mut storage).unwrap();

        assert_eq!(result.energy_mix.renewable, 1000.0);
        assert_eq!(result.energy_mix.storage, 0.0);
        assert_eq!(result.energy_mix.conventional, 0.0);
        assert_eq!(result.storage_charged_mw, 0.0);
        assert!((result.curtailed_mw - 500.0).abs() < 1e-9);
        assert_eq!(storage.level_fraction, 1.0);
        assert!(result.recommendations.iter().any(|r| r.starts_with("Curtailing")));
    }

    #[test]
    fn deficit_when_conventional_exceeds_firm_capacity() {
        let agent = GridBalancerAgent::new(config(200.0));
        let mut storage = StorageState::new(0.0);
        let result = agent.balance(&demand(5000.0), &weather(0.1), &mut storage).unwrap();

        assert!((result.energy_mix.conventional - 4500.0).abs() < 1e-9);
        assert_eq!(result.balance_status, BalanceStatus::Deficit);
        assert!(result.recommendations[0].starts_with("Power shortage"));
    }

    #[test]
    fn invalid_potentials_leave_storage_unchanged() {
        let agent = GridBalancerAgent::new(config(200.0));
        let mut storage = StorageState::new(0.5);
        let mut snapshot = weather(0.6);
        snapshot.solar_potential = 1.7;

        let err = agent.balance(&demand(1000.0), &snapshot, &mut storage).unwrap_err();
        assert!(matches!(err, AgentError::InvariantViolation(_)));
        assert_eq!(storage.level_fraction, 0.5);
    }

    #[test]
    fn non_positive_demand_rejected() {
        let agent = GridBalancerAgent::new(config(200.0));
        let mut storage = StorageState::new(0.5);
        let err = agent.balance(&demand(0.0), &weather(0.6), &mut storage).unwrap_err();
        assert!(matches!(err, AgentError::InvariantViolation(_)));
        assert_eq!(storage.level_fraction, 0.5);
    }

    #[test]
    fn level_stays_bounded_over_many_cycles() {
        let agent = GridBalancerAgent::new(GridConfig {
            storage_capacity_mw: 200.0,
            renewable_capacity_mw: Some(1400.0),
            ..GridConfig::default()
        });
        let mut storage = StorageState::new(0.5);
        let scores = [0.0, 0.1, 0.95, 1.0, 0.3, 0.85, 0.05, 0.99, 0.5, 0.72];
        let demands = [900.0, 1250.0, 700.0, 1000.0, 1300.0, 800.0];

        for i in 0..500 {
            let score = scores[i % scores.len()];
            let mw = demands[i % demands.len()];
            let result = agent.balance(&demand(mw), &weather(score), &mut storage).unwrap();

            assert!((0.0..=1.0).contains(&storage.level_fraction));
            assert!(result.energy_mix.is_non_negative());
            assert!((result.energy_mix.total() - mw).abs() <= MIX_EPSILON);
            assert!(!(result.storage_charged_mw > 0.0 && result.energy_mix.storage > 0.0));
        }
    }

    #[test]
    fn zero_capacity_storage_is_skipped() {
        let agent = GridBalancerAgent::new(config(0.0));
        let mut storage = StorageState::new(0.5);
        let result = agent.balance(&demand(1000.0), &weather(0.6), &mut storage).unwrap();
        assert_eq!(result.energy_mix.storage, 0.0);
        assert!((result.energy_mix.conventional - 400.0).abs() < 1e-9);
        assert_eq!(storage.level_fraction, 0.5);
    }

    #[test]
    fn initial_storage_from_config() {
        let agent = GridBalancerAgent::new(GridConfig {
            initial_storage_level: 0.25,
            ..GridConfig::default()
        });
        assert_eq!(agent.initial_storage().level_fraction, 0.25);
    }
}
