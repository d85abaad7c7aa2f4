use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// An unprocessed reading as returned by a weather provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawWeather {
    pub observed_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_percent: f64,
    pub wind_speed_ms: f64,
    /// Cloud cover as a fraction, 0.0 (clear) to 1.0 (overcast).
    pub cloud_cover: f64,
    pub condition: String,
    /// Offset of the location's local time from UTC.
    #[serde(default)]
    pub utc_offset_seconds: i32,
}

impl RawWeather {
    /// True when every numeric field is a finite number.
    pub fn is_finite(&self) -> bool {
        [
            self.temperature_c,
            self.humidity_percent,
            self.wind_speed_ms,
            self.cloud_cover,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Weather conditions for a location plus the renewable potentials derived from them.
///
/// Snapshots are produced once by the weather agent and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherSnapshot {
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_percent: f64,
    pub wind_speed_ms: f64,
    pub cloud_cover: f64,
    pub condition: String,
    pub utc_offset_seconds: i32,
    /// 0.0 to 1.0, `1 - cloud_cover`.
    pub solar_potential: f64,
    /// 0.0 to 1.0, from the turbine power curve.
    pub wind_potential: f64,
    /// 0.0 to 1.0, weighted combination of solar and wind potential.
    pub renewable_score: f64,
}

impl WeatherSnapshot {
    /// Local time at the snapshot's location for an arbitrary UTC instant.
    pub fn local_time(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or(Utc.fix());
        at.with_timezone(&offset)
    }

    /// True when all derived potentials lie within [0, 1].
    pub fn potentials_in_range(&self) -> bool {
        [self.solar_potential, self.wind_potential, self.renewable_score]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    pub fn sample_snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            location: "Colombo".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 4, 15, 18, 0, 0).unwrap(),
            temperature_c: 21.0,
            humidity_percent: 70.0,
            wind_speed_ms: 6.0,
            cloud_cover: 0.4,
            condition: "Clouds".to_string(),
            utc_offset_seconds: 0,
            solar_potential: 0.6,
            wind_potential: 0.0,
            renewable_score: 0.3,
        }
    }

    #[test]
    fn local_time_applies_offset() {
        let mut snapshot = sample_snapshot();
        snapshot.utc_offset_seconds = 5 * 3600 + 1800;
        let local = snapshot.local_time(snapshot.timestamp);
        assert_eq!(local.hour(), 23);
        assert_eq!(local.minute(), 30);
    }

    #[test]
    fn invalid_offset_falls_back_to_utc() {
        let mut snapshot = sample_snapshot();
        snapshot.utc_offset_seconds = i32::MAX;
        assert_eq!(snapshot.local_time(snapshot.timestamp).hour(), 18);
    }

    #[test]
    fn non_finite_raw_reading_detected() {
        let raw = RawWeather {
            observed_at: Utc::now(),
            temperature_c: f64::NAN,
            humidity_percent: 50.0,
            wind_speed_ms: 3.0,
            cloud_cover: 0.2,
            condition: "Clear".to_string(),
            utc_offset_seconds: 0,
        };
        assert!(!raw.is_finite());
    }

    #[test]
    fn potentials_range_check() {
        let mut snapshot = sample_snapshot();
        assert!(snapshot.potentials_in_range());
        snapshot.wind_potential = 1.2;
        assert!(!snapshot.potentials_in_range());
    }
}
