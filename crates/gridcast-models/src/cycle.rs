use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::demand::DemandForecast;
use crate::grid::GridBalanceResult;
use crate::weather::WeatherSnapshot;

/// The composite output of one pipeline cycle for a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleResult {
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub weather: WeatherSnapshot,
    pub demand: DemandForecast,
    pub grid: GridBalanceResult,
}

/// Multi-day weather and demand outlook for a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outlook {
    pub location: String,
    pub generated_at: DateTime<Utc>,
    pub weather: Vec<WeatherSnapshot>,
    pub demand: Vec<DemandForecast>,
    pub daily: Vec<DailyOutlook>,
    pub peak_statistics: Option<PeakStatistics>,
}

/// One local calendar day of an outlook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyOutlook {
    pub date: NaiveDate,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub avg_renewable_score: f64,
    pub avg_demand_mw: f64,
    pub peak_demand_mw: f64,
    /// Local hour of the highest forecast demand that day.
    pub peak_hour: u32,
}

impl DailyOutlook {
    /// Summarise paired weather/demand entries by local calendar day.
    ///
    /// `weather[i]` must be the snapshot `demand[i]` was predicted from.
    /// Days are returned in chronological order.
    pub fn summarise(weather: &[WeatherSnapshot], demand: &[DemandForecast]) -> Vec<DailyOutlook> {
        let mut days: Vec<DailyOutlook> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();

        for (snapshot, forecast) in weather.iter().zip(demand) {
            let local = snapshot.local_time(forecast.timestamp);
            let date = local.date_naive();
            let hour = local.hour();

            match days.iter().position(|d| d.date == date) {
                Some(idx) => {
                    let day = &mut days[idx];
                    let n = counts[idx] as f64;
                    day.temp_min_c = day.temp_min_c.min(snapshot.temperature_c);
                    day.temp_max_c = day.temp_max_c.max(snapshot.temperature_c);
                    day.avg_renewable_score =
                        (day.avg_renewable_score * n + snapshot.renewable_score) / (n + 1.0);
                    day.avg_demand_mw =
                        (day.avg_demand_mw * n + forecast.predicted_demand_mw) / (n + 1.0);
                    if forecast.predicted_demand_mw > day.peak_demand_mw {
                        day.peak_demand_mw = forecast.predicted_demand_mw;
                        day.peak_hour = hour;
                    }
                    counts[idx] += 1;
                }
                None => {
                    days.push(DailyOutlook {
                        date,
                        temp_min_c: snapshot.temperature_c,
                        temp_max_c: snapshot.temperature_c,
                        avg_renewable_score: snapshot.renewable_score,
                        avg_demand_mw: forecast.predicted_demand_mw,
                        peak_demand_mw: forecast.predicted_demand_mw,
                        peak_hour: hour,
                    });
                    counts.push(1);
                }
            }
        }

        days.sort_by_key(|d| d.date);
        days
    }
}

/// Summary statistics over a series of demand forecasts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeakStatistics {
    pub max_demand_mw: f64,
    pub min_demand_mw: f64,
    pub avg_demand_mw: f64,
    pub peak_at: DateTime<Utc>,
    pub peak_hours: usize,
}

impl PeakStatistics {
    /// Returns `None` for an empty series.
    pub fn from_forecasts(forecasts: &[DemandForecast]) -> Option<Self> {
        let first = forecasts.first()?;
        let mut max = first;
        let mut min = first.predicted_demand_mw;
        let mut sum = 0.0;
        for f in forecasts {
            if f.predicted_demand_mw > max.predicted_demand_mw {
                max = f;
            }
            min = min.min(f.predicted_demand_mw);
            sum += f.predicted_demand_mw;
        }
        Some(Self {
            max_demand_mw: max.predicted_demand_mw,
            min_demand_mw: min,
            avg_demand_mw: sum / forecasts.len() as f64,
            peak_at: max.timestamp,
            peak_hours: forecasts.iter().filter(|f| f.is_peak).count(),
        })
    }
}
