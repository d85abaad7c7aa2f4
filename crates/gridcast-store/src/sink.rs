use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use gridcast_agents::{PersistenceSink, SinkError};
use gridcast_models::{BalanceStatus, PipelineRecord};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::schema::{RecordTable, RECORDS_DDL};

/// Fixed-width UTC timestamps so TEXT comparison orders chronologically.
fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn status_text(status: BalanceStatus) -> &'static str {
    match status {
        BalanceStatus::Deficit => "deficit",
        BalanceStatus::Balanced => "balanced",
        BalanceStatus::Surplus => "surplus",
    }
}

/// SQLite-backed persistence sink.
///
/// File databases use WAL journaling so readers can query while cycles write.
/// The connection is shared behind a mutex; async writes run on the blocking pool.
#[derive(Clone)]
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Open (creating if needed) the database at `path` and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(RECORDS_DDL)?;
        info!(path = %path.display(), "Opened record store");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(RECORDS_DDL)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert one record into the table for its kind.
    pub fn insert(&self, record: &PipelineRecord) -> Result<(), StoreError> {
        let conn = self.lock();
        let payload = serde_json::to_string(record)?;
        let recorded_at = timestamp_text(Utc::now());

        match record {
            PipelineRecord::Weather(w) => conn.execute(
                "INSERT INTO weather_records \
                 (location, timestamp, recorded_at, temperature_c, renewable_score, payload_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    w.location,
                    timestamp_text(w.timestamp),
                    recorded_at,
                    w.temperature_c,
                    w.renewable_score,
                    payload,
                ],
            )?,
            PipelineRecord::Demand(d) => conn.execute(
                "INSERT INTO demand_records \
                 (location, timestamp, recorded_at, predicted_demand_mw, confidence, is_peak, payload_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    d.location,
                    timestamp_text(d.timestamp),
                    recorded_at,
                    d.predicted_demand_mw,
                    d.confidence,
                    d.is_peak,
                    payload,
                ],
            )?,
            PipelineRecord::Grid(g) => conn.execute(
                "INSERT INTO grid_records \
                 (location, timestamp, recorded_at, renewable_mw, storage_mw, conventional_mw, \
                  storage_level, balance_status, payload_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    g.location,
                    timestamp_text(g.timestamp),
                    recorded_at,
                    g.energy_mix.renewable,
                    g.energy_mix.storage,
                    g.energy_mix.conventional,
                    g.storage_level_fraction,
                    status_text(g.balance_status),
                    payload,
                ],
            )?,
        };
        debug!(
            table = RecordTable::for_record(record).name(),
            location = record.location(),
            "Record stored"
        );
        Ok(())
    }

    /// Delete rows whose record timestamp is more than `days` days old.
    /// Returns the number of rows deleted across all tables.
    pub fn purge_older_than(&self, days: u32) -> Result<usize, StoreError> {
        let cutoff = timestamp_text(Utc::now() - Duration::days(i64::from(days)));
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for table in RecordTable::ALL {
            deleted += tx.execute(
                &format!("DELETE FROM {} WHERE timestamp < ?1", table.name()),
                params![cutoff],
            )?;
        }
        tx.commit()?;
        if deleted > 0 {
            info!(deleted, days, "Purged old records");
        }
        Ok(deleted)
    }

    pub fn count(&self, table: RecordTable) -> Result<usize, StoreError> {
        let conn = self.lock();
        let count: usize = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Stored payloads for `location` in `table`, oldest first.
    pub fn payloads(
        &self,
        table: RecordTable,
        location: &str,
    ) -> Result<Vec<PipelineRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT payload_json FROM {} WHERE location = ?1 ORDER BY timestamp, id",
            table.name()
        ))?;
        let rows = stmt.query_map(params![location], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }

    /// Async wrapper over [`Self::purge_older_than`] for the scheduler.
    pub async fn purge_older_than_blocking(&self, days: u32) -> Result<usize, StoreError> {
        let sink = self.clone();
        tokio::task::spawn_blocking(move || sink.purge_older_than(days))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl PersistenceSink for SqliteSink {
    async fn record(&self, record: PipelineRecord) -> Result<(), SinkError> {
        let sink = self.clone();
        tokio::task::spawn_blocking(move || sink.insert(&record))
            .await
            .map_err(|e| SinkError(format!("writer task failed: {e}")))?
            .map_err(|e| SinkError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gridcast_models::{
        DemandFactors, DemandForecast, EnergyMix, GridBalanceResult, WeatherSnapshot,
    };

    fn weather(location: &str, at: DateTime<Utc>) -> PipelineRecord {
        PipelineRecord::Weather(WeatherSnapshot {
            location: location.to_string(),
            timestamp: at,
            temperature_c: 21.0,
            humidity_percent: 70.0,
            wind_speed_ms: 2.0,
            cloud_cover: 0.4,
            condition: "Clouds".to_string(),
            utc_offset_seconds: 0,
            solar_potential: 0.6,
            wind_potential: 0.0,
            renewable_score: 0.3,
        })
    }

    fn demand(location: &str, at: DateTime<Utc>) -> PipelineRecord {
        PipelineRecord::Demand(DemandForecast {
            location: location.to_string(),
            timestamp: at,
            predicted_demand_mw: 1128.0,
            confidence: 0.95,
            is_peak: true,
            factors: DemandFactors {
                base_mw: 1000.0,
                hourly: 1.2,
                seasonal: 1.0,
                weather: 0.94,
                weekend: 1.0,
                noise: 1.0,
                local_hour: 18,
            },
        })
    }

    fn grid(location: &str, at: DateTime<Utc>) -> PipelineRecord {
        PipelineRecord::Grid(GridBalanceResult {
            location: location.to_string(),
            timestamp: at,
            demand_mw: 1000.0,
            energy_mix: EnergyMix {
                renewable: 600.0,
                storage: 80.0,
                conventional: 320.0,
            },
            renewable_percentage: 60.0,
            storage_level_fraction: 0.1,
            renewable_available_mw: 600.0,
            storage_charged_mw: 0.0,
            curtailed_mw: 0.0,
            grid_frequency_hz: 49.84,
            voltage_kv: 226.32,
            balance_status: BalanceStatus::Balanced,
            carbon_intensity_g_per_kwh: 152.0,
            recommendations: vec![],
        })
    }

    #[test]
    fn insert_routes_by_kind() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let now = Utc::now();
        sink.insert(&weather("Colombo", now)).unwrap();
        sink.insert(&demand("Colombo", now)).unwrap();
        sink.insert(&grid("Colombo", now)).unwrap();
        sink.insert(&grid("Kandy", now)).unwrap();

        assert_eq!(sink.count(RecordTable::Weather).unwrap(), 1);
        assert_eq!(sink.count(RecordTable::Demand).unwrap(), 1);
        assert_eq!(sink.count(RecordTable::Grid).unwrap(), 2);
    }

    #[test]
    fn payload_reads_back_equal() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let record = grid("Colombo", Utc::now());
        sink.insert(&record).unwrap();

        let stored = sink.payloads(RecordTable::Grid, "Colombo").unwrap();
        assert_eq!(stored.len(), 1);
        match &stored[0] {
            PipelineRecord::Grid(g) => {
                assert_eq!(g.energy_mix.storage, 80.0);
                assert_eq!(g.balance_status, BalanceStatus::Balanced);
            }
            other => panic!("expected grid record, got {}", other.kind()),
        }
        assert_eq!(stored[0].location(), record.location());
        assert!(sink.payloads(RecordTable::Grid, "Kandy").unwrap().is_empty());
    }

    #[test]
    fn purge_removes_only_old_rows() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let now = Utc::now();
        for record in [
            weather("Colombo", old),
            demand("Colombo", old),
            grid("Colombo", old),
            weather("Colombo", now),
            grid("Colombo", now),
        ] {
            sink.insert(&record).unwrap();
        }

        assert_eq!(sink.purge_older_than(30).unwrap(), 3);
        assert_eq!(sink.count(RecordTable::Weather).unwrap(), 1);
        assert_eq!(sink.count(RecordTable::Demand).unwrap(), 0);
        assert_eq!(sink.count(RecordTable::Grid).unwrap(), 1);
    }

    #[test]
    fn timestamps_sort_as_text() {
        let a = Utc.with_ymd_and_hms(2026, 4, 15, 18, 0, 0).unwrap();
        let b = a + Duration::milliseconds(1);
        assert!(timestamp_text(a) < timestamp_text(b));
        assert_eq!(timestamp_text(a), "2026-04-15T18:00:00.000Z");
    }

    #[tokio::test]
    async fn sink_trait_writes_on_blocking_pool() {
        let sink = SqliteSink::open_in_memory().unwrap();
        sink.record(demand("Colombo", Utc::now())).await.unwrap();
        assert_eq!(sink.count(RecordTable::Demand).unwrap(), 1);
    }

    #[test]
    fn wal_mode_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        let sink = SqliteSink::open(&path).unwrap();
        let mode: String = sink
            .lock()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
    }
}
