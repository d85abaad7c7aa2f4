use gridcast_models::PipelineRecord;

/// Tables written by [`crate::SqliteSink`], one per record kind.
///
/// Every table keeps the full record as `payload_json` next to a few
/// scalar columns for querying without JSON functions. `timestamp` is the
/// record's own time and drives retention; `recorded_at` is insertion time.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS weather_records (
///     id              INTEGER PRIMARY KEY AUTOINCREMENT,
///     location        TEXT NOT NULL,
///     timestamp       TEXT NOT NULL,
///     recorded_at     TEXT NOT NULL,
///     temperature_c   REAL NOT NULL,
///     renewable_score REAL NOT NULL,
///     payload_json    TEXT NOT NULL
/// );
/// ```
pub const RECORDS_DDL: &str = "\
CREATE TABLE IF NOT EXISTS weather_records (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    location        TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    recorded_at     TEXT NOT NULL,
    temperature_c   REAL NOT NULL,
    renewable_score REAL NOT NULL,
    payload_json    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_weather_location ON weather_records(location);
CREATE INDEX IF NOT EXISTS idx_weather_timestamp ON weather_records(timestamp);

CREATE TABLE IF NOT EXISTS demand_records (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    location            TEXT NOT NULL,
    timestamp           TEXT NOT NULL,
    recorded_at         TEXT NOT NULL,
    predicted_demand_mw REAL NOT NULL,
    confidence          REAL NOT NULL,
    is_peak             INTEGER NOT NULL,
    payload_json        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_demand_location ON demand_records(location);
CREATE INDEX IF NOT EXISTS idx_demand_timestamp ON demand_records(timestamp);

CREATE TABLE IF NOT EXISTS grid_records (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    location            TEXT NOT NULL,
    timestamp           TEXT NOT NULL,
    recorded_at         TEXT NOT NULL,
    renewable_mw        REAL NOT NULL,
    storage_mw          REAL NOT NULL,
    conventional_mw     REAL NOT NULL,
    storage_level       REAL NOT NULL,
    balance_status      TEXT NOT NULL,
    payload_json        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_grid_location ON grid_records(location);
CREATE INDEX IF NOT EXISTS idx_grid_timestamp ON grid_records(timestamp);
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTable {
    Weather,
    Demand,
    Grid,
}

impl RecordTable {
    pub const ALL: [RecordTable; 3] = [RecordTable::Weather, RecordTable::Demand, RecordTable::Grid];

    pub fn name(self) -> &'static str {
        match self {
            RecordTable::Weather => "weather_records",
            RecordTable::Demand => "demand_records",
            RecordTable::Grid => "grid_records",
        }
    }

    pub fn for_record(record: &PipelineRecord) -> Self {
        match record {
            PipelineRecord::Weather(_) => RecordTable::Weather,
            PipelineRecord::Demand(_) => RecordTable::Demand,
            PipelineRecord::Grid(_) => RecordTable::Grid,
        }
    }
}
