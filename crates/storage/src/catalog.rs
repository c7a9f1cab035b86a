//! Dataset catalog: the trait the pipeline writes through, and its
//! PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use climate_common::{
    ClimateError, ClimateResult, DatasetKey, DatasetRecord, GridSpec, Measurement, Unit,
};

/// Lookup of a dataset by data source, date range and measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetQuery {
    pub data_source: String,
    pub measurement: Measurement,
    pub start_year: i32,
    pub end_year: i32,
    /// `None` accepts either, preferring the calibrated dataset.
    pub calibrated: Option<bool>,
}

impl DatasetQuery {
    pub fn new(
        data_source: impl Into<String>,
        measurement: Measurement,
        start_year: i32,
        end_year: i32,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            measurement,
            start_year,
            end_year,
            calibrated: None,
        }
    }

    /// Restrict the query to calibrated or uncalibrated datasets.
    pub fn calibrated(mut self, calibrated: bool) -> Self {
        self.calibrated = Some(calibrated);
        self
    }

    /// Query matching exactly one key.
    pub fn for_key(key: &DatasetKey) -> Self {
        Self::new(&key.data_source, key.measurement, key.start_year, key.end_year)
            .calibrated(key.calibrated)
    }

    pub fn matches(&self, key: &DatasetKey) -> bool {
        key.data_source == self.data_source
            && key.measurement == self.measurement
            && key.start_year == self.start_year
            && key.end_year == self.end_year
            && self.calibrated.map_or(true, |c| c == key.calibrated)
    }

    pub(crate) fn not_found(&self) -> ClimateError {
        let calibrated = match self.calibrated {
            Some(true) => " (calibrated)",
            Some(false) => " (uncalibrated)",
            None => "",
        };
        ClimateError::NotFound(format!(
            "{} {} {}-{}{}",
            self.data_source, self.measurement, self.start_year, self.end_year, calibrated
        ))
    }
}

/// Repository of produced datasets.
///
/// Implementations serialize writes per key: concurrent upserts of the same
/// key leave exactly one record, the last one written.
#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    /// Insert or replace the record for `record.key`.
    async fn upsert(&self, record: &DatasetRecord) -> ClimateResult<()>;

    /// The dataset matching `query`, or `NotFound`.
    async fn find(&self, query: &DatasetQuery) -> ClimateResult<DatasetRecord>;

    async fn get(&self, key: &DatasetKey) -> ClimateResult<Option<DatasetRecord>>;

    /// Remove a record. Returns whether one existed.
    async fn delete(&self, key: &DatasetKey) -> ClimateResult<bool>;

    /// Every dataset of a data source, ordered by date range.
    async fn list(&self, data_source: &str) -> ClimateResult<Vec<DatasetRecord>>;
}

/// PostgreSQL-backed catalog.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a new catalog connection from database URL.
    pub async fn connect(database_url: &str) -> ClimateResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| ClimateError::Catalog(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist.
    pub async fn migrate(&self) -> ClimateResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| ClimateError::Catalog(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DatasetCatalog for PgCatalog {
    #[instrument(skip(self, record), fields(dataset = %record.key))]
    async fn upsert(&self, record: &DatasetRecord) -> ClimateResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ClimateError::Catalog(format!("Begin failed: {}", e)))?;

        // Held until commit; serializes writers of the same key
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(record.key.base_name())
            .execute(&mut *tx)
            .await
            .map_err(|e| ClimateError::Catalog(format!("Lock failed: {}", e)))?;

        let key = &record.key;
        let spec = &record.spec;
        sqlx::query(
            r#"
            INSERT INTO datasets (
                id, data_source, measurement, unit,
                start_date, end_date, calibrated,
                lat_start, lat_delta, lon_start, lon_delta,
                row_count, col_count, fill_value,
                data_path, max_zoom, updated_at
            ) VALUES (
                $1, $2, $3, $4,
                $5, $6, $7,
                $8, $9, $10, $11,
                $12, $13, $14,
                $15, $16, $17
            )
            ON CONFLICT (data_source, measurement, unit, start_date, end_date, calibrated)
            DO UPDATE SET
                lat_start = EXCLUDED.lat_start,
                lat_delta = EXCLUDED.lat_delta,
                lon_start = EXCLUDED.lon_start,
                lon_delta = EXCLUDED.lon_delta,
                row_count = EXCLUDED.row_count,
                col_count = EXCLUDED.col_count,
                fill_value = EXCLUDED.fill_value,
                data_path = EXCLUDED.data_path,
                max_zoom = EXCLUDED.max_zoom,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&key.data_source)
        .bind(key.measurement.as_str())
        .bind(key.unit.as_str())
        .bind(key.start_date())
        .bind(key.end_date())
        .bind(key.calibrated)
        .bind(spec.lat_start)
        .bind(spec.lat_delta)
        .bind(spec.lon_start)
        .bind(spec.lon_delta)
        .bind(spec.rows as i32)
        .bind(spec.cols as i32)
        .bind(record.fill_value)
        .bind(&record.data_path)
        .bind(record.max_zoom as i32)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| ClimateError::Catalog(format!("Upsert failed: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| ClimateError::Catalog(format!("Commit failed: {}", e)))?;

        debug!("Catalog record written");
        Ok(())
    }

    async fn find(&self, query: &DatasetQuery) -> ClimateResult<DatasetRecord> {
        let row = sqlx::query_as::<_, DatasetRow>(&format!(
            "SELECT {} FROM datasets \
             WHERE data_source = $1 AND measurement = $2 \
             AND start_date = $3 AND end_date = $4 \
             AND ($5::BOOLEAN IS NULL OR calibrated = $5) \
             ORDER BY calibrated DESC LIMIT 1",
            COLUMNS
        ))
        .bind(&query.data_source)
        .bind(query.measurement.as_str())
        .bind(first_day(query.start_year))
        .bind(last_day(query.end_year))
        .bind(query.calibrated)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ClimateError::Catalog(format!("Query failed: {}", e)))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(query.not_found()),
        }
    }

    async fn get(&self, key: &DatasetKey) -> ClimateResult<Option<DatasetRecord>> {
        let row = sqlx::query_as::<_, DatasetRow>(&format!(
            "SELECT {} FROM datasets \
             WHERE data_source = $1 AND measurement = $2 AND unit = $3 \
             AND start_date = $4 AND end_date = $5 AND calibrated = $6",
            COLUMNS
        ))
        .bind(&key.data_source)
        .bind(key.measurement.as_str())
        .bind(key.unit.as_str())
        .bind(key.start_date())
        .bind(key.end_date())
        .bind(key.calibrated)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ClimateError::Catalog(format!("Query failed: {}", e)))?;

        row.map(DatasetRecord::try_from).transpose()
    }

    #[instrument(skip(self), fields(dataset = %key))]
    async fn delete(&self, key: &DatasetKey) -> ClimateResult<bool> {
        let result = sqlx::query(
            "DELETE FROM datasets \
             WHERE data_source = $1 AND measurement = $2 AND unit = $3 \
             AND start_date = $4 AND end_date = $5 AND calibrated = $6",
        )
        .bind(&key.data_source)
        .bind(key.measurement.as_str())
        .bind(key.unit.as_str())
        .bind(key.start_date())
        .bind(key.end_date())
        .bind(key.calibrated)
        .execute(&self.pool)
        .await
        .map_err(|e| ClimateError::Catalog(format!("Delete failed: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, data_source: &str) -> ClimateResult<Vec<DatasetRecord>> {
        let rows = sqlx::query_as::<_, DatasetRow>(&format!(
            "SELECT {} FROM datasets WHERE data_source = $1 \
             ORDER BY start_date, end_date, measurement, calibrated",
            COLUMNS
        ))
        .bind(data_source)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ClimateError::Catalog(format!("Query failed: {}", e)))?;

        rows.into_iter().map(DatasetRecord::try_from).collect()
    }
}

fn first_day(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn last_day(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX)
}

const COLUMNS: &str = "data_source, measurement, unit, start_date, end_date, calibrated, \
     lat_start, lat_delta, lon_start, lon_delta, row_count, col_count, \
     fill_value, data_path, max_zoom, updated_at";

/// Internal row type for database queries.
#[derive(FromRow)]
struct DatasetRow {
    data_source: String,
    measurement: String,
    unit: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    calibrated: bool,
    lat_start: f64,
    lat_delta: f64,
    lon_start: f64,
    lon_delta: f64,
    row_count: i32,
    col_count: i32,
    fill_value: f32,
    data_path: String,
    max_zoom: i32,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DatasetRow> for DatasetRecord {
    type Error = ClimateError;

    fn try_from(row: DatasetRow) -> ClimateResult<Self> {
        let measurement: Measurement = row.measurement.parse()?;
        let unit: Unit = row.unit.parse()?;
        if unit != measurement.canonical_unit() {
            return Err(ClimateError::Catalog(format!(
                "row for {} {} has non-canonical unit {}",
                row.data_source, measurement, unit
            )));
        }

        Ok(DatasetRecord {
            key: DatasetKey {
                data_source: row.data_source,
                measurement,
                unit,
                start_year: row.start_date.year(),
                end_year: row.end_date.year(),
                calibrated: row.calibrated,
            },
            spec: GridSpec::new(
                row.lat_start,
                row.lat_delta,
                row.lon_start,
                row.lon_delta,
                row.row_count as usize,
                row.col_count as usize,
            ),
            fill_value: row.fill_value,
            data_path: row.data_path,
            max_zoom: row.max_zoom as u32,
            updated_at: row.updated_at,
        })
    }
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS datasets (
    id UUID PRIMARY KEY,
    data_source VARCHAR(100) NOT NULL,
    measurement VARCHAR(20) NOT NULL,
    unit VARCHAR(10) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    calibrated BOOLEAN NOT NULL DEFAULT FALSE,
    lat_start DOUBLE PRECISION NOT NULL,
    lat_delta DOUBLE PRECISION NOT NULL,
    lon_start DOUBLE PRECISION NOT NULL,
    lon_delta DOUBLE PRECISION NOT NULL,
    row_count INTEGER NOT NULL,
    col_count INTEGER NOT NULL,
    fill_value REAL NOT NULL,
    data_path TEXT NOT NULL,
    max_zoom INTEGER NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    UNIQUE(data_source, measurement, unit, start_date, end_date, calibrated)
);

CREATE INDEX IF NOT EXISTS idx_datasets_source_dates ON datasets(data_source, start_date, end_date)
"#;
