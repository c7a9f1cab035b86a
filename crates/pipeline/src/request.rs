//! Stage inputs and outputs.

use std::fmt;
use std::path::PathBuf;

use climate_common::{Measurement, Period};
use serde::{Deserialize, Serialize};
use storage::DatasetQuery;

fn default_true() -> bool {
    true
}

/// Turn source files into monthly normals for one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRequest {
    pub data_source: String,
    /// Files (or folders of monthly files) averaged into one dataset.
    pub paths: Vec<PathBuf>,
    pub start_year: i32,
    pub end_year: i32,
    /// Defaults to the canonical name of `variable`, then of the variable
    /// found in the source.
    #[serde(default)]
    pub measurement: Option<Measurement>,
    #[serde(default)]
    pub variable: Option<String>,
    /// Unit of the stored values, for formats that do not declare one.
    #[serde(default)]
    pub unit: Option<String>,
    /// Multiplier for raw values, e.g. `0.1` for tenths of a degree.
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default = "default_true")]
    pub tiles: bool,
}

impl TransformRequest {
    /// Label used before the dataset key is known.
    pub fn label(&self) -> String {
        let what = self
            .measurement
            .map(|m| m.to_string())
            .or_else(|| self.variable.clone())
            .unwrap_or_else(|| "?".to_string());
        format!(
            "{}-{}-{}-{}",
            self.data_source, self.start_year, self.end_year, what
        )
    }
}

/// Downscale a projection onto a baseline grid using a model's historical run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrateRequest {
    pub baseline_source: String,
    pub historical_source: String,
    pub projection_source: String,
    pub measurement: Measurement,
    /// Years of the baseline, also used for the historical dataset.
    pub baseline_years: (i32, i32),
    pub projection_years: (i32, i32),
    #[serde(default = "default_true")]
    pub tiles: bool,
}

impl CalibrateRequest {
    pub fn baseline_query(&self) -> DatasetQuery {
        let (start, end) = self.baseline_years;
        DatasetQuery::new(&self.baseline_source, self.measurement, start, end).calibrated(false)
    }

    pub fn historical_query(&self) -> DatasetQuery {
        let (start, end) = self.baseline_years;
        DatasetQuery::new(&self.historical_source, self.measurement, start, end).calibrated(false)
    }

    pub fn projection_query(&self) -> DatasetQuery {
        let (start, end) = self.projection_years;
        DatasetQuery::new(&self.projection_source, self.measurement, start, end).calibrated(false)
    }
}

impl fmt::Display for CalibrateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.projection_source, self.projection_years.0, self.projection_years.1, self.measurement
        )
    }
}

/// Fill in whichever of tavg, tmin and tmax is missing for a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveRequest {
    pub data_source: String,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub calibrated: bool,
    #[serde(default = "default_true")]
    pub tiles: bool,
}

impl fmt::Display for DeriveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.data_source, self.start_year, self.end_year)?;
        if self.calibrated {
            f.write_str("-calibrated")?;
        }
        Ok(())
    }
}

/// Regenerate tiles of an existing dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilesRequest {
    pub query: DatasetQuery,
    /// Defaults to the pipeline's configured periods.
    #[serde(default)]
    pub periods: Option<Vec<Period>>,
}

/// One unit of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum Job {
    Transform(TransformRequest),
    Calibrate(CalibrateRequest),
    Derive(DeriveRequest),
    Tiles(TilesRequest),
}

impl Job {
    pub fn label(&self) -> String {
        match self {
            Job::Transform(r) => r.label(),
            Job::Calibrate(r) => r.to_string(),
            Job::Derive(r) => r.to_string(),
            Job::Tiles(r) => format!(
                "{}-{}-{}-{}",
                r.query.data_source, r.query.start_year, r.query.end_year, r.query.measurement
            ),
        }
    }
}

/// Tiles produced for one dataset across all periods.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TileSummary {
    pub periods: usize,
    pub written: usize,
    pub failed: usize,
}

impl TileSummary {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}
