//! Dataset identity and catalog metadata.

use crate::{ClimateError, ClimateResult, GridSpec, Measurement, Unit};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniqueness key of a produced dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    pub data_source: String,
    pub measurement: Measurement,
    pub unit: Unit,
    pub start_year: i32,
    pub end_year: i32,
    pub calibrated: bool,
}

impl DatasetKey {
    pub fn new(
        data_source: impl Into<String>,
        measurement: Measurement,
        start_year: i32,
        end_year: i32,
        calibrated: bool,
    ) -> ClimateResult<Self> {
        let data_source = data_source.into();
        if data_source.is_empty() || data_source.contains(['/', '\\']) {
            return Err(ClimateError::Config(format!(
                "invalid data source name '{}'",
                data_source
            )));
        }
        if end_year < start_year {
            return Err(ClimateError::Config(format!(
                "end year {} precedes start year {}",
                end_year, start_year
            )));
        }
        Ok(Self {
            data_source,
            measurement,
            unit: measurement.canonical_unit(),
            start_year,
            end_year,
            calibrated,
        })
    }

    /// `1970-2000` style label used in tile paths.
    pub fn date_range(&self) -> String {
        format!("{}-{}", self.start_year, self.end_year)
    }

    /// First day covered by the normals.
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.start_year, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day covered by the normals.
    pub fn end_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.end_year, 12, 31).unwrap_or(NaiveDate::MAX)
    }

    /// File-name stem for artifacts of this dataset,
    /// e.g. `worldclim-1970-2000-tavg-degC` or `...-precip-mm-calibrated`.
    pub fn base_name(&self) -> String {
        let mut name = format!(
            "{}-{}-{}-{}",
            self.data_source,
            self.date_range(),
            self.measurement,
            self.unit
        );
        if self.calibrated {
            name.push_str("-calibrated");
        }
        name
    }

    /// The same dataset with the calibration flag set.
    pub fn calibrated(&self) -> Self {
        Self {
            calibrated: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_name())
    }
}

/// Catalog entry describing one produced dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub key: DatasetKey,
    pub spec: GridSpec,
    pub fill_value: f32,
    /// Location of the packed monthly normals.
    pub data_path: String,
    pub max_zoom: u32,
    pub updated_at: DateTime<Utc>,
}

impl DatasetRecord {
    /// Round a coordinate to the centre of the dataset's native cell.
    ///
    /// Uses the record's own origin and resolution so datasets whose cell
    /// centres sit on e.g. quarter degrees resolve to the right cell.
    pub fn snap(&self, lat: f64, lon: f64) -> ClimateResult<(f64, f64)> {
        self.spec.snap(lat, lon).ok_or_else(|| {
            ClimateError::OutOfBounds(format!(
                "({}, {}) outside coverage of {}",
                lat, lon, self.key
            ))
        })
    }

    /// Row/column of the native cell containing a coordinate.
    pub fn cell_index(&self, lat: f64, lon: f64) -> ClimateResult<(usize, usize)> {
        self.spec.nearest_index(lat, lon).ok_or_else(|| {
            ClimateError::OutOfBounds(format!(
                "({}, {}) outside coverage of {}",
                lat, lon, self.key
            ))
        })
    }
}

/// The twelve monthly normals of one dataset at the native cell nearest a
/// requested coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointNormals {
    pub dataset: String,
    pub measurement: Measurement,
    pub unit: Unit,
    /// Centre of the cell the values were read from.
    pub lat: f64,
    pub lon: f64,
    /// January first; `None` where the dataset has no value.
    pub months: [Option<f64>; 12],
    pub annual: Option<f64>,
}
