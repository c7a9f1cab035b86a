//! Measurement and unit vocabulary.
//!
//! Every quantity the pipeline handles is one of a closed set of
//! [`Measurement`]s, each with exactly one canonical [`Unit`]. Behaviour that
//! depends on the kind of quantity (annual reduction, calibration arithmetic,
//! colour ramp) is looked up from these enums rather than inferred from unit
//! strings.

use crate::{ClimateError, ClimateResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical measurement vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measurement {
    Tavg,
    Tmin,
    Tmax,
    Precip,
    Potet,
    Et,
    Elevation,
}

/// Broad physical category of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    /// Air temperature (instantaneous state, averaged over time).
    Temperature,
    /// Water flux accumulated over a period (precipitation, evapotranspiration).
    Flux,
    /// Time-invariant fields.
    Static,
}

/// How 12 monthly values collapse into an annual value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnualReduction {
    Mean,
    Sum,
}

/// How a model's historical bias is applied to a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    /// `baseline + (projection - historical)`
    Additive,
    /// `baseline * (projection / historical)`
    Multiplicative,
}

impl Measurement {
    pub const ALL: [Measurement; 7] = [
        Measurement::Tavg,
        Measurement::Tmin,
        Measurement::Tmax,
        Measurement::Precip,
        Measurement::Potet,
        Measurement::Et,
        Measurement::Elevation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Measurement::Tavg => "tavg",
            Measurement::Tmin => "tmin",
            Measurement::Tmax => "tmax",
            Measurement::Precip => "precip",
            Measurement::Potet => "potet",
            Measurement::Et => "et",
            Measurement::Elevation => "elevation",
        }
    }

    /// Map a source variable name (as found in NetCDF/GeoTIFF products) onto
    /// the canonical vocabulary.
    pub fn from_source_name(name: &str) -> ClimateResult<Self> {
        let measurement = match name.trim().to_ascii_lowercase().as_str() {
            "tavg" | "air" | "tmean" | "tas" => Measurement::Tavg,
            "tmin" | "tasmin" => Measurement::Tmin,
            "tmax" | "tasmax" => Measurement::Tmax,
            "precip" | "prec" | "pr" | "ppt" => Measurement::Precip,
            "potet" | "pet" => Measurement::Potet,
            "et" | "aet" | "evspsbl" => Measurement::Et,
            "elevation" | "elev" | "alt" | "orog" => Measurement::Elevation,
            _ => return Err(ClimateError::UnknownMeasurement(name.to_string())),
        };
        Ok(measurement)
    }

    pub fn kind(&self) -> MeasurementKind {
        match self {
            Measurement::Tavg | Measurement::Tmin | Measurement::Tmax => {
                MeasurementKind::Temperature
            }
            Measurement::Precip | Measurement::Potet | Measurement::Et => MeasurementKind::Flux,
            Measurement::Elevation => MeasurementKind::Static,
        }
    }

    pub fn canonical_unit(&self) -> Unit {
        match self.kind() {
            MeasurementKind::Temperature => Unit::DegC,
            MeasurementKind::Flux => Unit::Mm,
            MeasurementKind::Static => Unit::M,
        }
    }

    pub fn annual_reduction(&self) -> AnnualReduction {
        match self.kind() {
            MeasurementKind::Flux => AnnualReduction::Sum,
            MeasurementKind::Temperature | MeasurementKind::Static => AnnualReduction::Mean,
        }
    }

    pub fn calibration_mode(&self) -> CalibrationMode {
        match self.kind() {
            MeasurementKind::Flux => CalibrationMode::Multiplicative,
            MeasurementKind::Temperature | MeasurementKind::Static => CalibrationMode::Additive,
        }
    }

    pub fn is_temperature(&self) -> bool {
        self.kind() == MeasurementKind::Temperature
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Measurement {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Measurement::from_source_name(s)
    }
}

/// Canonical unit vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "degC")]
    DegC,
    #[serde(rename = "mm")]
    Mm,
    #[serde(rename = "m")]
    M,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::DegC => "degC",
            Unit::Mm => "mm",
            Unit::M => "m",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "degC" => Ok(Unit::DegC),
            "mm" => Ok(Unit::Mm),
            "m" => Ok(Unit::M),
            other => Err(ClimateError::UnsupportedUnit {
                unit: other.to_string(),
                measurement: "*".to_string(),
            }),
        }
    }
}
