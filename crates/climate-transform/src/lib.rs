//! Unit normalisation, temperature derivation and temporal aggregation.
//!
//! Converts source grids into canonical monthly normals:
//! raw time series are reduced to twelve months over a year window
//! ([`aggregate`]), values are converted to each measurement's canonical unit
//! ([`units`]), and missing temperature measures are derived from the other
//! two ([`derive`]).

pub mod aggregate;
pub mod derive;
pub mod units;

pub use aggregate::{aggregate_by_month, annual_value, period_grid, period_value};
pub use derive::{
    derive_missing_temperature, derive_temperature_normals, round_to_tenth, TemperatureNormals,
};
pub use units::{convert_normals, to_canonical_unit, Conversion};
