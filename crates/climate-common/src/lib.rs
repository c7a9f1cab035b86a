//! Common types and utilities shared across the climate pipeline crates.

pub mod bbox;
pub mod calendar;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod measurement;
pub mod period;
pub mod tile;

pub use bbox::BoundingBox;
pub use calendar::{Calendar, CfTime, TimeAxis};
pub use dataset::{DatasetKey, DatasetRecord, PointNormals};
pub use error::{ClimateError, ClimateResult};
pub use grid::GridSpec;
pub use measurement::{AnnualReduction, CalibrationMode, Measurement, MeasurementKind, Unit};
pub use period::{Period, Season};
pub use tile::{TileCoord, MAX_LATITUDE, TILE_SIZE};
