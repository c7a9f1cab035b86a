//! Climate normals pipeline.
//!
//! Stages, each operating on one dataset:
//!
//! - **transform**: source files → monthly normals in canonical units →
//!   packed normals file → tiles → catalog record
//! - **calibrate**: baseline + (projection − historical) on the baseline grid
//! - **derive**: the missing one of tavg/tmin/tmax from the other two
//! - **tiles**: re-render the tile pyramid of a catalogued dataset
//! - **lookup**: the twelve monthly values at a coordinate
//!
//! The catalog is injected, so the same stages run against PostgreSQL in
//! production and an in-memory catalog in tests and dry runs.

pub mod error;
mod pipeline;
pub mod request;

pub use error::{PipelineError, Result, Stage, StageContext};
pub use pipeline::{BatchReport, Pipeline, PipelineOptions};
pub use request::{
    CalibrateRequest, DeriveRequest, Job, TileSummary, TilesRequest, TransformRequest,
};
