//! Storage for produced climate datasets.
//!
//! Provides:
//! - The dataset catalog trait with PostgreSQL and in-memory implementations
//! - Packed monthly normals files for point lookups and re-tiling
//! - The tile pyramid directory layout
//! - Staged writes that replace a dataset's artifacts together

pub mod catalog;
mod fs;
pub mod memory;
pub mod normals;
pub mod staging;
pub mod tiles;

pub use catalog::{DatasetCatalog, DatasetQuery, PgCatalog};
pub use memory::MemoryCatalog;
pub use normals::{scale_factor, NormalsStore, PACKED_FILL, SCALE_FACTOR};
pub use staging::{Promotion, Staging, STAGING_DIR};
pub use tiles::TileStore;
