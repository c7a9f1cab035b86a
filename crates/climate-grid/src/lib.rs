//! Gridded climate data in memory.
//!
//! Readers for the supported source formats sit behind [`GridSource`]; the
//! rest of the pipeline only sees [`Grid`] and [`Grid2D`], always north-up
//! with longitudes in [-180, 180).
//!
//! The BIL and folder readers are always available. NetCDF and GeoTIFF
//! readers link system libraries and are enabled with the `netcdf` and
//! `gdal` features.

pub mod bil;
pub mod folder;
#[cfg(feature = "gdal")]
pub mod geotiff;
pub mod grid;
pub mod load;
#[cfg(feature = "netcdf")]
pub mod netcdf;
pub mod normalize;
pub mod normals;
pub mod slice;
pub mod source;

pub use bil::BilSource;
pub use climate_common::TimeAxis;
pub use folder::FolderSource;
pub use grid::{is_fill, Grid, Grid2D};
pub use load::{load, load_sources, mean_of};
pub use normalize::normalize_axes;
pub use normals::MonthlyNormals;
pub use slice::{mean_of_layers, slice_month};
pub use source::{source_for_path, unit_from_file_name, GridSource, SourceOptions};
