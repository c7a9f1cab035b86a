//! The `GridSource` capability and format selection.

use std::path::{Path, PathBuf};

use climate_common::{ClimateError, ClimateResult};

use crate::bil::BilSource;
use crate::folder::FolderSource;
use crate::Grid;

/// Anything that can produce a [`Grid`].
///
/// Implementations only decode their format; axis normalisation and
/// multi-file averaging happen in [`crate::load`].
pub trait GridSource: Send + Sync {
    fn load(&self) -> ClimateResult<Grid>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Reader hints that some formats cannot infer from the file itself.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Variable to read from multi-variable files, or the file-name prefix of
    /// a folder of monthly files.
    pub variable: Option<String>,
    /// Unit of the stored values when the format carries none (BIL), or an
    /// override of the declared unit.
    pub unit: Option<String>,
    /// Multiplier applied to raw values after decoding, e.g. `0.1` for
    /// temperatures stored in tenths of a degree.
    pub scale: Option<f32>,
}

/// Unit implied by a file name, for formats that store none.
///
/// Temperature names (`tmax`, `tmin`, `tavg`, `tmean`, `tas`) are in degC and
/// precipitation names (`prec`) in mm.
pub fn unit_from_file_name(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if ["tmax", "tmin", "tavg", "tmean", "tas"]
        .iter()
        .any(|t| name.contains(t))
    {
        Some("degC")
    } else if name.contains("prec") {
        Some("mm")
    } else {
        None
    }
}

/// Pick a reader for `path` from its extension (or directory-ness).
pub fn source_for_path(path: &Path, options: &SourceOptions) -> ClimateResult<Box<dyn GridSource>> {
    if path.is_dir() {
        return Ok(Box::new(FolderSource::new(path, options.clone())));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "bil" => Ok(Box::new(BilSource::new(path, options.clone()))),
        "nc" | "nc4" | "netcdf" => netcdf_source(path.to_path_buf(), options),
        "tif" | "tiff" => geotiff_source(path.to_path_buf(), options),
        _ => Err(ClimateError::Format(format!(
            "no reader for '{}'",
            path.display()
        ))),
    }
}

#[cfg(feature = "netcdf")]
fn netcdf_source(path: PathBuf, options: &SourceOptions) -> ClimateResult<Box<dyn GridSource>> {
    Ok(Box::new(crate::netcdf::NetCdfSource::new(path, options.clone())))
}

#[cfg(not(feature = "netcdf"))]
fn netcdf_source(path: PathBuf, _options: &SourceOptions) -> ClimateResult<Box<dyn GridSource>> {
    Err(ClimateError::Format(format!(
        "'{}' is NetCDF but this build lacks the `netcdf` feature",
        path.display()
    )))
}

#[cfg(feature = "gdal")]
fn geotiff_source(path: PathBuf, options: &SourceOptions) -> ClimateResult<Box<dyn GridSource>> {
    Ok(Box::new(crate::geotiff::GeoTiffSource::new(path, options.clone())))
}

#[cfg(not(feature = "gdal"))]
fn geotiff_source(path: PathBuf, _options: &SourceOptions) -> ClimateResult<Box<dyn GridSource>> {
    Err(ClimateError::Format(format!(
        "'{}' is GeoTIFF but this build lacks the `gdal` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension() {
        let err = source_for_path(Path::new("/data/file.grib2"), &SourceOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ClimateError::Format(_)));
    }

    #[test]
    fn test_bil_is_always_available() {
        let source = source_for_path(Path::new("/data/tmean_01.bil"), &SourceOptions::default())
            .unwrap();
        assert!(source.describe().contains("tmean_01.bil"));
    }

    #[test]
    fn test_unit_from_file_name() {
        for name in ["tmax_01.bil", "wc2.1_10m_tmin_07.tif", "TAVG.bil", "tmean_12.bil", "tas_MPI.bil"] {
            assert_eq!(unit_from_file_name(Path::new(name)), Some("degC"), "{}", name);
        }
        assert_eq!(unit_from_file_name(Path::new("/data/prec_03.bil")), Some("mm"));
        assert_eq!(unit_from_file_name(Path::new("/data/elev.bil")), None);
        // Only the file name counts, not the directories above it
        assert_eq!(unit_from_file_name(Path::new("/tasks/elev.bil")), None);
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn test_netcdf_requires_feature() {
        let err = source_for_path(Path::new("/data/air.mon.nc"), &SourceOptions::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("netcdf"));
    }
}
