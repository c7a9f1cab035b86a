//! NetCDF (CF conventions) reader using the native netcdf library.
//!
//! Handles the layouts climate products commonly use:
//! `(time, lat, lon)` monthly or daily series with a CF time axis,
//! `(time=12, lat, lon)` climatologies without dates, and plain `(lat, lon)`.

use std::path::{Path, PathBuf};
use std::sync::Once;

use climate_common::{CfTime, ClimateError, ClimateResult, GridSpec, Measurement, TimeAxis};
use tracing::{debug, warn};

use crate::normalize::regular_axis;
use crate::source::{GridSource, SourceOptions};
use crate::Grid;

const LAT_NAMES: [&str; 3] = ["lat", "latitude", "y"];
const LON_NAMES: [&str; 3] = ["lon", "longitude", "x"];
const TIME_NAMES: [&str; 2] = ["time", "month"];

/// Silence HDF5's automatic error printing to stderr.
///
/// HDF5 prints diagnostics even for lookups the caller handles, such as
/// probing an optional attribute. Called before every open; only the first
/// call has an effect.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 accepts null handlers to disable printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

#[derive(Debug, Clone)]
pub struct NetCdfSource {
    path: PathBuf,
    options: SourceOptions,
}

impl NetCdfSource {
    pub fn new(path: impl AsRef<Path>, options: SourceOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
        }
    }

    fn open(&self) -> ClimateResult<netcdf::File> {
        silence_hdf5_errors();
        netcdf::open(&self.path).map_err(|e| {
            ClimateError::Format(format!("failed to open {}: {}", self.path.display(), e))
        })
    }
}

impl GridSource for NetCdfSource {
    fn load(&self) -> ClimateResult<Grid> {
        let file = self.open()?;
        let var = data_variable(&file, self.options.variable.as_deref())?;
        let var_name = var.name();

        let dims: Vec<(String, usize)> = var
            .dimensions()
            .iter()
            .map(|d| (d.name(), d.len()))
            .collect();
        let (lat_dim, lon_dim, time_dim) = match dims.as_slice() {
            [lat, lon] => (lat, lon, None),
            [time, lat, lon] => (lat, lon, Some(time)),
            _ => {
                return Err(ClimateError::Format(format!(
                    "variable '{}' has dimensions {:?}, expected (time, lat, lon) or (lat, lon)",
                    var_name, dims
                )))
            }
        };
        if !LAT_NAMES.contains(&lat_dim.0.as_str()) || !LON_NAMES.contains(&lon_dim.0.as_str()) {
            return Err(ClimateError::Format(format!(
                "variable '{}' is not laid out as (.., lat, lon): {:?}",
                var_name, dims
            )));
        }

        if let Some((name, _)) = time_dim {
            if !TIME_NAMES.contains(&name.as_str()) {
                return Err(ClimateError::Format(format!(
                    "leading dimension '{}' of '{}' is not a time axis",
                    name, var_name
                )));
            }
        }

        let lats = coordinate_values(&file, &lat_dim.0)?;
        let lons = coordinate_values(&file, &lon_dim.0)?;
        let (lat_start, lat_delta) = regular_axis(&lats, "latitude")?;
        let (lon_start, lon_delta) = regular_axis(&lons, "longitude")?;
        let spec = GridSpec::new(lat_start, lat_delta, lon_start, lon_delta, lats.len(), lons.len());

        let time = match time_dim {
            None => TimeAxis::Static,
            Some((name, len)) => time_axis(&file, name, *len)?,
        };

        let raw: Vec<f32> = var.get_values::<f32, _>(..).map_err(|e| {
            ClimateError::Format(format!("failed to read '{}': {}", var_name, e))
        })?;

        let scale = get_f32_attr(&var, "scale_factor").unwrap_or(1.0);
        let offset = get_f32_attr(&var, "add_offset").unwrap_or(0.0);
        let fill_value = get_f32_attr(&var, "_FillValue")
            .or_else(|| get_f32_attr(&var, "missing_value"))
            .unwrap_or(f32::NAN);
        let out_fill = if fill_value.is_finite() {
            fill_value * scale + offset
        } else {
            -9999.0
        };

        let values: Vec<f32> = raw
            .into_iter()
            .map(|v| {
                if !v.is_finite() || v == fill_value {
                    out_fill
                } else {
                    v * scale + offset
                }
            })
            .collect();

        let layers: Vec<Vec<f32>> = values.chunks(spec.len()).map(<[f32]>::to_vec).collect();

        let unit = self
            .options
            .unit
            .clone()
            .or_else(|| get_str_attr(&var, "units"))
            .unwrap_or_default();

        debug!(
            path = %self.path.display(),
            variable = %var_name,
            rows = spec.rows,
            cols = spec.cols,
            layers = layers.len(),
            unit = %unit,
            "Decoded NetCDF variable"
        );

        Grid::new(spec, time, layers, out_fill, unit, var_name)
    }

    fn describe(&self) -> String {
        format!("NetCDF {}", self.path.display())
    }
}

/// The requested variable, or the one whose name maps to a known measurement,
/// or the only non-coordinate variable with at least two dimensions.
fn data_variable<'f>(
    file: &'f netcdf::File,
    requested: Option<&str>,
) -> ClimateResult<netcdf::Variable<'f>> {
    if let Some(name) = requested {
        return file
            .variable(name)
            .ok_or_else(|| ClimateError::MissingData(format!("variable '{}'", name)));
    }

    let candidates: Vec<netcdf::Variable<'f>> = file
        .variables()
        .filter(|v| v.dimensions().len() >= 2)
        .filter(|v| {
            let name = v.name();
            !LAT_NAMES.contains(&name.as_str())
                && !LON_NAMES.contains(&name.as_str())
                && !name.ends_with("_bnds")
                && !name.ends_with("_bounds")
        })
        .collect();

    if let Some(pos) = candidates
        .iter()
        .position(|v| Measurement::from_source_name(&v.name()).is_ok())
    {
        return candidates
            .into_iter()
            .nth(pos)
            .ok_or_else(|| ClimateError::MissingData("data variable".to_string()));
    }

    match candidates.len() {
        1 => candidates
            .into_iter()
            .next()
            .ok_or_else(|| ClimateError::MissingData("data variable".to_string())),
        0 => Err(ClimateError::MissingData("no gridded variable in file".to_string())),
        n => Err(ClimateError::Format(format!(
            "{} candidate variables; name one explicitly",
            n
        ))),
    }
}

fn coordinate_values(file: &netcdf::File, name: &str) -> ClimateResult<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| ClimateError::MissingData(format!("coordinate variable '{}'", name)))?;
    var.get_values::<f64, _>(..)
        .map_err(|e| ClimateError::Format(format!("failed to read '{}': {}", name, e)))
}

fn time_axis(file: &netcdf::File, name: &str, len: usize) -> ClimateResult<TimeAxis> {
    // Long-term means carry twelve placeholder dates (often in year 1)
    if len == 12 {
        debug!(dimension = name, "Twelve time steps, reading as monthly normals");
        return Ok(TimeAxis::MonthlyNormals);
    }

    let var = file.variable(name);
    let units = var.as_ref().and_then(|v| get_str_attr(v, "units"));

    match units {
        Some(units) if units.contains("since") => {
            let calendar = var
                .as_ref()
                .and_then(|v| get_str_attr(v, "calendar"))
                .unwrap_or_else(|| "standard".to_string());
            let time = CfTime::parse(&units, &calendar)?;
            let offsets = coordinate_values(file, name)?;
            Ok(TimeAxis::Dated { time, offsets })
        }
        _ if len == 1 => Ok(TimeAxis::Static),
        _ => {
            warn!(dimension = name, len = len, "Time axis without CF units");
            Err(ClimateError::Format(format!(
                "time dimension '{}' of length {} has no decodable units",
                name, len
            )))
        }
    }
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f32::try_from(attr_value).ok()
}

fn get_str_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
