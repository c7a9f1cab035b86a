//! GeoTIFF (or anything else GDAL opens) as a single static layer.

use std::path::{Path, PathBuf};

use climate_common::{ClimateError, ClimateResult, GridSpec, TimeAxis};
use gdal::raster::RasterBand;
use gdal::Dataset;
use tracing::debug;

use crate::source::{unit_from_file_name, GridSource, SourceOptions};
use crate::Grid;

#[derive(Debug, Clone)]
pub struct GeoTiffSource {
    path: PathBuf,
    options: SourceOptions,
}

impl GeoTiffSource {
    pub fn new(path: impl AsRef<Path>, options: SourceOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
        }
    }
}

fn gdal_err(path: &Path, e: gdal::errors::GdalError) -> ClimateError {
    ClimateError::Format(format!("{}: {}", path.display(), e))
}

impl GridSource for GeoTiffSource {
    fn load(&self) -> ClimateResult<Grid> {
        let dataset = Dataset::open(&self.path).map_err(|e| gdal_err(&self.path, e))?;
        let band: RasterBand = dataset.rasterband(1).map_err(|e| gdal_err(&self.path, e))?;

        let cols = band.x_size();
        let rows = band.y_size();
        if cols == 0 || rows == 0 {
            return Err(ClimateError::Format(format!(
                "{} has an empty raster",
                self.path.display()
            )));
        }

        // [origin_x, pixel_w, rot_x, origin_y, rot_y, pixel_h]
        let gt = dataset.geo_transform().map_err(|e| gdal_err(&self.path, e))?;
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(ClimateError::Format(format!(
                "{} is rotated; only north-up rasters are supported",
                self.path.display()
            )));
        }
        let spec = GridSpec::new(gt[3] + gt[5] / 2.0, gt[5], gt[0] + gt[1] / 2.0, gt[1], rows, cols);

        let nodata = band.no_data_value();
        let scale = band.scale().unwrap_or(1.0) as f32 * self.options.scale.unwrap_or(1.0);
        let offset = band.offset().unwrap_or(0.0) as f32;

        let buffer = band
            .read_as::<f32>((0, 0), (cols, rows), (cols, rows), None)
            .map_err(|e| gdal_err(&self.path, e))?;

        let fill = nodata.map(|v| v as f32).unwrap_or(-9999.0);
        let values: Vec<f32> = buffer
            .into_iter()
            .map(|v| {
                let is_nodata = nodata.is_some_and(|nd| v as f64 == nd);
                if is_nodata || !v.is_finite() {
                    fill
                } else {
                    v * scale + offset
                }
            })
            .collect();

        debug!(path = %self.path.display(), rows = rows, cols = cols, "Decoded GeoTIFF band");

        let variable = self.options.variable.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string()
        });
        Grid::new(
            spec,
            TimeAxis::Static,
            vec![values],
            fill,
            self.options
                .unit
                .clone()
                .or_else(|| unit_from_file_name(&self.path).map(String::from))
                .unwrap_or_default(),
            variable,
        )
    }

    fn describe(&self) -> String {
        format!("GeoTIFF {}", self.path.display())
    }
}
