//! Rendering one Web Mercator tile from a grid.

use climate_common::tile::pixel_to_lat_lon;
use climate_common::{ClimateResult, TileCoord, TILE_SIZE};
use climate_grid::Grid2D;

use crate::png::create_png_auto;
use crate::ramp::ColorRamp;

/// An RGBA raster, row-major with 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// A fully transparent image.
    pub fn transparent(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Whether no pixel has any opacity.
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 0)
    }

    pub fn to_png(&self) -> ClimateResult<Vec<u8>> {
        create_png_auto(&self.pixels, self.width, self.height)
    }
}

/// Render `coord` from `grid` through `ramp`.
///
/// Each pixel centre is projected back to lat/lon and takes the value of the
/// grid cell containing it. Fill cells and pixels outside the grid are
/// transparent.
pub fn render_tile(grid: &Grid2D, ramp: &ColorRamp, coord: TileCoord) -> ClimateResult<RasterImage> {
    coord.validate()?;

    let size = TILE_SIZE as usize;
    let spec = &grid.spec;
    let mut image = RasterImage::transparent(size, size);
    if spec.is_empty() || !spec.bbox().overlaps(&coord.bounds()) {
        return Ok(image);
    }

    // Longitude depends only on the pixel column and latitude only on the
    // pixel row, so the grid lookup separates.
    let cols: Vec<Option<usize>> = (0..TILE_SIZE)
        .map(|px| {
            let (_, lon) = pixel_to_lat_lon(&coord, px, 0);
            spec.nearest_index(spec.lat_at(0), lon).map(|(_, c)| c)
        })
        .collect();

    for (py, line) in image.pixels.chunks_exact_mut(size * 4).enumerate() {
        let (lat, _) = pixel_to_lat_lon(&coord, 0, py as u32);
        let Some((row, _)) = spec.nearest_index(lat, spec.lon_at(0)) else {
            continue;
        };
        for (px, col) in cols.iter().enumerate() {
            let Some(col) = *col else {
                continue;
            };
            let value = grid.values[spec.flat_index(row, col)];
            if grid.is_fill(value) {
                continue;
            }
            let color = ramp.color_at(value as f64);
            line[px * 4..px * 4 + 4].copy_from_slice(&color.rgba());
        }
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::Color;
    use climate_common::{ClimateError, GridSpec, Measurement};
    use test_utils::{constant_grid, global_spec};

    #[test]
    fn test_constant_grid_fills_tile() {
        let grid = constant_grid(global_spec(1.0), 10.0, "degC");
        let ramp = ColorRamp::for_measurement(Measurement::Tavg);
        let image = render_tile(&grid, &ramp, TileCoord::new(2, 1, 1)).unwrap();

        assert_eq!(image.pixels.len(), 256 * 256 * 4);
        assert_eq!(image.pixel(0, 0), Color::opaque(255, 170, 170).rgba());
        assert_eq!(image.pixel(255, 255), Color::opaque(255, 170, 170).rgba());
    }

    #[test]
    fn test_fill_is_transparent() {
        let mut grid = constant_grid(global_spec(90.0), 20.0, "degC");
        // North-west quadrant cell (lat 45, lon -135)
        grid.values[0] = grid.fill_value;
        let ramp = ColorRamp::for_measurement(Measurement::Tavg);
        let image = render_tile(&grid, &ramp, TileCoord::new(0, 0, 0)).unwrap();

        assert_eq!(image.pixel(10, 10)[3], 0);
        assert_eq!(image.pixel(250, 10)[3], 255);
        assert_eq!(image.pixel(10, 250)[3], 255);
    }

    #[test]
    fn test_regional_grid_leaves_rest_transparent() {
        // 10x10 degree box around (5, 5)
        let spec = GridSpec::new(9.5, -1.0, 0.5, 1.0, 10, 10);
        let grid = constant_grid(spec, 50.0, "mm");
        let ramp = ColorRamp::for_measurement(Measurement::Precip);
        let image = render_tile(&grid, &ramp, TileCoord::new(0, 0, 0)).unwrap();

        // Pixel centred near (5, 5) is coloured, the corners are not
        let (tile, px, py) = climate_common::tile::lat_lon_to_pixel(5.0, 5.0, 0).unwrap();
        assert_eq!(tile, TileCoord::new(0, 0, 0));
        assert_eq!(
            image.pixel(px as usize, py as usize),
            Color::opaque(240, 255, 240).rgba()
        );
        assert_eq!(image.pixel(0, 0)[3], 0);
        assert!(!image.is_blank());
    }

    #[test]
    fn test_invalid_coord_is_rejected() {
        let grid = constant_grid(global_spec(90.0), 1.0, "mm");
        let ramp = ColorRamp::for_measurement(Measurement::Precip);
        let err = render_tile(&grid, &ramp, TileCoord::new(4, 16, 0)).unwrap_err();
        assert!(matches!(err, ClimateError::OutOfBounds(_)));
    }
}
