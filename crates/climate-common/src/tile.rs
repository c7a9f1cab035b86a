//! Slippy-map tile addressing in spherical (Web) Mercator.
//!
//! Tile `(z, x, y)` covers one quarter of its parent `(z-1, x/2, y/2)`; `x`
//! grows eastwards from -180° and `y` grows southwards from the top edge at
//! roughly 85.0511°N.

use crate::{BoundingBox, ClimateError, ClimateResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Edge length of a rendered tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Latitude limit of the Web Mercator square, `atan(sinh(pi))` in degrees.
pub const MAX_LATITUDE: f64 = 85.0511;

/// Largest zoom level accepted by [`TileCoord::validate`].
pub const MAX_SUPPORTED_ZOOM: u32 = 24;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along each axis at zoom `z`.
    pub fn tiles_per_axis(z: u32) -> u32 {
        1u32 << z
    }

    /// Check that `x` and `y` fall inside the `2^z` by `2^z` matrix.
    pub fn validate(&self) -> ClimateResult<()> {
        if self.z > MAX_SUPPORTED_ZOOM {
            return Err(ClimateError::OutOfBounds(format!(
                "zoom {} exceeds maximum {}",
                self.z, MAX_SUPPORTED_ZOOM
            )));
        }
        let n = Self::tiles_per_axis(self.z);
        if self.x >= n || self.y >= n {
            return Err(ClimateError::OutOfBounds(format!(
                "tile {} outside 0..{} at zoom {}",
                self.path_fragment(),
                n,
                self.z
            )));
        }
        Ok(())
    }

    /// `z/x/y`, used both as a log key and as the tile path suffix.
    pub fn path_fragment(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Get the parent tile (zoom - 1).
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// Get the four children tiles (zoom + 1).
    pub fn children(&self) -> [TileCoord; 4] {
        let x = self.x * 2;
        let y = self.y * 2;
        let z = self.z + 1;
        [
            TileCoord { z, x, y },
            TileCoord { z, x: x + 1, y },
            TileCoord { z, x, y: y + 1 },
            TileCoord {
                z,
                x: x + 1,
                y: y + 1,
            },
        ]
    }

    /// Geographic bounds of this tile.
    pub fn bounds(&self) -> BoundingBox {
        let n = Self::tiles_per_axis(self.z) as f64;

        let lon_min = self.x as f64 / n * 360.0 - 180.0;
        let lon_max = (self.x + 1) as f64 / n * 360.0 - 180.0;
        let lat_max = mercator_y_to_lat(self.y as f64 / n);
        let lat_min = mercator_y_to_lat((self.y + 1) as f64 / n);

        BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
    }
}

/// Every tile at zoom `z`, row by row.
pub fn tiles_at_zoom(z: u32) -> impl Iterator<Item = TileCoord> {
    let n = TileCoord::tiles_per_axis(z);
    (0..n).flat_map(move |y| (0..n).map(move |x| TileCoord::new(z, x, y)))
}

/// Wrap a longitude into [-180, 180).
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Normalised Mercator coordinates in [0, 1] for a lat/lon.
fn to_unit_square(lat: f64, lon: f64) -> ClimateResult<(f64, f64)> {
    if !lat.is_finite() || lat <= -MAX_LATITUDE || lat >= MAX_LATITUDE {
        return Err(ClimateError::OutOfBounds(format!(
            "latitude {} outside (-{}, {})",
            lat, MAX_LATITUDE, MAX_LATITUDE
        )));
    }
    if !lon.is_finite() {
        return Err(ClimateError::OutOfBounds(format!("longitude {}", lon)));
    }

    let lon = wrap_longitude(lon);
    let lat_rad = lat.to_radians();
    let u = (lon + 180.0) / 360.0;
    let v = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    Ok((u, v))
}

fn mercator_y_to_lat(v: f64) -> f64 {
    (PI * (1.0 - 2.0 * v)).sinh().atan().to_degrees()
}

/// Tile containing `(lat, lon)` at zoom `z`.
pub fn lat_lon_to_tile(lat: f64, lon: f64, z: u32) -> ClimateResult<TileCoord> {
    let (tile, _, _) = lat_lon_to_pixel(lat, lon, z)?;
    Ok(tile)
}

/// Tile and pixel (within that tile) containing `(lat, lon)` at zoom `z`.
pub fn lat_lon_to_pixel(lat: f64, lon: f64, z: u32) -> ClimateResult<(TileCoord, u32, u32)> {
    if z > MAX_SUPPORTED_ZOOM {
        return Err(ClimateError::OutOfBounds(format!("zoom {}", z)));
    }
    let (u, v) = to_unit_square(lat, lon)?;
    let world = TileCoord::tiles_per_axis(z) as f64 * TILE_SIZE as f64;
    let max_px = world as u64 - 1;
    let px = ((u * world).floor() as u64).min(max_px);
    let py = ((v * world).floor() as u64).min(max_px);

    let size = TILE_SIZE as u64;
    let tile = TileCoord::new(z, (px / size) as u32, (py / size) as u32);
    Ok((tile, (px % size) as u32, (py % size) as u32))
}

/// Latitude/longitude of the centre of pixel `(px, py)` within `tile`.
pub fn pixel_to_lat_lon(tile: &TileCoord, px: u32, py: u32) -> (f64, f64) {
    let world = TileCoord::tiles_per_axis(tile.z) as f64 * TILE_SIZE as f64;
    let gx = tile.x as f64 * TILE_SIZE as f64 + px as f64 + 0.5;
    let gy = tile.y as f64 * TILE_SIZE as f64 + py as f64 + 0.5;

    let lon = gx / world * 360.0 - 180.0;
    let lat = mercator_y_to_lat(gy / world);
    (lat, lon)
}
