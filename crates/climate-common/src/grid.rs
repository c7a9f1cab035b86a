//! Regular latitude/longitude grid geometry.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// Geometry of a regular lat/lon grid.
///
/// `lat_start`/`lon_start` are the coordinates of the centre of cell
/// `(row 0, col 0)`. Deltas may be negative to indicate a descending axis.
/// Values laid out against this geometry are row-major: `row * cols + col`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub lat_start: f64,
    pub lat_delta: f64,
    pub lon_start: f64,
    pub lon_delta: f64,
    pub rows: usize,
    pub cols: usize,
}

impl GridSpec {
    pub fn new(
        lat_start: f64,
        lat_delta: f64,
        lon_start: f64,
        lon_delta: f64,
        rows: usize,
        cols: usize,
    ) -> Self {
        Self {
            lat_start,
            lat_delta,
            lon_start,
            lon_delta,
            rows,
            cols,
        }
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn flat_index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn lat_at(&self, row: usize) -> f64 {
        self.lat_start + row as f64 * self.lat_delta
    }

    pub fn lon_at(&self, col: usize) -> f64 {
        self.lon_start + col as f64 * self.lon_delta
    }

    /// Centre of a cell as `(lat, lon)`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (self.lat_at(row), self.lon_at(col))
    }

    /// Latitude increases with row index.
    pub fn is_south_up(&self) -> bool {
        self.lat_delta > 0.0
    }

    /// Whether the longitude axis covers the full circle.
    pub fn is_global(&self) -> bool {
        (self.cols as f64 * self.lon_delta.abs() - 360.0).abs() < 1e-6
    }

    /// Extent of the grid including the half cell around edge centres.
    pub fn bbox(&self) -> BoundingBox {
        if self.is_empty() {
            return BoundingBox::new(self.lon_start, self.lat_start, self.lon_start, self.lat_start);
        }
        let last_lat = self.lat_at(self.rows - 1);
        let last_lon = self.lon_at(self.cols - 1);
        let half_lat = self.lat_delta.abs() / 2.0;
        let half_lon = self.lon_delta.abs() / 2.0;

        BoundingBox {
            min_lon: self.lon_start.min(last_lon) - half_lon,
            min_lat: (self.lat_start.min(last_lat) - half_lat).max(-90.0),
            max_lon: self.lon_start.max(last_lon) + half_lon,
            max_lat: (self.lat_start.max(last_lat) + half_lat).min(90.0),
        }
    }

    /// Row/column of the cell containing `(lat, lon)`.
    ///
    /// Longitudes are first wrapped into the 360° window starting at the
    /// grid's western edge, so a point at 359.9° finds the cell at -0.1° and a
    /// point just past the last column of a global grid lands in column 0.
    pub fn nearest_index(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        if self.is_empty() || !lat.is_finite() || !lon.is_finite() {
            return None;
        }

        let row = ((lat - self.lat_start) / self.lat_delta).round();
        if row < 0.0 || row >= self.rows as f64 {
            return None;
        }

        let west = self.bbox().min_lon;
        let lon = west + (lon - west).rem_euclid(360.0);
        let mut col = ((lon - self.lon_start) / self.lon_delta).round();
        if self.is_global() {
            col = col.rem_euclid(self.cols as f64);
        }
        if col < 0.0 || col >= self.cols as f64 {
            return None;
        }

        Some((row as usize, col as usize))
    }

    /// Centre of the cell containing `(lat, lon)`.
    pub fn snap(&self, lat: f64, lon: f64) -> Option<(f64, f64)> {
        self.nearest_index(lat, lon)
            .map(|(row, col)| self.cell_center(row, col))
    }

    /// Offset of cell centres from whole multiples of the cell size, e.g.
    /// `0.25` for a half-degree grid whose centres sit on quarter degrees.
    pub fn rounding_offset(&self) -> (f64, f64) {
        (
            self.lat_start.rem_euclid(self.lat_delta.abs()),
            self.lon_start.rem_euclid(self.lon_delta.abs()),
        )
    }

    /// Same shape, origin and resolution within `tolerance` degrees.
    pub fn same_geometry(&self, other: &GridSpec, tolerance: f64) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && (self.lat_start - other.lat_start).abs() <= tolerance
            && (self.lat_delta - other.lat_delta).abs() <= tolerance
            && (self.lon_start - other.lon_start).abs() <= tolerance
            && (self.lon_delta - other.lon_delta).abs() <= tolerance
    }
}
