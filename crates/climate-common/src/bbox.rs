//! Geographic extents.

use serde::{Deserialize, Serialize};

/// A longitude/latitude extent in degrees.
///
/// `max_lon` may exceed 180 for extents that cross the antimeridian (a grid
/// starting at 160° and running 60° east ends at 220°).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Whether `(lat, lon)` lies inside, edges included, with `lon` taken
    /// modulo 360.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.min_lat || lat > self.max_lat {
            return false;
        }
        if self.lon_span() >= 360.0 {
            return true;
        }
        let lon = self.min_lon + (lon - self.min_lon).rem_euclid(360.0);
        lon <= self.max_lon
    }

    /// Whether the two extents share any area. Touching edges do not count.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        if self.min_lat >= other.max_lat || self.max_lat <= other.min_lat {
            return false;
        }
        if self.lon_span() >= 360.0 || other.lon_span() >= 360.0 {
            return true;
        }
        [-360.0, 0.0, 360.0].iter().any(|shift| {
            self.min_lon < other.max_lon + shift && self.max_lon > other.min_lon + shift
        })
    }
}
