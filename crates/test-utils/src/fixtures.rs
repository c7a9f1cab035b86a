//! Common test fixtures for climate pipeline tests.
//!
//! This module provides pre-defined values for the scenarios that come up
//! repeatedly across crates.

/// Common bounding boxes as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Web Mercator coverage
    pub const MERCATOR: (f64, f64, f64, f64) = (-180.0, -85.0511, 180.0, 85.0511);

    /// Continental United States bounding box
    pub const CONUS: (f64, f64, f64, f64) = (-130.0, 20.0, -60.0, 55.0);

    /// Crosses antimeridian (Pacific-centric)
    pub const PACIFIC: (f64, f64, f64, f64) = (160.0, -50.0, -140.0, 50.0);
}

/// Grid geometries of commonly used climate products.
pub mod grid {
    use climate_common::GridSpec;

    /// WorldClim 10 arc-minute normals.
    pub fn worldclim_10m() -> GridSpec {
        let d = 1.0 / 6.0;
        GridSpec::new(90.0 - d / 2.0, -d, -180.0 + d / 2.0, d, 1080, 2160)
    }

    /// A coarse 2.5 degree model grid, the typical GCM resolution.
    pub fn model_2_5deg() -> GridSpec {
        GridSpec::new(88.75, -2.5, -178.75, 2.5, 72, 144)
    }

    /// A 1 degree regional grid over the continental US.
    pub fn conus_1deg() -> GridSpec {
        GridSpec::new(54.5, -1.0, -129.5, 1.0, 35, 70)
    }
}

/// Named locations as (lat, lon).
pub mod points {
    pub const NEW_YORK: (f64, f64) = (40.7128, -74.0060);
    pub const SYDNEY: (f64, f64) = (-33.8688, 151.2093);
    pub const ANTIMERIDIAN_FIJI: (f64, f64) = (-17.7, 179.9);
    /// North of the Web Mercator limit.
    pub const NORTH_POLE: (f64, f64) = (89.9, 0.0);
}

/// Dataset identifiers used in catalog and pipeline tests.
pub mod datasets {
    use climate_common::{DatasetKey, Measurement};

    pub const BASELINE_SOURCE: &str = "worldclim";
    pub const MODEL_SOURCE: &str = "cmip5-rcp85";
    pub const BASELINE_YEARS: (i32, i32) = (1970, 2000);
    pub const FUTURE_YEARS: (i32, i32) = (2040, 2069);

    /// Uncalibrated baseline key for `measurement`.
    pub fn baseline_key(measurement: Measurement) -> DatasetKey {
        DatasetKey::new(
            BASELINE_SOURCE,
            measurement,
            BASELINE_YEARS.0,
            BASELINE_YEARS.1,
            false,
        )
        .expect("valid fixture key")
    }

    /// Uncalibrated future model key for `measurement`.
    pub fn model_key(measurement: Measurement) -> DatasetKey {
        DatasetKey::new(
            MODEL_SOURCE,
            measurement,
            FUTURE_YEARS.0,
            FUTURE_YEARS.1,
            false,
        )
        .expect("valid fixture key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_fixtures() {
        let wc = grid::worldclim_10m();
        assert!(wc.is_global());
        assert_eq!(wc.len(), 1080 * 2160);

        let conus = grid::conus_1deg();
        assert!(!conus.is_global());
        let bb = conus.bbox();
        assert!((bb.min_lon - bbox::CONUS.0).abs() < 1e-9);
        assert!((bb.max_lat - bbox::CONUS.3).abs() < 1e-9);
    }

    #[test]
    fn test_dataset_fixtures() {
        let key = datasets::model_key(climate_common::Measurement::Precip);
        assert_eq!(key.base_name(), "cmip5-rcp85-2040-2069-precip-mm");
    }
}
