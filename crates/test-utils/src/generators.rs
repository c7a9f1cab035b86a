//! Generators for synthetic climate grids.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use climate_common::{CfTime, GridSpec, TimeAxis};
use climate_grid::{Grid, Grid2D, MonthlyNormals};

/// Fill value used by every generator.
pub const TEST_FILL: f32 = -9999.0;

/// A global, north-up grid of `resolution` degree cells.
///
/// # Example
///
/// ```
/// use test_utils::global_spec;
///
/// let spec = global_spec(10.0);
/// assert_eq!((spec.rows, spec.cols), (18, 36));
/// assert_eq!(spec.lat_start, 85.0);
/// assert_eq!(spec.lon_start, -175.0);
/// ```
pub fn global_spec(resolution: f64) -> GridSpec {
    let rows = (180.0 / resolution).round() as usize;
    let cols = (360.0 / resolution).round() as usize;
    GridSpec::new(
        90.0 - resolution / 2.0,
        -resolution,
        -180.0 + resolution / 2.0,
        resolution,
        rows,
        cols,
    )
}

/// Creates test values with a predictable pattern.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that values[row * cols + col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_values;
///
/// let values = create_test_values(10, 5);
/// assert_eq!(values.len(), 50);
/// assert_eq!(values[1], 1000.0);  // col=1, row=0
/// assert_eq!(values[10], 1.0);    // col=0, row=1
/// ```
pub fn create_test_values(cols: usize, rows: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// A single layer where every cell holds `value`.
pub fn constant_grid(spec: GridSpec, value: f32, unit: &str) -> Grid2D {
    Grid2D {
        spec,
        values: vec![value; spec.len()],
        fill_value: TEST_FILL,
        unit: unit.to_string(),
    }
}

/// A single layer computed from each cell centre as `f(lat, lon)`.
pub fn field_grid(spec: GridSpec, unit: &str, f: impl Fn(f64, f64) -> f32) -> Grid2D {
    let mut values = Vec::with_capacity(spec.len());
    for row in 0..spec.rows {
        for col in 0..spec.cols {
            let (lat, lon) = spec.cell_center(row, col);
            values.push(f(lat, lon));
        }
    }
    Grid2D {
        spec,
        values,
        fill_value: TEST_FILL,
        unit: unit.to_string(),
    }
}

/// Monthly normals computed as `f(month, lat, lon)`.
pub fn normals_from_fn(
    spec: GridSpec,
    unit: &str,
    variable: &str,
    f: impl Fn(u32, f64, f64) -> f32,
) -> MonthlyNormals {
    let months = (1..=12)
        .map(|m| field_grid(spec, unit, |lat, lon| f(m, lat, lon)))
        .collect();
    MonthlyNormals::from_months(months, variable).expect("twelve generated months")
}

/// Monthly normals holding `value` in every cell and month.
pub fn constant_normals(spec: GridSpec, value: f32, unit: &str, variable: &str) -> MonthlyNormals {
    normals_from_fn(spec, unit, variable, |_, _, _| value)
}

/// Temperature-like normals in degC: warm at the equator, cold at the
/// poles, with a seasonal swing that is opposite in each hemisphere.
pub fn temperature_normals(spec: GridSpec, variable: &str) -> MonthlyNormals {
    normals_from_fn(spec, "degC", variable, |month, lat, _| {
        let base = 28.0 - 0.5 * lat.abs();
        let phase = (2.0 * std::f64::consts::PI * (month as f64 - 7.0) / 12.0).cos();
        let swing = 10.0 * phase * lat.signum() * (lat.abs() / 90.0);
        (base + swing) as f32
    })
}

/// A dated monthly series on a 360-day calendar, one step per month from
/// January of `start_year`, with values `f(year, month)` in every cell.
pub fn monthly_series(
    spec: GridSpec,
    start_year: i32,
    years: usize,
    unit: &str,
    variable: &str,
    f: impl Fn(i32, u32) -> f32,
) -> Grid {
    let units = format!("days since {}-01-01", start_year);
    let time = CfTime::parse(&units, "360_day").expect("valid CF units");

    let mut offsets = Vec::with_capacity(years * 12);
    let mut layers = Vec::with_capacity(years * 12);
    for step in 0..years * 12 {
        let year = start_year + (step / 12) as i32;
        let month = (step % 12) as u32 + 1;
        offsets.push(step as f64 * 30.0 + 15.0);
        layers.push(vec![f(year, month); spec.len()]);
    }

    Grid::new(
        spec,
        TimeAxis::Dated { time, offsets },
        layers,
        TEST_FILL,
        unit,
        variable,
    )
    .expect("consistent generated series")
}

/// Set every cell within `rows` to fill in a copy of `grid`.
pub fn with_fill_rows(grid: &Grid2D, rows: std::ops::Range<usize>) -> Grid2D {
    let mut out = grid.clone();
    for row in rows {
        for col in 0..grid.spec.cols {
            let idx = grid.spec.flat_index(row, col);
            out.values[idx] = grid.fill_value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_spec_covers_world() {
        let spec = global_spec(0.5);
        assert_eq!((spec.rows, spec.cols), (360, 720));
        assert!(spec.is_global());
        assert!(!spec.is_south_up());
    }

    #[test]
    fn test_create_test_values() {
        let values = create_test_values(3, 2);
        assert_eq!(values, vec![0.0, 1000.0, 2000.0, 1.0, 1001.0, 2001.0]);
    }

    #[test]
    fn test_temperature_normals_are_plausible() {
        let normals = temperature_normals(global_spec(10.0), "tavg");
        for m in 1..=12 {
            let layer = normals.month(m).unwrap();
            assert!(layer.values.iter().all(|v| (-40.0..=40.0).contains(v)));
        }
        // Northern mid-latitudes are warmer in July than January
        let (row, col) = normals.spec().nearest_index(45.0, 0.0).unwrap();
        let series = normals.cell_series(row, col);
        assert!(series[6].unwrap() > series[0].unwrap());
    }

    #[test]
    fn test_monthly_series_layout() {
        let grid = monthly_series(global_spec(90.0), 1990, 2, "K", "tas", |y, m| {
            (y - 1990) as f32 * 100.0 + m as f32
        });
        assert_eq!(grid.layer_count(), 24);
        let dates = grid.time.year_months().unwrap();
        assert_eq!(dates[0], (1990, 1));
        assert_eq!(dates[23], (1991, 12));
        assert_eq!(grid.layers[13][0], 102.0);
    }

    #[test]
    fn test_with_fill_rows() {
        let grid = constant_grid(global_spec(90.0), 1.0, "mm");
        let holed = with_fill_rows(&grid, 0..1);
        assert_eq!(holed.valid_count(), 4);
    }
}
