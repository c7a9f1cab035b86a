//! Extracting a single layer from a grid.

use climate_common::{ClimateError, ClimateResult, TimeAxis};

use crate::grid::{is_fill, Grid2D};
use crate::Grid;

/// Per-cell mean over the selected layers, ignoring fill. Cells with no
/// value in any selected layer are fill.
pub fn mean_of_layers(grid: &Grid, indices: &[usize]) -> Grid2D {
    let len = grid.spec.len();
    let mut sums = vec![0f64; len];
    let mut counts = vec![0u32; len];

    for &idx in indices {
        for (cell, &v) in grid.layers[idx].iter().enumerate() {
            if !is_fill(v, grid.fill_value) {
                sums[cell] += v as f64;
                counts[cell] += 1;
            }
        }
    }

    let values = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            if count == 0 {
                grid.fill_value
            } else {
                (sum / count as f64) as f32
            }
        })
        .collect();

    Grid2D {
        spec: grid.spec,
        values,
        fill_value: grid.fill_value,
        unit: grid.unit.clone(),
    }
}

/// One month of `grid` as a 2D layer.
///
/// - `month` 1..=12 selects that month: the matching layer of a
///   monthly-normals grid, the mean of all matching steps of a dated series,
///   or the only layer of a static grid.
/// - `month` 0 collapses every layer into their per-cell mean.
pub fn slice_month(grid: &Grid, month: u32) -> ClimateResult<Grid2D> {
    if month > 12 {
        return Err(ClimateError::OutOfBounds(format!(
            "month {} is outside 0..=12",
            month
        )));
    }

    if month == 0 {
        let all: Vec<usize> = (0..grid.layer_count()).collect();
        return Ok(mean_of_layers(grid, &all));
    }

    match &grid.time {
        TimeAxis::Static => grid.layer(0),
        TimeAxis::MonthlyNormals => grid.layer(month as usize - 1),
        TimeAxis::Dated { .. } => {
            let matching: Vec<usize> = grid
                .time
                .year_months()?
                .into_iter()
                .enumerate()
                .filter(|(_, (_, m))| *m == month)
                .map(|(i, _)| i)
                .collect();
            if matching.is_empty() {
                return Err(ClimateError::MissingData(format!(
                    "no time steps for month {} in '{}'",
                    month, grid.variable
                )));
            }
            Ok(mean_of_layers(grid, &matching))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_common::{CfTime, GridSpec};

    fn spec() -> GridSpec {
        GridSpec::new(0.5, -1.0, 0.5, 1.0, 1, 2)
    }

    fn normals() -> Grid {
        let layers = (1..=12).map(|m| vec![m as f32, -9999.0]).collect();
        Grid::new(spec(), TimeAxis::MonthlyNormals, layers, -9999.0, "degC", "tavg").unwrap()
    }

    #[test]
    fn test_monthly_normals_slice() {
        let g = normals();
        assert_eq!(slice_month(&g, 3).unwrap().values, vec![3.0, -9999.0]);
        assert_eq!(slice_month(&g, 12).unwrap().values, vec![12.0, -9999.0]);
    }

    #[test]
    fn test_month_zero_is_mean() {
        let g = normals();
        assert_eq!(slice_month(&g, 0).unwrap().values, vec![6.5, -9999.0]);
    }

    #[test]
    fn test_static_grid_returns_only_layer() {
        let g = Grid::new(spec(), TimeAxis::Static, vec![vec![100.0, 200.0]], -9999.0, "m", "elev")
            .unwrap();
        assert_eq!(slice_month(&g, 7).unwrap().values, vec![100.0, 200.0]);
    }

    #[test]
    fn test_dated_series_averages_matching_steps() {
        let time = CfTime::parse("days since 2000-01-01", "360_day").unwrap();
        // Jan 2000, Feb 2000, Jan 2001
        let offsets = vec![15.0, 45.0, 375.0];
        let layers = vec![vec![1.0, 10.0], vec![5.0, 5.0], vec![3.0, -9999.0]];
        let g = Grid::new(spec(), TimeAxis::Dated { time, offsets }, layers, -9999.0, "K", "tas")
            .unwrap();

        assert_eq!(slice_month(&g, 1).unwrap().values, vec![2.0, 10.0]);
        assert_eq!(slice_month(&g, 2).unwrap().values, vec![5.0, 5.0]);
        assert!(matches!(slice_month(&g, 3), Err(ClimateError::MissingData(_))));
    }

    #[test]
    fn test_month_out_of_range() {
        assert!(matches!(slice_month(&normals(), 13), Err(ClimateError::OutOfBounds(_))));
    }
}
