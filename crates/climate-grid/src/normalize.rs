//! Axis normalisation.
//!
//! After [`normalize_axes`] every grid has row 0 at its northern edge
//! (negative `lat_delta`), ascending longitudes (positive `lon_delta`), and a
//! first column centred in [-180, 180). Global grids stored as 0..360 are
//! rotated so the antimeridian column comes first.

use climate_common::tile::wrap_longitude;
use climate_common::{ClimateError, ClimateResult};
use tracing::debug;

use crate::Grid;

/// `(start, delta)` of an evenly spaced coordinate axis.
pub fn regular_axis(values: &[f64], what: &str) -> ClimateResult<(f64, f64)> {
    match values {
        [] => Err(ClimateError::Format(format!("empty {} axis", what))),
        [only] => Err(ClimateError::Format(format!(
            "{} axis has a single value {}; resolution unknown",
            what, only
        ))),
        [first, .., last] => {
            let delta = (last - first) / (values.len() - 1) as f64;
            let tolerance = delta.abs() * 1e-3;
            let irregular = values
                .windows(2)
                .any(|w| ((w[1] - w[0]) - delta).abs() > tolerance);
            if delta == 0.0 || irregular {
                return Err(ClimateError::Format(format!("{} axis is not evenly spaced", what)));
            }
            Ok((*first, delta))
        }
    }
}

fn flip_rows(values: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(values.len());
    for row in (0..rows).rev() {
        out.extend_from_slice(&values[row * cols..(row + 1) * cols]);
    }
    out
}

fn reverse_cols(values: &mut [f32], cols: usize) {
    for row in values.chunks_mut(cols) {
        row.reverse();
    }
}

fn rotate_cols(values: &mut [f32], cols: usize, shift: usize) {
    for row in values.chunks_mut(cols) {
        row.rotate_left(shift);
    }
}

/// Reorient a grid to north-up rows and [-180, 180) longitudes.
pub fn normalize_axes(mut grid: Grid) -> ClimateResult<Grid> {
    let mut spec = grid.spec;
    if spec.is_empty() {
        return Err(ClimateError::Format(format!(
            "'{}' has an empty grid",
            grid.variable
        )));
    }

    if spec.lat_delta > 0.0 {
        for layer in grid.layers.iter_mut() {
            *layer = flip_rows(layer, spec.rows, spec.cols);
        }
        spec.lat_start = spec.lat_at(spec.rows - 1);
        spec.lat_delta = -spec.lat_delta;
        debug!(variable = %grid.variable, "Flipped latitude axis to north-up");
    }

    if spec.lon_delta < 0.0 {
        for layer in grid.layers.iter_mut() {
            reverse_cols(layer, spec.cols);
        }
        spec.lon_start = spec.lon_at(spec.cols - 1);
        spec.lon_delta = -spec.lon_delta;
    }

    if spec.is_global() {
        let shift = (0..spec.cols)
            .min_by(|&a, &b| {
                wrap_longitude(spec.lon_at(a)).total_cmp(&wrap_longitude(spec.lon_at(b)))
            })
            .unwrap_or(0);
        if shift != 0 {
            for layer in grid.layers.iter_mut() {
                rotate_cols(layer, spec.cols, shift);
            }
            debug!(variable = %grid.variable, shift = shift, "Rotated longitudes into [-180, 180)");
        }
        spec.lon_start = wrap_longitude(spec.lon_at(shift));
    } else {
        // Regional grids keep their column order; nearest-cell lookups wrap
        // around the antimeridian if the region crosses it.
        spec.lon_start = wrap_longitude(spec.lon_start);
    }

    grid.spec = spec;
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_common::{GridSpec, TimeAxis};

    fn grid(spec: GridSpec, values: Vec<f32>) -> Grid {
        Grid::new(spec, TimeAxis::Static, vec![values], -9999.0, "K", "t").unwrap()
    }

    #[test]
    fn test_regular_axis() {
        let (start, delta) = regular_axis(&[89.75, 89.25, 88.75], "latitude").unwrap();
        assert_eq!(start, 89.75);
        assert!((delta + 0.5).abs() < 1e-12);
        assert!(regular_axis(&[0.0, 1.0, 3.0], "longitude").is_err());
        assert!(regular_axis(&[0.0], "longitude").is_err());
    }

    #[test]
    fn test_south_up_is_flipped() {
        // rows: lat -45 then 45
        let g = grid(
            GridSpec::new(-45.0, 90.0, -90.0, 180.0, 2, 2),
            vec![1.0, 2.0, 3.0, 4.0],
        );
        let g = normalize_axes(g).unwrap();
        assert_eq!(g.spec.lat_start, 45.0);
        assert_eq!(g.spec.lat_delta, -90.0);
        assert_eq!(g.layers[0], vec![3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_zero_to_360_is_rotated() {
        // Four 90-degree columns centred at 45, 135, 225, 315
        let g = grid(
            GridSpec::new(0.0, -1.0, 45.0, 90.0, 1, 4),
            vec![45.0, 135.0, 225.0, 315.0],
        );
        let g = normalize_axes(g).unwrap();
        assert_eq!(g.spec.lon_start, -135.0);
        assert_eq!(g.spec.lon_delta, 90.0);
        assert_eq!(g.layers[0], vec![225.0, 315.0, 45.0, 135.0]);
    }

    #[test]
    fn test_descending_longitude_is_reversed() {
        let g = grid(
            GridSpec::new(0.0, -1.0, 135.0, -90.0, 1, 4),
            vec![135.0, 45.0, -45.0, -135.0],
        );
        let g = normalize_axes(g).unwrap();
        assert_eq!(g.spec.lon_start, -135.0);
        assert_eq!(g.layers[0], vec![-135.0, -45.0, 45.0, 135.0]);
    }

    #[test]
    fn test_regional_grid_keeps_order() {
        let g = grid(
            GridSpec::new(50.0, -1.0, 235.5, 1.0, 1, 3),
            vec![1.0, 2.0, 3.0],
        );
        let g = normalize_axes(g).unwrap();
        assert_eq!(g.spec.lon_start, -124.5);
        assert_eq!(g.layers[0], vec![1.0, 2.0, 3.0]);
    }
}
