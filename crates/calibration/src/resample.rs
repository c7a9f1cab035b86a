//! Nearest-cell resampling between grids of different resolution.

use climate_common::GridSpec;
use climate_grid::Grid2D;
use rayon::prelude::*;

/// For every cell of `target`, the flat index of the `source` cell that
/// contains its centre, or `None` where the source has no coverage.
///
/// Longitudes wrap, so a source stored 0..360 still serves a target in
/// -180..180.
pub fn cell_lookup(source: &GridSpec, target: &GridSpec) -> Vec<Option<usize>> {
    let cols: Vec<Option<usize>> = (0..target.cols)
        .map(|col| {
            source
                .nearest_index(source.lat_at(0), target.lon_at(col))
                .map(|(_, c)| c)
        })
        .collect();

    let mut lookup = Vec::with_capacity(target.len());
    for row in 0..target.rows {
        let src_row = source
            .nearest_index(target.lat_at(row), source.lon_at(0))
            .map(|(r, _)| r);
        for col in &cols {
            lookup.push(match (src_row, col) {
                (Some(r), Some(c)) => Some(source.flat_index(r, *c)),
                _ => None,
            });
        }
    }
    lookup
}

/// Resample `source` onto `target` by nearest cell. Cells without source
/// coverage, or whose source cell is fill, are fill.
pub fn resample_nearest(source: &Grid2D, target: &GridSpec) -> Grid2D {
    if source.spec.same_geometry(target, 1e-9) {
        return source.clone();
    }

    let lookup = cell_lookup(&source.spec, target);
    let values = lookup
        .par_iter()
        .map(|idx| match idx {
            Some(i) => source.values[*i],
            None => source.fill_value,
        })
        .collect();

    Grid2D {
        spec: *target,
        values,
        fill_value: source.fill_value,
        unit: source.unit.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coarse() -> Grid2D {
        // 2x4 global grid of 90 degree cells, centres at +-45 lat
        let spec = GridSpec::new(45.0, -90.0, -135.0, 90.0, 2, 4);
        Grid2D::new(spec, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, -9999.0], -9999.0, "degC")
            .unwrap()
    }

    #[test]
    fn test_resample_to_finer_grid() {
        let target = GridSpec::new(67.5, -45.0, -157.5, 45.0, 4, 8);
        let out = resample_nearest(&coarse(), &target);
        assert_eq!(out.spec, target);
        assert_eq!(&out.values[0..8], &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0]);
        assert_eq!(&out.values[24..32], &[5.0, 5.0, 6.0, 6.0, 7.0, 7.0, -9999.0, -9999.0]);
    }

    #[test]
    fn test_source_stored_east_of_greenwich() {
        // Same data stored with columns centred 45..315
        let spec = GridSpec::new(45.0, -90.0, 45.0, 90.0, 2, 4);
        let source = Grid2D::new(spec, vec![3.0, 4.0, 1.0, 2.0, 7.0, 0.0, 5.0, 6.0], -9999.0, "degC")
            .unwrap();
        let target = GridSpec::new(45.0, -90.0, -135.0, 90.0, 2, 4);
        let out = resample_nearest(&source, &target);
        assert_eq!(out.values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 0.0]);
    }

    #[test]
    fn test_uncovered_cells_are_fill() {
        // Regional source over the northern tropics only
        let spec = GridSpec::new(20.0, -10.0, -10.0, 10.0, 2, 3);
        let source = Grid2D::new(spec, vec![1.0; 6], -9999.0, "mm").unwrap();
        let target = GridSpec::new(45.0, -90.0, -135.0, 90.0, 2, 4);
        let out = resample_nearest(&source, &target);
        assert!(out.values.iter().all(|v| *v == -9999.0));
    }

    #[test]
    fn test_identical_geometry_is_copy() {
        let grid = coarse();
        assert_eq!(resample_nearest(&grid, &grid.spec), grid);
    }
}
