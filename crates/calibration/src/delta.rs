//! Applying a model's projected change to a baseline.

use climate_common::{CalibrationMode, ClimateError, ClimateResult, Measurement};
use climate_grid::{is_fill, Grid2D, MonthlyNormals};
use rayon::prelude::*;
use tracing::debug;

use crate::resample::cell_lookup;

/// Lower bound of the projection / historical ratio.
pub const MIN_RATIO: f64 = 0.0;

/// Upper bound of the projection / historical ratio.
pub const MAX_RATIO: f64 = 10.0;

/// Historical values with a smaller magnitude are treated as zero.
pub const NEAR_ZERO: f64 = 1e-6;

/// `p / h` clamped to `[MIN_RATIO, MAX_RATIO]`.
///
/// A near-zero `h` gives 1 when `p` is near zero too (no change) and the
/// upper bound otherwise.
pub fn ratio(historical: f64, projection: f64) -> f64 {
    if historical.abs() < NEAR_ZERO {
        if projection.abs() < NEAR_ZERO {
            1.0
        } else {
            MAX_RATIO
        }
    } else {
        (projection / historical).clamp(MIN_RATIO, MAX_RATIO)
    }
}

/// Calibrated value of one cell.
pub fn apply_delta(mode: CalibrationMode, baseline: f64, historical: f64, projection: f64) -> f64 {
    match mode {
        CalibrationMode::Additive => baseline + (projection - historical),
        CalibrationMode::Multiplicative => baseline * ratio(historical, projection),
    }
}

fn check_units(baseline: &str, historical: &str, projection: &str) -> ClimateResult<()> {
    if baseline != historical || baseline != projection {
        return Err(ClimateError::IncompatibleGrid(format!(
            "calibration inputs disagree on units: baseline '{}', historical '{}', projection '{}'",
            baseline, historical, projection
        )));
    }
    Ok(())
}

/// Calibrate one layer.
///
/// `historical` and `projection` must share a grid; the result is on the
/// baseline's grid. A cell is fill if any of its three inputs is fill or the
/// model grid does not cover it.
pub fn calibrate(
    baseline: &Grid2D,
    historical: &Grid2D,
    projection: &Grid2D,
    measurement: Measurement,
) -> ClimateResult<Grid2D> {
    if !historical.spec.same_geometry(&projection.spec, 1e-9) {
        return Err(ClimateError::IncompatibleGrid(format!(
            "historical grid {}x{} does not match projection grid {}x{}",
            historical.spec.rows, historical.spec.cols, projection.spec.rows, projection.spec.cols
        )));
    }
    check_units(&baseline.unit, &historical.unit, &projection.unit)?;

    let lookup = cell_lookup(&historical.spec, &baseline.spec);
    Ok(apply_layer(baseline, historical, projection, measurement, &lookup))
}

fn apply_layer(
    baseline: &Grid2D,
    historical: &Grid2D,
    projection: &Grid2D,
    measurement: Measurement,
    lookup: &[Option<usize>],
) -> Grid2D {
    let mode = measurement.calibration_mode();
    let fill = baseline.fill_value;

    let values = baseline
        .values
        .par_iter()
        .zip(lookup.par_iter())
        .map(|(&b, idx)| {
            let Some(i) = *idx else {
                return fill;
            };
            let h = historical.values[i];
            let p = projection.values[i];
            if is_fill(b, fill)
                || is_fill(h, historical.fill_value)
                || is_fill(p, projection.fill_value)
            {
                return fill;
            }
            let out = apply_delta(mode, b as f64, h as f64, p as f64) as f32;
            if out.is_finite() {
                out
            } else {
                fill
            }
        })
        .collect();

    Grid2D {
        spec: baseline.spec,
        values,
        fill_value: fill,
        unit: baseline.unit.clone(),
    }
}

/// Calibrate all twelve months of a set of normals.
pub fn calibrate_monthly(
    baseline: &MonthlyNormals,
    historical: &MonthlyNormals,
    projection: &MonthlyNormals,
    measurement: Measurement,
) -> ClimateResult<MonthlyNormals> {
    if !historical.spec().same_geometry(projection.spec(), 1e-9) {
        return Err(ClimateError::IncompatibleGrid(format!(
            "historical '{}' and projection '{}' are on different grids",
            historical.variable(),
            projection.variable()
        )));
    }
    check_units(baseline.unit(), historical.unit(), projection.unit())?;

    // Geometry is shared by every month, so the lookup is built once
    let lookup = cell_lookup(historical.spec(), baseline.spec());

    let mut months = Vec::with_capacity(12);
    for month in 1..=12 {
        let b = baseline.month(month)?;
        let h = historical.month(month)?;
        let p = projection.month(month)?;
        months.push(apply_layer(&b, &h, &p, measurement, &lookup));
    }

    debug!(
        measurement = %measurement,
        rows = baseline.spec().rows,
        cols = baseline.spec().cols,
        "Calibrated monthly normals"
    );

    MonthlyNormals::from_months(months, baseline.variable())
}

/// Calibrate a twelve-month series at a single location.
pub fn calibrate_point(
    baseline: &[Option<f64>; 12],
    historical: &[Option<f64>; 12],
    projection: &[Option<f64>; 12],
    measurement: Measurement,
) -> [Option<f64>; 12] {
    let mode = measurement.calibration_mode();
    let mut out = [None; 12];
    for m in 0..12 {
        if let (Some(b), Some(h), Some(p)) = (baseline[m], historical[m], projection[m]) {
            out[m] = Some(apply_delta(mode, b, h, p)).filter(|v| v.is_finite());
        }
    }
    out
}
