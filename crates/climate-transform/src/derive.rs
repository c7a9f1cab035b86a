//! Deriving a missing temperature measure from the other two.
//!
//! `tavg = (tmin + tmax) / 2`, so any two of the three determine the third.

use climate_common::{ClimateError, ClimateResult, GridSpec};
use climate_grid::{Grid2D, MonthlyNormals};

/// Fill in whichever of `(tavg, tmin, tmax)` can be derived from the others.
///
/// Present values are returned unchanged. With fewer than two present nothing
/// can be derived.
pub fn derive_missing_temperature(
    tavg: Option<f64>,
    tmin: Option<f64>,
    tmax: Option<f64>,
) -> (Option<f64>, Option<f64>, Option<f64>) {
    match (tavg, tmin, tmax) {
        (None, Some(lo), Some(hi)) => (Some((lo + hi) / 2.0), Some(lo), Some(hi)),
        (Some(avg), None, Some(hi)) => (Some(avg), Some(2.0 * avg - hi), Some(hi)),
        (Some(avg), Some(lo), None) => (Some(avg), Some(lo), Some(2.0 * avg - lo)),
        other => other,
    }
}

/// Round to one decimal place, the precision normals are stored at.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Monthly normals for all three temperature measures.
#[derive(Debug, Clone)]
pub struct TemperatureNormals {
    pub tavg: MonthlyNormals,
    pub tmin: MonthlyNormals,
    pub tmax: MonthlyNormals,
}

fn derive_month(
    spec: GridSpec,
    fill: f32,
    unit: &str,
    tavg: Option<&[f32]>,
    tmin: Option<&[f32]>,
    tmax: Option<&[f32]>,
    fills: (f32, f32, f32),
) -> ClimateResult<[Grid2D; 3]> {
    let n = spec.len();
    let mut out = [vec![fill; n], vec![fill; n], vec![fill; n]];
    let pick = |layer: Option<&[f32]>, layer_fill: f32, i: usize| {
        layer
            .map(|l| l[i])
            .filter(|v| v.is_finite() && *v != layer_fill)
            .map(|v| v as f64)
    };

    for i in 0..n {
        let (avg, lo, hi) = derive_missing_temperature(
            pick(tavg, fills.0, i),
            pick(tmin, fills.1, i),
            pick(tmax, fills.2, i),
        );
        for (slot, value) in out.iter_mut().zip([avg, lo, hi]) {
            if let Some(v) = value {
                slot[i] = v as f32;
            }
        }
    }

    let [a, b, c] = out;
    Ok([
        Grid2D::new(spec, a, fill, unit)?,
        Grid2D::new(spec, b, fill, unit)?,
        Grid2D::new(spec, c, fill, unit)?,
    ])
}

/// Complete a set of temperature normals where one measure is missing.
///
/// All inputs must be in the same unit on the same grid. Cells where fewer
/// than two measures have a value stay fill in the derived output.
pub fn derive_temperature_normals(
    tavg: Option<&MonthlyNormals>,
    tmin: Option<&MonthlyNormals>,
    tmax: Option<&MonthlyNormals>,
) -> ClimateResult<TemperatureNormals> {
    let present: Vec<&MonthlyNormals> = [tavg, tmin, tmax].into_iter().flatten().collect();
    if present.len() < 2 {
        return Err(ClimateError::MissingData(
            "need at least two of tavg, tmin, tmax to derive the third".to_string(),
        ));
    }

    let reference = present[0];
    let spec = *reference.spec();
    let unit = reference.unit().to_string();
    for other in &present[1..] {
        if !other.spec().same_geometry(&spec, 1e-9) {
            return Err(ClimateError::IncompatibleGrid(format!(
                "'{}' and '{}' are on different grids",
                reference.variable(),
                other.variable()
            )));
        }
        if other.unit() != unit {
            return Err(ClimateError::Format(format!(
                "'{}' is in '{}', '{}' in '{}'",
                other.variable(),
                other.unit(),
                reference.variable(),
                unit
            )));
        }
    }

    let fill = reference.fill_value();
    let fill_of = |n: Option<&MonthlyNormals>| n.map_or(fill, |n| n.fill_value());
    let fills = (fill_of(tavg), fill_of(tmin), fill_of(tmax));

    let mut months: [Vec<Grid2D>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for month in 1..=12 {
        let derived = derive_month(
            spec,
            fill,
            &unit,
            tavg.map(|n| n.month_values(month)),
            tmin.map(|n| n.month_values(month)),
            tmax.map(|n| n.month_values(month)),
            fills,
        )?;
        for (acc, grid) in months.iter_mut().zip(derived) {
            acc.push(grid);
        }
    }

    let [avg, lo, hi] = months;
    Ok(TemperatureNormals {
        tavg: MonthlyNormals::from_months(avg, "tavg")?,
        tmin: MonthlyNormals::from_months(lo, "tmin")?,
        tmax: MonthlyNormals::from_months(hi, "tmax")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_each_measure() {
        assert_eq!(
            derive_missing_temperature(None, Some(2.0), Some(12.0)),
            (Some(7.0), Some(2.0), Some(12.0))
        );
        assert_eq!(
            derive_missing_temperature(Some(7.0), None, Some(12.0)),
            (Some(7.0), Some(2.0), Some(12.0))
        );
        assert_eq!(
            derive_missing_temperature(Some(7.0), Some(2.0), None),
            (Some(7.0), Some(2.0), Some(12.0))
        );
    }

    #[test]
    fn test_underivable_stays_missing() {
        assert_eq!(derive_missing_temperature(None, None, None), (None, None, None));
        assert_eq!(
            derive_missing_temperature(Some(3.0), None, None),
            (Some(3.0), None, None)
        );
    }

    #[test]
    fn test_derivation_identity() {
        let samples = [-40.0, -12.3, -0.1, 0.0, 0.7, 15.25, 33.3, 49.9];
        for &lo in &samples {
            for &hi in &samples {
                let (avg, tmin, tmax) = derive_missing_temperature(None, Some(lo), Some(hi));
                let recomputed = (tmin.unwrap() + tmax.unwrap()) / 2.0;
                assert_eq!(avg.unwrap(), recomputed);
                assert_eq!(recomputed, (lo + hi) / 2.0);
            }
        }
    }

    #[test]
    fn test_present_values_are_not_overwritten() {
        // Inconsistent inputs are left alone
        assert_eq!(
            derive_missing_temperature(Some(1.0), Some(2.0), Some(3.0)),
            (Some(1.0), Some(2.0), Some(3.0))
        );
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(6.85), 6.9);
        assert_eq!(round_to_tenth(-3.14159), -3.1);
        assert_eq!(round_to_tenth(10.0), 10.0);
    }
}
