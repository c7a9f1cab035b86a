//! Conversion of source units into each measurement's canonical unit.
//!
//! The table below is the complete set of supported conversions. A unit that
//! is not listed for a measurement's kind is an error, never a pass-through.

use climate_common::{ClimateError, ClimateResult, Measurement, MeasurementKind, Unit};
use climate_grid::MonthlyNormals;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Mean length of a month over the Gregorian 400-year cycle.
const MEAN_MONTH_DAYS: f64 = 30.436875;

/// Mean length of February over the Gregorian 400-year cycle.
const MEAN_FEBRUARY_DAYS: f64 = 28.2425;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Identity,
    /// `K - 273.15`
    KelvinToCelsius,
    /// `cm * 10`
    CentimetresToMillimetres,
    /// `m * 1000`
    MetresToMillimetres,
    /// `kg m-2 s-1` (= mm/s) times the seconds in the month.
    FluxRateToMillimetres,
}

const CONVERSIONS: &[(MeasurementKind, &str, Conversion)] = &[
    (MeasurementKind::Temperature, "degC", Conversion::Identity),
    (MeasurementKind::Temperature, "deg C", Conversion::Identity),
    (MeasurementKind::Temperature, "C", Conversion::Identity),
    (MeasurementKind::Temperature, "celsius", Conversion::Identity),
    (MeasurementKind::Temperature, "degrees_celsius", Conversion::Identity),
    (MeasurementKind::Temperature, "K", Conversion::KelvinToCelsius),
    (MeasurementKind::Temperature, "degK", Conversion::KelvinToCelsius),
    (MeasurementKind::Temperature, "deg K", Conversion::KelvinToCelsius),
    (MeasurementKind::Temperature, "kelvin", Conversion::KelvinToCelsius),
    (MeasurementKind::Flux, "mm", Conversion::Identity),
    (MeasurementKind::Flux, "mm/month", Conversion::Identity),
    (MeasurementKind::Flux, "mm month-1", Conversion::Identity),
    (MeasurementKind::Flux, "cm", Conversion::CentimetresToMillimetres),
    (MeasurementKind::Flux, "m", Conversion::MetresToMillimetres),
    (MeasurementKind::Flux, "kg m-2 s-1", Conversion::FluxRateToMillimetres),
    (MeasurementKind::Flux, "kg/m2/s", Conversion::FluxRateToMillimetres),
    (MeasurementKind::Flux, "kg m^-2 s^-1", Conversion::FluxRateToMillimetres),
    (MeasurementKind::Flux, "mm/s", Conversion::FluxRateToMillimetres),
    (MeasurementKind::Static, "m", Conversion::Identity),
    (MeasurementKind::Static, "meters", Conversion::Identity),
    (MeasurementKind::Static, "metres", Conversion::Identity),
];

/// Days in a month for flux integration; `0` is the mean month of a year.
pub fn days_in_month(month: u32) -> f64 {
    match month {
        0 => MEAN_MONTH_DAYS,
        2 => MEAN_FEBRUARY_DAYS,
        4 | 6 | 9 | 11 => 30.0,
        _ => 31.0,
    }
}

impl Conversion {
    /// Look up the conversion for a measurement from `source_unit`.
    pub fn lookup(measurement: Measurement, source_unit: &str) -> ClimateResult<Self> {
        let unit = source_unit.trim();
        let kind = measurement.kind();
        CONVERSIONS
            .iter()
            .find(|(k, u, _)| {
                *k == kind && (*u == unit || (u.len() > 1 && u.eq_ignore_ascii_case(unit)))
            })
            .map(|(_, _, c)| *c)
            .ok_or_else(|| ClimateError::UnsupportedUnit {
                unit: source_unit.to_string(),
                measurement: measurement.to_string(),
            })
    }

    /// Convert one value; `month` (0..=12) matters only for flux rates.
    pub fn apply(&self, value: f64, month: u32) -> f64 {
        match self {
            Conversion::Identity => value,
            Conversion::KelvinToCelsius => value - 273.15,
            Conversion::CentimetresToMillimetres => value * 10.0,
            Conversion::MetresToMillimetres => value * 1000.0,
            Conversion::FluxRateToMillimetres => value * SECONDS_PER_DAY * days_in_month(month),
        }
    }
}

/// Convert `value` from `source_unit` into the canonical unit of `measurement`.
pub fn to_canonical_unit(
    value: f64,
    source_unit: &str,
    measurement: Measurement,
    month: u32,
) -> ClimateResult<(f64, Unit)> {
    let conversion = Conversion::lookup(measurement, source_unit)?;
    Ok((conversion.apply(value, month), measurement.canonical_unit()))
}

/// Convert every month of a set of normals into the canonical unit.
pub fn convert_normals(
    normals: &MonthlyNormals,
    measurement: Measurement,
) -> ClimateResult<MonthlyNormals> {
    let conversion = Conversion::lookup(measurement, normals.unit())?;
    let unit = measurement.canonical_unit();
    Ok(normals.map_months(unit.as_str(), |month, v| {
        conversion.apply(v as f64, month) as f32
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kelvin_to_celsius() {
        let (value, unit) = to_canonical_unit(280.0, "K", Measurement::Tavg, 1).unwrap();
        assert_eq!(unit, Unit::DegC);
        assert_eq!((value * 100.0).round() / 100.0, 6.85);
    }

    #[test]
    fn test_flux_rate_uses_month_length() {
        let rate = 1.0 / SECONDS_PER_DAY; // 1 mm per day
        let (jan, unit) = to_canonical_unit(rate, "kg m-2 s-1", Measurement::Precip, 1).unwrap();
        assert_eq!(unit, Unit::Mm);
        assert!((jan - 31.0).abs() < 1e-9);

        let (feb, _) = to_canonical_unit(rate, "kg m-2 s-1", Measurement::Precip, 2).unwrap();
        assert!((feb - 28.2425).abs() < 1e-9);

        let (annual, _) = to_canonical_unit(rate, "kg m-2 s-1", Measurement::Precip, 0).unwrap();
        assert!((annual - 30.436875).abs() < 1e-9);
    }

    #[test]
    fn test_pass_through_canonical() {
        let (v, u) = to_canonical_unit(12.5, "degC", Measurement::Tmax, 7).unwrap();
        assert_eq!((v, u), (12.5, Unit::DegC));
        let (v, u) = to_canonical_unit(1500.0, "m", Measurement::Elevation, 0).unwrap();
        assert_eq!((v, u), (1500.0, Unit::M));
        let (v, _) = to_canonical_unit(2.5, "cm", Measurement::Precip, 3).unwrap();
        assert_eq!(v, 25.0);
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let err = to_canonical_unit(1.0, "furlongs", Measurement::Precip, 1).unwrap_err();
        assert!(matches!(err, ClimateError::UnsupportedUnit { .. }));

        // A valid unit for the wrong kind of measurement is rejected too
        let err = to_canonical_unit(1.0, "K", Measurement::Precip, 1).unwrap_err();
        assert!(matches!(err, ClimateError::UnsupportedUnit { .. }));

        let err = to_canonical_unit(1.0, "", Measurement::Tavg, 1).unwrap_err();
        assert!(matches!(err, ClimateError::UnsupportedUnit { .. }));
    }

    #[test]
    fn test_single_letter_units_are_case_sensitive() {
        // "k" is not Kelvin and "M" is not metres
        assert!(Conversion::lookup(Measurement::Tavg, "k").is_err());
        assert!(Conversion::lookup(Measurement::Elevation, "M").is_err());
        assert_eq!(
            Conversion::lookup(Measurement::Tavg, "Kelvin").unwrap(),
            Conversion::KelvinToCelsius
        );
    }

    #[test]
    fn test_every_kind_has_identity() {
        for m in Measurement::ALL {
            let canonical = m.canonical_unit();
            assert_eq!(
                Conversion::lookup(m, canonical.as_str()).unwrap(),
                Conversion::Identity,
                "{}",
                m
            );
        }
    }
}
