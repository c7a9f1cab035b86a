//! Colour ramps for climate normals.
//!
//! Every ramp is a fixed table of breakpoints. Between breakpoints colours
//! are interpolated linearly; outside the table they clamp to the end
//! colours. The legend images shipped with the map are generated from these
//! tables, so the values below must not drift.
//!
//! | Ramp | Unit | Breakpoints (monthly) |
//! |---|---|---|
//! | temperature | degC | -40 to 35 every 5, blue below the reference, red above |
//! | precipitation | mm | 0, 10, 25, 50, 75, 100, 150, 300, 400, 500 |
//! | evapotranspiration | mm | 0, 10, 25, 50, 75, 100, 150, 200, 250 |
//! | elevation | m | 0, 200, 500, 1000, 2000, 3000, 5000 |
//!
//! Flux breakpoints are per month. Seasonal and annual normals are sums, so
//! their breakpoints are multiplied by the number of months in the period.

use climate_common::{
    ClimateError, ClimateResult, Measurement, MeasurementKind, Period,
};
use serde::Serialize;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    /// Parse `#RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::opaque(r, g, b))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Linear color interpolation
fn interpolate_color(low: Color, high: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Color::new(
        mix(low.r, high.r),
        mix(low.g, high.g),
        mix(low.b, high.b),
        mix(low.a, high.a),
    )
}

// Temperature bands step by 5 degC. Each breakpoint carries the colour of
// the band starting there for positive values, ending there for negative.
const TEMPERATURE_STOPS: &[(f64, Color)] = &[
    (-40.0, Color::opaque(0, 0, 255)),
    (-35.0, Color::opaque(34, 34, 255)),
    (-30.0, Color::opaque(68, 68, 255)),
    (-25.0, Color::opaque(102, 102, 255)),
    (-20.0, Color::opaque(136, 136, 255)),
    (-15.0, Color::opaque(170, 170, 255)),
    (-10.0, Color::opaque(204, 204, 255)),
    (-5.0, Color::opaque(238, 238, 255)),
    (0.0, Color::opaque(255, 238, 238)),
    (5.0, Color::opaque(255, 204, 204)),
    (10.0, Color::opaque(255, 170, 170)),
    (15.0, Color::opaque(255, 136, 136)),
    (20.0, Color::opaque(255, 102, 102)),
    (25.0, Color::opaque(255, 68, 68)),
    (30.0, Color::opaque(255, 34, 34)),
    (35.0, Color::opaque(255, 0, 0)),
];

const PRECIPITATION_STOPS: &[(f64, Color)] = &[
    (0.0, Color::opaque(240, 230, 90)),
    (10.0, Color::opaque(230, 230, 120)),
    (25.0, Color::opaque(230, 230, 180)),
    (50.0, Color::opaque(240, 255, 240)),
    (75.0, Color::opaque(150, 255, 150)),
    (100.0, Color::opaque(100, 255, 100)),
    (150.0, Color::opaque(50, 255, 50)),
    (300.0, Color::opaque(0, 255, 0)),
    (400.0, Color::opaque(60, 60, 255)),
    (500.0, Color::opaque(0, 0, 255)),
];

// ColorBrewer YlOrBr
const EVAPOTRANSPIRATION_STOPS: &[(f64, Color)] = &[
    (0.0, Color::opaque(255, 255, 229)),
    (10.0, Color::opaque(255, 247, 188)),
    (25.0, Color::opaque(254, 227, 145)),
    (50.0, Color::opaque(254, 196, 79)),
    (75.0, Color::opaque(254, 153, 41)),
    (100.0, Color::opaque(236, 112, 20)),
    (150.0, Color::opaque(204, 76, 2)),
    (200.0, Color::opaque(153, 52, 4)),
    (250.0, Color::opaque(102, 37, 6)),
];

const ELEVATION_STOPS: &[(f64, Color)] = &[
    (0.0, Color::opaque(0, 128, 64)),
    (200.0, Color::opaque(96, 176, 64)),
    (500.0, Color::opaque(208, 208, 112)),
    (1000.0, Color::opaque(192, 144, 80)),
    (2000.0, Color::opaque(144, 96, 64)),
    (3000.0, Color::opaque(160, 160, 160)),
    (5000.0, Color::opaque(255, 255, 255)),
];

/// Where the temperature ramp turns from blue to red for a period.
///
/// Monthly and annual normals share the 0 degC reference today; the table
/// stays so a period can be re-centred without touching the breakpoints.
fn temperature_reference(period: Period) -> f64 {
    match period {
        Period::Annual | Period::Month(_) | Period::Season(_) => 0.0,
    }
}

/// A colour breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorStop {
    pub value: f64,
    pub color: Color,
}

/// One row of a legend: a breakpoint and its colour as hex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub value: f64,
    pub color: String,
}

/// Piecewise-linear colour ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Build from breakpoints in strictly ascending order.
    pub fn new(stops: Vec<ColorStop>) -> ClimateResult<Self> {
        if stops.is_empty() {
            return Err(ClimateError::Render("colour ramp has no stops".to_string()));
        }
        if stops.windows(2).any(|w| w[0].value >= w[1].value) {
            return Err(ClimateError::Render(
                "colour ramp stops must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { stops })
    }

    fn from_table(table: &[(f64, Color)], offset: f64, scale: f64) -> Self {
        let stops = table
            .iter()
            .map(|&(value, color)| ColorStop {
                value: value * scale + offset,
                color,
            })
            .collect();
        Self { stops }
    }

    /// Monthly ramp for a measurement.
    pub fn for_measurement(measurement: Measurement) -> Self {
        Self::for_period(measurement, Period::Month(1))
    }

    /// Ramp for a measurement's normals over `period`.
    pub fn for_period(measurement: Measurement, period: Period) -> Self {
        match measurement.kind() {
            MeasurementKind::Temperature => {
                Self::from_table(TEMPERATURE_STOPS, temperature_reference(period), 1.0)
            }
            MeasurementKind::Flux => {
                let months = period.months().len() as f64;
                let table = match measurement {
                    Measurement::Precip => PRECIPITATION_STOPS,
                    _ => EVAPOTRANSPIRATION_STOPS,
                };
                Self::from_table(table, 0.0, months)
            }
            MeasurementKind::Static => Self::from_table(ELEVATION_STOPS, 0.0, 1.0),
        }
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Colour of `value`. Values outside the ramp clamp to its end colours
    /// and a value on a breakpoint gets exactly that breakpoint's colour.
    pub fn color_at(&self, value: f64) -> Color {
        let first = &self.stops[0];
        let last = &self.stops[self.stops.len() - 1];
        if value.is_nan() {
            return Color::transparent();
        }
        if value <= first.value {
            return first.color;
        }
        if value >= last.value {
            return last.color;
        }

        // First stop strictly above the value; the one before is <= value
        let upper = self.stops.partition_point(|s| s.value <= value);
        let low = &self.stops[upper - 1];
        let high = &self.stops[upper];
        if value == low.value {
            return low.color;
        }
        let t = (value - low.value) / (high.value - low.value);
        interpolate_color(low.color, high.color, t)
    }

    /// Breakpoints with hex colours, for drawing a legend.
    pub fn legend(&self) -> Vec<LegendEntry> {
        self.stops
            .iter()
            .map(|s| LegendEntry {
                value: s.value,
                color: s.color.to_hex(),
            })
            .collect()
    }
}

/// Monthly ramp colour of `value`, which must be in the measurement's
/// canonical unit.
pub fn colour_for_value(value: f64, measurement: Measurement, unit: &str) -> ClimateResult<Color> {
    if unit != measurement.canonical_unit().as_str() {
        return Err(ClimateError::UnsupportedUnit {
            unit: unit.to_string(),
            measurement: measurement.to_string(),
        });
    }
    Ok(ColorRamp::for_measurement(measurement).color_at(value))
}
