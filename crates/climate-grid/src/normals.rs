//! Twelve-month climatological normals.

use climate_common::{ClimateError, ClimateResult, GridSpec, TimeAxis};

use crate::grid::{is_fill, Grid2D};
use crate::Grid;

/// Monthly normals of one dataset: exactly twelve layers, January first.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyNormals(Grid);

impl MonthlyNormals {
    /// Wrap a grid whose time axis is [`TimeAxis::MonthlyNormals`].
    pub fn from_grid(grid: Grid) -> ClimateResult<Self> {
        if grid.time != TimeAxis::MonthlyNormals || grid.layer_count() != 12 {
            return Err(ClimateError::Format(format!(
                "'{}' is not a set of 12 monthly normals",
                grid.variable
            )));
        }
        Ok(Self(grid))
    }

    /// Build from twelve monthly layers (January first).
    pub fn from_months(months: Vec<Grid2D>, variable: impl Into<String>) -> ClimateResult<Self> {
        if months.len() != 12 {
            return Err(ClimateError::MissingData(format!(
                "{} monthly layers, expected 12",
                months.len()
            )));
        }
        Self::from_grid(Grid::from_monthly(months, variable)?)
    }

    pub fn spec(&self) -> &GridSpec {
        &self.0.spec
    }

    pub fn fill_value(&self) -> f32 {
        self.0.fill_value
    }

    pub fn unit(&self) -> &str {
        &self.0.unit
    }

    pub fn variable(&self) -> &str {
        &self.0.variable
    }

    /// Layer for `month` (1..=12).
    pub fn month(&self, month: u32) -> ClimateResult<Grid2D> {
        if !(1..=12).contains(&month) {
            return Err(ClimateError::OutOfBounds(format!(
                "month {} is outside 1..=12",
                month
            )));
        }
        self.0.layer(month as usize - 1)
    }

    /// Raw values of `month` (1..=12), row-major. Panics on an invalid month.
    pub fn month_values(&self, month: u32) -> &[f32] {
        &self.0.layers[month as usize - 1]
    }

    /// The twelve monthly values at one cell, `None` where missing.
    pub fn cell_series(&self, row: usize, col: usize) -> [Option<f32>; 12] {
        let idx = self.0.spec.flat_index(row, col);
        let mut out = [None; 12];
        for (m, layer) in self.0.layers.iter().enumerate() {
            let v = layer[idx];
            if !is_fill(v, self.0.fill_value) {
                out[m] = Some(v);
            }
        }
        out
    }

    /// Apply `f(month, value)` to every non-fill value, setting a new unit.
    pub fn map_months(
        &self,
        unit: impl Into<String>,
        f: impl Fn(u32, f32) -> f32,
    ) -> MonthlyNormals {
        let mut grid = self.0.clone();
        grid.unit = unit.into();
        let fill = grid.fill_value;
        for (m, layer) in grid.layers.iter_mut().enumerate() {
            for v in layer.iter_mut() {
                if is_fill(*v, fill) {
                    *v = fill;
                } else {
                    let out = f(m as u32 + 1, *v);
                    *v = if out.is_finite() { out } else { fill };
                }
            }
        }
        MonthlyNormals(grid)
    }

    pub fn as_grid(&self) -> &Grid {
        &self.0
    }

    pub fn into_grid(self) -> Grid {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normals() -> MonthlyNormals {
        let spec = GridSpec::new(0.5, -1.0, 0.5, 1.0, 1, 2);
        let months = (1..=12)
            .map(|m| {
                let second = if m == 2 { -9999.0 } else { m as f32 * 10.0 };
                Grid2D::new(spec, vec![m as f32, second], -9999.0, "K").unwrap()
            })
            .collect();
        MonthlyNormals::from_months(months, "tas").unwrap()
    }

    #[test]
    fn test_cell_series() {
        let n = normals();
        let series = n.cell_series(0, 1);
        assert_eq!(series[0], Some(10.0));
        assert_eq!(series[1], None);
        assert_eq!(series[11], Some(120.0));
    }

    #[test]
    fn test_map_months_keeps_fill() {
        let n = normals().map_months("degC", |_, v| v - 273.15);
        assert_eq!(n.unit(), "degC");
        let feb = n.month(2).unwrap();
        assert_eq!(feb.values[1], -9999.0);
        assert!((feb.values[0] - (2.0 - 273.15)).abs() < 1e-4);
    }

    #[test]
    fn test_wrong_month_count() {
        let spec = GridSpec::new(0.5, -1.0, 0.5, 1.0, 1, 1);
        let months = vec![Grid2D::new(spec, vec![1.0], -9999.0, "K").unwrap(); 11];
        assert!(MonthlyNormals::from_months(months, "tas").is_err());
        assert!(normals().month(13).is_err());
    }
}
