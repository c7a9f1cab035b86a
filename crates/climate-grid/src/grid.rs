//! In-memory grids.

use climate_common::{ClimateError, ClimateResult, GridSpec, TimeAxis};

/// A stack of co-registered layers over one [`GridSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub spec: GridSpec,
    pub time: TimeAxis,
    /// One row-major `Vec` per time step.
    pub layers: Vec<Vec<f32>>,
    pub fill_value: f32,
    /// Unit string as declared by the source (e.g. `K`, `kg m-2 s-1`).
    pub unit: String,
    /// Source variable name.
    pub variable: String,
}

/// A single layer over one [`GridSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D {
    pub spec: GridSpec,
    pub values: Vec<f32>,
    pub fill_value: f32,
    pub unit: String,
}

/// Whether `value` marks missing data for a grid with `fill_value`.
#[inline]
pub fn is_fill(value: f32, fill_value: f32) -> bool {
    !value.is_finite() || value == fill_value
}

impl Grid {
    /// Build a grid, checking that the layer count matches the time axis and
    /// every layer matches the geometry. Non-finite values become fill.
    pub fn new(
        spec: GridSpec,
        time: TimeAxis,
        mut layers: Vec<Vec<f32>>,
        fill_value: f32,
        unit: impl Into<String>,
        variable: impl Into<String>,
    ) -> ClimateResult<Self> {
        if layers.len() != time.expected_layers() {
            return Err(ClimateError::Format(format!(
                "{} layers for a time axis of {} steps",
                layers.len(),
                time.expected_layers()
            )));
        }
        for layer in &mut layers {
            check_layer_len(&spec, layer.len())?;
            for v in layer.iter_mut() {
                if !v.is_finite() {
                    *v = fill_value;
                }
            }
        }
        Ok(Self {
            spec,
            time,
            layers,
            fill_value,
            unit: unit.into(),
            variable: variable.into(),
        })
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Copy of one layer as a 2D grid.
    pub fn layer(&self, index: usize) -> ClimateResult<Grid2D> {
        let values = self.layers.get(index).ok_or_else(|| {
            ClimateError::MissingData(format!(
                "layer {} of {} in '{}'",
                index,
                self.layers.len(),
                self.variable
            ))
        })?;
        Ok(Grid2D {
            spec: self.spec,
            values: values.clone(),
            fill_value: self.fill_value,
            unit: self.unit.clone(),
        })
    }

    /// Stack twelve monthly layers (January first) into a normals grid.
    pub fn from_monthly(months: Vec<Grid2D>, variable: impl Into<String>) -> ClimateResult<Self> {
        let first = months
            .first()
            .ok_or_else(|| ClimateError::MissingData("no monthly layers".to_string()))?;
        let spec = first.spec;
        let fill_value = first.fill_value;
        let unit = first.unit.clone();

        let mut layers = Vec::with_capacity(months.len());
        for (i, month) in months.into_iter().enumerate() {
            if !month.spec.same_geometry(&spec, 1e-9) {
                return Err(ClimateError::Format(format!(
                    "month {} is on a different grid than January",
                    i + 1
                )));
            }
            if month.unit != unit {
                return Err(ClimateError::Format(format!(
                    "month {} has unit '{}', expected '{}'",
                    i + 1,
                    month.unit,
                    unit
                )));
            }
            let values = month
                .values
                .into_iter()
                .map(|v| if is_fill(v, month.fill_value) { fill_value } else { v })
                .collect();
            layers.push(values);
        }

        Grid::new(spec, TimeAxis::MonthlyNormals, layers, fill_value, unit, variable)
    }
}

impl Grid2D {
    pub fn new(
        spec: GridSpec,
        values: Vec<f32>,
        fill_value: f32,
        unit: impl Into<String>,
    ) -> ClimateResult<Self> {
        check_layer_len(&spec, values.len())?;
        let values = values
            .into_iter()
            .map(|v| if v.is_finite() { v } else { fill_value })
            .collect();
        Ok(Self {
            spec,
            values,
            fill_value,
            unit: unit.into(),
        })
    }

    /// A grid with every cell set to fill.
    pub fn filled(spec: GridSpec, fill_value: f32, unit: impl Into<String>) -> Self {
        Self {
            spec,
            values: vec![fill_value; spec.len()],
            fill_value,
            unit: unit.into(),
        }
    }

    /// Value at `(row, col)`, `None` for fill or out-of-range indices.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.spec.rows || col >= self.spec.cols {
            return None;
        }
        let v = self.values[self.spec.flat_index(row, col)];
        (!is_fill(v, self.fill_value)).then_some(v)
    }

    /// Value of the cell containing `(lat, lon)`.
    pub fn sample(&self, lat: f64, lon: f64) -> Option<f32> {
        let (row, col) = self.spec.nearest_index(lat, lon)?;
        self.get(row, col)
    }

    pub fn is_fill(&self, value: f32) -> bool {
        is_fill(value, self.fill_value)
    }

    /// Apply `f` to every non-fill value.
    pub fn map_values(&self, f: impl Fn(f32) -> f32) -> Grid2D {
        let values = self
            .values
            .iter()
            .map(|&v| {
                if self.is_fill(v) {
                    self.fill_value
                } else {
                    let out = f(v);
                    if out.is_finite() {
                        out
                    } else {
                        self.fill_value
                    }
                }
            })
            .collect();
        Grid2D {
            spec: self.spec,
            values,
            fill_value: self.fill_value,
            unit: self.unit.clone(),
        }
    }

    /// Number of non-fill cells.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|&&v| !self.is_fill(v)).count()
    }
}

fn check_layer_len(spec: &GridSpec, len: usize) -> ClimateResult<()> {
    if len != spec.len() {
        return Err(ClimateError::Format(format!(
            "layer has {} values, grid is {}x{}",
            len, spec.rows, spec.cols
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GridSpec {
        GridSpec::new(1.5, -1.0, -1.5, 1.0, 2, 3)
    }

    #[test]
    fn test_non_finite_becomes_fill() {
        let g = Grid2D::new(spec(), vec![1.0, f32::NAN, 3.0, f32::INFINITY, 5.0, 6.0], -9999.0, "K")
            .unwrap();
        assert_eq!(g.values[1], -9999.0);
        assert_eq!(g.get(0, 1), None);
        assert_eq!(g.get(1, 0), None);
        assert_eq!(g.get(1, 2), Some(6.0));
        assert_eq!(g.valid_count(), 4);
    }

    #[test]
    fn test_shape_mismatch_is_format_error() {
        let err = Grid2D::new(spec(), vec![1.0; 5], -9999.0, "K").unwrap_err();
        assert!(matches!(err, ClimateError::Format(_)));

        let err = Grid::new(spec(), TimeAxis::MonthlyNormals, vec![vec![0.0; 6]; 11], -1.0, "K", "t")
            .unwrap_err();
        assert!(matches!(err, ClimateError::Format(_)));
    }

    #[test]
    fn test_sample_and_map() {
        let g = Grid2D::new(spec(), vec![1.0, 2.0, 3.0, 4.0, -9999.0, 6.0], -9999.0, "K").unwrap();
        assert_eq!(g.sample(1.4, -0.4), Some(2.0));
        let doubled = g.map_values(|v| v * 2.0);
        assert_eq!(doubled.values, vec![2.0, 4.0, 6.0, 8.0, -9999.0, 12.0]);
    }

    #[test]
    fn test_from_monthly() {
        let months: Vec<Grid2D> = (0..12)
            .map(|m| Grid2D::new(spec(), vec![m as f32; 6], -9999.0, "degC").unwrap())
            .collect();
        let grid = Grid::from_monthly(months, "tavg").unwrap();
        assert_eq!(grid.time, TimeAxis::MonthlyNormals);
        assert_eq!(grid.layer(6).unwrap().values[0], 6.0);
        assert!(grid.layer(12).is_err());
    }
}
