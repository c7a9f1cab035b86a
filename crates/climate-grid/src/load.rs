//! Loading one or several source files into a single normalised grid.

use std::path::PathBuf;

use climate_common::{ClimateError, ClimateResult, TimeAxis};
use tracing::info;

use crate::grid::is_fill;
use crate::normalize::normalize_axes;
use crate::source::{source_for_path, GridSource, SourceOptions};
use crate::Grid;

/// Geometry tolerance when aligning inputs, in degrees.
const ALIGN_TOLERANCE: f64 = 1e-9;

/// Load `paths` and return their element-wise mean.
///
/// A cell is fill in the result if it is fill in any input. All inputs must
/// share geometry, unit and time layout.
pub fn load(paths: &[PathBuf], options: &SourceOptions) -> ClimateResult<Grid> {
    let sources = paths
        .iter()
        .map(|p| source_for_path(p, options))
        .collect::<ClimateResult<Vec<_>>>()?;
    load_sources(&sources)
}

/// [`load`] over already constructed sources.
pub fn load_sources(sources: &[Box<dyn GridSource>]) -> ClimateResult<Grid> {
    if sources.is_empty() {
        return Err(ClimateError::MissingData("no source files given".to_string()));
    }

    let mut grids = Vec::with_capacity(sources.len());
    for source in sources {
        let grid = normalize_axes(source.load()?)?;
        info!(
            source = %source.describe(),
            variable = %grid.variable,
            rows = grid.spec.rows,
            cols = grid.spec.cols,
            layers = grid.layer_count(),
            "Loaded source grid"
        );
        grids.push(grid);
    }
    mean_of(grids)
}

fn same_time_layout(a: &TimeAxis, b: &TimeAxis) -> ClimateResult<bool> {
    Ok(match (a, b) {
        (TimeAxis::Dated { .. }, TimeAxis::Dated { .. }) => a.year_months()? == b.year_months()?,
        _ => a == b,
    })
}

/// Element-wise mean of aligned grids, propagating fill.
pub fn mean_of(grids: Vec<Grid>) -> ClimateResult<Grid> {
    let mut iter = grids.into_iter();
    let mut base = iter
        .next()
        .ok_or_else(|| ClimateError::MissingData("no grids to average".to_string()))?;
    let others: Vec<Grid> = iter.collect();
    if others.is_empty() {
        return Ok(base);
    }

    for (i, other) in others.iter().enumerate() {
        let which = i + 2;
        if !base.spec.same_geometry(&other.spec, ALIGN_TOLERANCE) {
            return Err(ClimateError::Format(format!(
                "input {} is on grid {:?}, input 1 on {:?}",
                which, other.spec, base.spec
            )));
        }
        if other.layer_count() != base.layer_count()
            || !same_time_layout(&base.time, &other.time)?
        {
            return Err(ClimateError::Format(format!(
                "input {} has {} time steps, input 1 has {}",
                which,
                other.layer_count(),
                base.layer_count()
            )));
        }
        if other.unit != base.unit {
            return Err(ClimateError::Format(format!(
                "input {} is in '{}', input 1 in '{}'",
                which, other.unit, base.unit
            )));
        }
    }

    let n = (others.len() + 1) as f32;
    let fill = base.fill_value;
    for (layer_idx, layer) in base.layers.iter_mut().enumerate() {
        for (cell, value) in layer.iter_mut().enumerate() {
            if is_fill(*value, fill) {
                *value = fill;
                continue;
            }
            let mut sum = *value;
            let mut any_fill = false;
            for other in &others {
                let v = other.layers[layer_idx][cell];
                if is_fill(v, other.fill_value) {
                    any_fill = true;
                    break;
                }
                sum += v;
            }
            *value = if any_fill { fill } else { sum / n };
        }
    }

    Ok(base)
}
