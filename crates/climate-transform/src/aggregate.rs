//! Temporal aggregation: time series to monthly normals, months to periods.

use climate_common::{
    AnnualReduction, ClimateError, ClimateResult, Measurement, Period, TimeAxis,
};
use climate_grid::{is_fill, mean_of_layers, Grid, Grid2D, MonthlyNormals};
use tracing::{debug, info, warn};

/// Reduce a grid to twelve monthly normals over `start_year..=end_year`.
///
/// Normals pass through unchanged and a static grid is repeated for every
/// month. For a dated series each month is the per-cell mean of all steps
/// in that month within the year window. Twelve dated steps that all lie
/// outside the window are a climatology with placeholder dates and are
/// taken as twelve months, January first.
pub fn aggregate_by_month(
    grid: &Grid,
    start_year: i32,
    end_year: i32,
) -> ClimateResult<MonthlyNormals> {
    if start_year > end_year {
        return Err(ClimateError::OutOfBounds(format!(
            "year window {}-{} is reversed",
            start_year, end_year
        )));
    }

    match &grid.time {
        TimeAxis::MonthlyNormals => MonthlyNormals::from_grid(grid.clone()),
        TimeAxis::Static => {
            let layer = grid.layer(0)?;
            MonthlyNormals::from_months(vec![layer; 12], grid.variable.clone())
        }
        TimeAxis::Dated { .. } => aggregate_series(grid, start_year, end_year),
    }
}

fn aggregate_series(grid: &Grid, start_year: i32, end_year: i32) -> ClimateResult<MonthlyNormals> {
    let dates = grid.time.year_months()?;

    let window = start_year..=end_year;
    if dates.len() == 12 && dates.iter().all(|(year, _)| !window.contains(year)) {
        info!(
            variable = %grid.variable,
            year = dates[0].0,
            "Twelve steps outside the year window, reading as monthly normals"
        );
        let mut normals = grid.clone();
        normals.time = TimeAxis::MonthlyNormals;
        return MonthlyNormals::from_grid(normals);
    }

    if let Some(&(year, month)) = dates.first() {
        if month != 1 {
            warn!(
                variable = %grid.variable,
                first_year = year,
                first_month = month,
                "Time series does not start in January"
            );
        }
    }

    let mut by_month: [Vec<usize>; 12] = Default::default();
    for (idx, &(year, month)) in dates.iter().enumerate() {
        if window.contains(&year) {
            by_month[month as usize - 1].push(idx);
        }
    }

    let mut months = Vec::with_capacity(12);
    for (m, indices) in by_month.iter().enumerate() {
        if indices.is_empty() {
            return Err(ClimateError::MissingData(format!(
                "no time steps for month {} of '{}' in {}-{}",
                m + 1,
                grid.variable,
                start_year,
                end_year
            )));
        }
        months.push(mean_of_layers(grid, indices));
    }

    debug!(
        variable = %grid.variable,
        steps = dates.len(),
        start_year,
        end_year,
        "Aggregated time series to monthly normals"
    );

    MonthlyNormals::from_months(months, grid.variable.clone())
}

fn reduce(values: impl Iterator<Item = f64>, reduction: AnnualReduction) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return None;
    }
    Some(match reduction {
        AnnualReduction::Sum => sum,
        AnnualReduction::Mean => sum / count as f64,
    })
}

/// Annual value of twelve monthly values: a mean for temperature-like
/// measurements and a sum for fluxes. Missing months are skipped.
pub fn annual_value(monthly: &[Option<f64>], measurement: Measurement) -> Option<f64> {
    reduce(monthly.iter().flatten().copied(), measurement.annual_reduction())
}

/// Value of `period` from twelve monthly values (January first).
pub fn period_value(
    monthly: &[Option<f64>],
    measurement: Measurement,
    period: Period,
) -> ClimateResult<Option<f64>> {
    if monthly.len() != 12 {
        return Err(ClimateError::MissingData(format!(
            "{} monthly values, expected 12",
            monthly.len()
        )));
    }
    let values = period
        .months()
        .into_iter()
        .filter_map(|m| monthly[m as usize - 1]);
    Ok(reduce(values, measurement.annual_reduction()))
}

/// Per-cell value of `period` over a set of monthly normals.
pub fn period_grid(
    normals: &MonthlyNormals,
    measurement: Measurement,
    period: Period,
) -> ClimateResult<Grid2D> {
    if let Period::Month(m) = period {
        return normals.month(m);
    }

    let months = period.months();
    let fill = normals.fill_value();
    let reduction = measurement.annual_reduction();
    let layers: Vec<&[f32]> = months.iter().map(|&m| normals.month_values(m)).collect();
    let values = (0..normals.spec().len())
        .map(|cell| {
            let available = layers
                .iter()
                .map(|layer| layer[cell])
                .filter(|&v| !is_fill(v, fill))
                .map(f64::from);
            reduce(available, reduction).map_or(fill, |v| v as f32)
        })
        .collect();

    Grid2D::new(*normals.spec(), values, fill, normals.unit())
}
