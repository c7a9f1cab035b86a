//! Rendering every tile of a pyramid in parallel.

use std::time::Instant;

use climate_common::tile::tiles_at_zoom;
use climate_common::{ClimateError, ClimateResult, TileCoord};
use climate_grid::Grid2D;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::ramp::ColorRamp;
use crate::tile::render_tile;

/// Options for [`render_pyramid`].
#[derive(Debug, Clone)]
pub struct PyramidOptions {
    /// Highest zoom level rendered; every level from 0 up is produced.
    pub max_zoom: u32,
    /// Extra attempts for a tile whose rendering or write fails.
    pub tile_retries: u32,
    /// Size of the rendering thread pool; `None` uses the global pool.
    pub threads: Option<usize>,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self {
            max_zoom: 7,
            tile_retries: 2,
            threads: None,
        }
    }
}

/// Outcome of a pyramid run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PyramidReport {
    pub written: usize,
    /// Tiles that still failed after all retries.
    pub failed: Vec<TileCoord>,
}

impl PyramidReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Render all tiles for zoom `0..=max_zoom` and hand each encoded PNG to
/// `write`.
///
/// Tiles are independent: a tile whose rendering or write still fails after
/// `tile_retries` extra attempts is logged, recorded in the report and
/// skipped.
pub fn render_pyramid<W>(
    grid: &Grid2D,
    ramp: &ColorRamp,
    options: &PyramidOptions,
    write: W,
) -> ClimateResult<PyramidReport>
where
    W: Fn(&TileCoord, &[u8]) -> ClimateResult<()> + Sync,
{
    let run = || render_levels(grid, ramp, options, &write);

    match options.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("tile-render-{}", i))
                .build()
                .map_err(|e| ClimateError::Render(format!("thread pool: {}", e)))?;
            Ok(pool.install(run))
        }
        None => Ok(run()),
    }
}

fn render_levels<W>(
    grid: &Grid2D,
    ramp: &ColorRamp,
    options: &PyramidOptions,
    write: &W,
) -> PyramidReport
where
    W: Fn(&TileCoord, &[u8]) -> ClimateResult<()> + Sync,
{
    let mut report = PyramidReport::default();

    for z in 0..=options.max_zoom {
        let start = Instant::now();
        let coords: Vec<TileCoord> = tiles_at_zoom(z).collect();

        let failed: Vec<TileCoord> = coords
            .par_iter()
            .filter_map(|coord| {
                match render_with_retries(grid, ramp, *coord, options.tile_retries, write) {
                    Ok(()) => None,
                    Err(e) => {
                        error!(
                            tile = %coord.path_fragment(),
                            error = %e,
                            "Skipping tile after retries"
                        );
                        Some(*coord)
                    }
                }
            })
            .collect();

        report.written += coords.len() - failed.len();
        info!(
            zoom = z,
            tiles = coords.len(),
            failed = failed.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rendered zoom level"
        );
        report.failed.extend(failed);
    }

    report
}

fn render_with_retries<W>(
    grid: &Grid2D,
    ramp: &ColorRamp,
    coord: TileCoord,
    retries: u32,
    write: &W,
) -> ClimateResult<()>
where
    W: Fn(&TileCoord, &[u8]) -> ClimateResult<()> + Sync,
{
    let attempt = || -> ClimateResult<()> {
        let png = render_tile(grid, ramp, coord)?.to_png()?;
        write(&coord, &png)
    };

    let mut last_error = None;
    for n in 0..=retries {
        match attempt() {
            Ok(()) => {
                if n > 0 {
                    debug!(tile = %coord.path_fragment(), attempt = n + 1, "Tile succeeded on retry");
                }
                return Ok(());
            }
            Err(e) => {
                warn!(tile = %coord.path_fragment(), attempt = n + 1, error = %e, "Tile attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ClimateError::Render(format!("tile {}", coord.path_fragment()))))
}
