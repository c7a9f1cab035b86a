//! The `Pipeline`: stages over an injected catalog and on-disk stores.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use climate_common::{
    ClimateError, ClimateResult, DatasetKey, DatasetRecord, Measurement, Period, PointNormals,
};
use climate_grid::{load, MonthlyNormals, SourceOptions};
use climate_transform::{
    aggregate_by_month, annual_value, convert_normals, derive_temperature_normals, period_grid,
};
use renderer::{render_pyramid, ColorRamp, PyramidOptions};
use storage::normals::{read_cell, read_normals};
use storage::{DatasetCatalog, DatasetQuery, NormalsStore, Staging, TileStore};

use crate::error::{PipelineError, Result, Stage, StageContext};
use crate::request::{
    CalibrateRequest, DeriveRequest, Job, TileSummary, TilesRequest, TransformRequest,
};

/// Tiling settings shared by every stage that renders.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_zoom: u32,
    pub tile_retries: u32,
    pub render_threads: Option<usize>,
    /// Periods rendered when a request does not name its own.
    pub periods: Vec<Period>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_zoom: 7,
            tile_retries: 2,
            render_threads: None,
            periods: Period::all(),
        }
    }
}

impl PipelineOptions {
    fn pyramid(&self) -> PyramidOptions {
        PyramidOptions {
            max_zoom: self.max_zoom,
            tile_retries: self.tile_retries,
            threads: self.render_threads,
        }
    }
}

/// Outcome of a batch of jobs. Each job succeeds or fails on its own.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, PipelineError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Exit code of the first failure, 0 when everything succeeded.
    pub fn exit_code(&self) -> i32 {
        self.failed.first().map_or(0, |(_, e)| e.exit_code())
    }
}

/// Climate dataset pipeline.
///
/// Each stage reads and writes whole datasets. New normals and tiles are
/// staged, swapped in together, and the catalog record is written last; if
/// the record cannot be written the swap is undone, so a failed re-run
/// leaves the previous dataset intact.
pub struct Pipeline {
    catalog: Arc<dyn DatasetCatalog>,
    normals: NormalsStore,
    tiles: TileStore,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<dyn DatasetCatalog>,
        normals: NormalsStore,
        tiles: TileStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            catalog,
            normals,
            tiles,
            options,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn DatasetCatalog> {
        &self.catalog
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    // ------------------------------------------------------------------------
    // transform
    // ------------------------------------------------------------------------

    /// Load source files, build monthly normals in canonical units, store
    /// them, tile them, then record the dataset.
    #[instrument(skip(self, request), fields(dataset = %request.label()))]
    pub async fn transform(&self, request: &TransformRequest) -> Result<DatasetRecord> {
        let start = Instant::now();
        let label = request.label();
        let req = request.clone();

        let (key, normals) = blocking(Stage::Transform, &label, move || prepare(&req)).await?;
        info!(
            dataset = %key,
            rows = normals.spec().rows,
            cols = normals.spec().cols,
            "Built monthly normals"
        );

        let record = self.record_for(key, &normals);
        let periods = self.periods_if(request.tiles);
        let (record, _) = self
            .publish(Stage::Transform, record, normals, true, periods)
            .await?;

        info!(
            dataset = %record.key,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Transform complete"
        );
        Ok(record)
    }

    // ------------------------------------------------------------------------
    // calibrate
    // ------------------------------------------------------------------------

    /// Apply the historical-to-projection change to the baseline and store
    /// the result as the projection's calibrated dataset.
    #[instrument(skip(self, request), fields(dataset = %request))]
    pub async fn calibrate(&self, request: &CalibrateRequest) -> Result<DatasetRecord> {
        let label = request.to_string();
        let baseline = self.find(Stage::Calibrate, &request.baseline_query()).await?;
        let historical = self.find(Stage::Calibrate, &request.historical_query()).await?;
        let projection = self.find(Stage::Calibrate, &request.projection_query()).await?;
        info!(
            baseline = %baseline.key,
            historical = %historical.key,
            projection = %projection.key,
            "Calibrating"
        );

        let key = projection.key.calibrated();
        let measurement = request.measurement;
        let calibrated = blocking(Stage::Calibrate, &label, move || {
            let b = read_normals(&baseline)?;
            let h = read_normals(&historical)?;
            let p = read_normals(&projection)?;
            calibration::calibrate_monthly(&b, &h, &p, measurement)
        })
        .await?;

        let record = self.record_for(key, &calibrated);
        let periods = self.periods_if(request.tiles);
        let (record, _) = self
            .publish(Stage::Calibrate, record, calibrated, true, periods)
            .await?;
        Ok(record)
    }

    // ------------------------------------------------------------------------
    // derive
    // ------------------------------------------------------------------------

    /// Derive whichever of tavg, tmin and tmax is missing from the other two.
    /// Returns the records created; empty when all three already exist.
    #[instrument(skip(self, request), fields(dataset = %request))]
    pub async fn derive(&self, request: &DeriveRequest) -> Result<Vec<DatasetRecord>> {
        let label = request.to_string();
        let mut existing = Vec::with_capacity(3);
        for measurement in [Measurement::Tavg, Measurement::Tmin, Measurement::Tmax] {
            let key = DatasetKey::new(
                &request.data_source,
                measurement,
                request.start_year,
                request.end_year,
                request.calibrated,
            )
            .at(Stage::Derive, &label)?;
            let record = self.catalog.get(&key).await.at(Stage::Derive, &key)?;
            existing.push((key, record));
        }

        let missing: Vec<DatasetKey> = existing
            .iter()
            .filter(|(_, r)| r.is_none())
            .map(|(k, _)| k.clone())
            .collect();
        if missing.is_empty() {
            info!("All temperature measures present, nothing to derive");
            return Ok(Vec::new());
        }

        let records: Vec<Option<DatasetRecord>> = existing.into_iter().map(|(_, r)| r).collect();
        let derived = blocking(Stage::Derive, &label, move || {
            let loaded = records
                .iter()
                .map(|r| r.as_ref().map(read_normals).transpose())
                .collect::<ClimateResult<Vec<_>>>()?;
            derive_temperature_normals(loaded[0].as_ref(), loaded[1].as_ref(), loaded[2].as_ref())
        })
        .await?;

        let mut created = Vec::with_capacity(missing.len());
        for key in missing {
            let normals = match key.measurement {
                Measurement::Tavg => derived.tavg.clone(),
                Measurement::Tmin => derived.tmin.clone(),
                _ => derived.tmax.clone(),
            };
            info!(dataset = %key, "Derived temperature measure");
            let record = self.record_for(key, &normals);
            let periods = self.periods_if(request.tiles);
            let (record, _) = self
                .publish(Stage::Derive, record, normals, true, periods)
                .await?;
            created.push(record);
        }
        Ok(created)
    }

    // ------------------------------------------------------------------------
    // tiles
    // ------------------------------------------------------------------------

    /// Re-render the tiles of a catalogued dataset.
    #[instrument(skip(self, request), fields(source = %request.query.data_source))]
    pub async fn tiles(&self, request: &TilesRequest) -> Result<TileSummary> {
        let mut record = self.find(Stage::Tiles, &request.query).await?;
        let periods = request
            .periods
            .clone()
            .unwrap_or_else(|| self.options.periods.clone());

        let source = record.clone();
        let normals = blocking(Stage::Tiles, &record.key, move || read_normals(&source)).await?;

        record.max_zoom = self.options.max_zoom;
        record.updated_at = Utc::now();
        let (_, summary) = self
            .publish(Stage::Tiles, record, normals, false, &periods)
            .await?;
        Ok(summary)
    }

    // ------------------------------------------------------------------------
    // lookup
    // ------------------------------------------------------------------------

    /// Monthly and annual normals at the dataset cell nearest `(lat, lon)`.
    pub async fn lookup(&self, query: &DatasetQuery, lat: f64, lon: f64) -> Result<PointNormals> {
        let record = self.find(Stage::Lookup, query).await?;
        let key = record.key.clone();
        let (centre, months) =
            blocking(Stage::Lookup, &key, move || read_cell(&record, lat, lon)).await?;

        Ok(PointNormals {
            dataset: key.base_name(),
            measurement: key.measurement,
            unit: key.unit,
            lat: centre.0,
            lon: centre.1,
            annual: annual_value(&months, key.measurement),
            months,
        })
    }

    /// Calibrated normals at one location computed from the three input
    /// datasets, without a stored calibrated dataset.
    pub async fn lookup_calibrated(
        &self,
        request: &CalibrateRequest,
        lat: f64,
        lon: f64,
    ) -> Result<PointNormals> {
        let label = request.to_string();
        let baseline = self.find(Stage::Lookup, &request.baseline_query()).await?;
        let historical = self.find(Stage::Lookup, &request.historical_query()).await?;
        let projection = self.find(Stage::Lookup, &request.projection_query()).await?;
        let key = projection.key.calibrated();

        let measurement = request.measurement;
        let (centre, months) = blocking(Stage::Lookup, &label, move || {
            let (centre, b) = read_cell(&baseline, lat, lon)?;
            let (_, h) = read_cell(&historical, lat, lon)?;
            let (_, p) = read_cell(&projection, lat, lon)?;
            Ok((centre, calibration::calibrate_point(&b, &h, &p, measurement)))
        })
        .await?;

        Ok(PointNormals {
            dataset: key.base_name(),
            measurement,
            unit: key.unit,
            lat: centre.0,
            lon: centre.1,
            annual: annual_value(&months, measurement),
            months,
        })
    }

    // ------------------------------------------------------------------------
    // delete
    // ------------------------------------------------------------------------

    /// Remove a dataset's record and normals file, and its tiles unless the
    /// calibrated/uncalibrated sibling sharing the tile directory remains.
    #[instrument(skip(self), fields(dataset = %key))]
    pub async fn delete(&self, key: &DatasetKey) -> Result<bool> {
        let existed = self.catalog.delete(key).await.at(Stage::Delete, key)?;
        let removed_file = self.normals.remove(key).at(Stage::Delete, key)?;

        let sibling = DatasetKey {
            calibrated: !key.calibrated,
            ..key.clone()
        };
        if self
            .catalog
            .get(&sibling)
            .await
            .at(Stage::Delete, key)?
            .is_none()
        {
            let periods = self.tiles.clear_dataset(key).at(Stage::Delete, key)?;
            info!(periods, "Removed tiles");
        }

        if !existed && !removed_file {
            warn!("Nothing to delete");
        }
        Ok(existed)
    }

    // ------------------------------------------------------------------------
    // batch
    // ------------------------------------------------------------------------

    /// Run jobs one after another. A failing job is logged and recorded; the
    /// remaining jobs still run.
    pub async fn run_batch(&self, jobs: Vec<Job>) -> BatchReport {
        let run_id = Uuid::new_v4();
        let mut report = BatchReport::default();
        info!(%run_id, jobs = jobs.len(), "Starting batch");

        for job in jobs {
            let label = job.label();
            let result = match &job {
                Job::Transform(r) => self.transform(r).await.map(|_| ()),
                Job::Calibrate(r) => self.calibrate(r).await.map(|_| ()),
                Job::Derive(r) => self.derive(r).await.map(|_| ()),
                Job::Tiles(r) => self.tiles(r).await.map(|_| ()),
            };
            match result {
                Ok(()) => report.succeeded.push(label),
                Err(e) => {
                    error!(
                        %run_id,
                        stage = %e.stage(),
                        dataset = %e.key(),
                        kind = e.kind(),
                        error = %e,
                        "Job failed"
                    );
                    report.failed.push((label, e));
                }
            }
        }

        info!(
            %run_id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch finished"
        );
        report
    }

    // ------------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------------

    async fn find(&self, stage: Stage, query: &DatasetQuery) -> Result<DatasetRecord> {
        self.catalog.find(query).await.at(
            stage,
            format!(
                "{}-{}-{}-{}",
                query.data_source, query.start_year, query.end_year, query.measurement
            ),
        )
    }

    fn periods_if(&self, tiles: bool) -> &[Period] {
        if tiles {
            &self.options.periods
        } else {
            &[]
        }
    }

    /// Record for `key` pointing at its live normals file.
    fn record_for(&self, key: DatasetKey, normals: &MonthlyNormals) -> DatasetRecord {
        let data_path = self.normals.path_for(&key).to_string_lossy().into_owned();
        DatasetRecord {
            key,
            spec: *normals.spec(),
            fill_value: normals.fill_value(),
            data_path,
            max_zoom: self.options.max_zoom,
            updated_at: Utc::now(),
        }
    }

    /// Stage the normals file (when `write_normals`) and the tiles of
    /// `periods`, swap them in, then upsert `record`.
    ///
    /// Nothing live changes before every artifact is staged, and a failed
    /// upsert puts the previous artifacts back.
    async fn publish(
        &self,
        stage: Stage,
        record: DatasetRecord,
        normals: MonthlyNormals,
        write_normals: bool,
        periods: &[Period],
    ) -> Result<(DatasetRecord, TileSummary)> {
        let key = record.key.clone();
        let normals_store = self.normals.clone();
        let tile_store = self.tiles.clone();
        let options = self.options.pyramid();
        let mut unique: Vec<Period> = Vec::with_capacity(periods.len());
        for &period in periods {
            if !unique.contains(&period) {
                unique.push(period);
            }
        }

        let staged_key = key.clone();
        let (staging, summary) = blocking(stage, &key, move || {
            stage_artifacts(
                &normals_store,
                &tile_store,
                &staged_key,
                &normals,
                write_normals,
                &unique,
                &options,
            )
        })
        .await?;

        if summary.periods > 0 {
            if summary.is_complete() {
                info!(dataset = %key, tiles = summary.written, "Tiles rendered");
            } else {
                warn!(
                    dataset = %key,
                    written = summary.written,
                    failed = summary.failed,
                    "Some tiles were skipped"
                );
            }
        }

        let promotion = staging.promote().at(stage, &key)?;
        if let Err(e) = self.catalog.upsert(&record).await {
            if let Err(restore) = promotion.rollback() {
                error!(dataset = %key, error = %restore, "Failed to restore previous artifacts");
            }
            return Err::<(DatasetRecord, TileSummary), _>(e).at(stage, &key);
        }
        promotion.commit();
        Ok((record, summary))
    }
}

/// Write normals and tiles under staging directories, registering each with
/// the live path it replaces. Dropping the result discards them.
fn stage_artifacts(
    normals_store: &NormalsStore,
    tile_store: &TileStore,
    key: &DatasetKey,
    normals: &MonthlyNormals,
    write_normals: bool,
    periods: &[Period],
    options: &PyramidOptions,
) -> ClimateResult<(Staging, TileSummary)> {
    let mut staging = Staging::new();

    if write_normals {
        let staged = normals_store.staging();
        staging.track_root(staged.data_dir().to_path_buf());
        let path = staged.write(key, normals)?;
        staging.add(path, normals_store.path_for(key));
    }

    let mut summary = TileSummary::default();
    if !periods.is_empty() {
        let staged = tile_store.staging();
        staging.track_root(staged.tile_dir().to_path_buf());
        summary = render_all(&staged, key, normals, periods, options)?;
        for &period in periods {
            staging.add(staged.period_dir(key, period), tile_store.period_dir(key, period));
        }
    }
    Ok((staging, summary))
}

/// Load, aggregate and convert one transform request.
fn prepare(request: &TransformRequest) -> ClimateResult<(DatasetKey, MonthlyNormals)> {
    let options = SourceOptions {
        variable: request.variable.clone(),
        unit: request.unit.clone(),
        scale: request.scale,
    };
    let grid = load(&request.paths, &options)?;

    let measurement = match (request.measurement, &request.variable) {
        (Some(m), _) => m,
        (None, Some(variable)) => Measurement::from_source_name(variable)?,
        (None, None) => Measurement::from_source_name(&grid.variable)?,
    };
    let key = DatasetKey::new(
        &request.data_source,
        measurement,
        request.start_year,
        request.end_year,
        false,
    )?;

    let normals = aggregate_by_month(&grid, request.start_year, request.end_year)?;
    let normals = convert_normals(&normals, measurement)?;
    Ok((key, normals))
}

fn render_all(
    tiles: &TileStore,
    key: &DatasetKey,
    normals: &MonthlyNormals,
    periods: &[Period],
    options: &PyramidOptions,
) -> ClimateResult<TileSummary> {
    let mut summary = TileSummary::default();

    for &period in periods {
        let grid = period_grid(normals, key.measurement, period)?;
        let ramp = ColorRamp::for_period(key.measurement, period);

        let report = render_pyramid(&grid, &ramp, options, |coord, png| {
            tiles.write_tile(key, period, coord, png)
        })?;
        tiles.write_legend(key, period, &ramp.legend())?;

        summary.periods += 1;
        summary.written += report.written;
        summary.failed += report.failed.len();
    }

    if summary.written == 0 && !periods.is_empty() {
        return Err(ClimateError::Render(format!("no tiles written for {}", key)));
    }
    Ok(summary)
}

/// Run `f` on the blocking pool, attaching `stage` and `key` to failures.
async fn blocking<T, F>(stage: Stage, key: impl std::fmt::Display, f: F) -> Result<T>
where
    F: FnOnce() -> ClimateResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.at(stage, key),
        Err(e) => Err(PipelineError::Task {
            stage,
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}
