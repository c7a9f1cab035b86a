//! Wiring of the catalog and stores, and dispatch of each subcommand.

use std::sync::Arc;

use anyhow::Result;
use climate_common::{ClimateError, ClimateResult};
use pipeline::{Pipeline, PipelineError};
use serde::Serialize;
use storage::{DatasetCatalog, MemoryCatalog, NormalsStore, PgCatalog, TileStore};
use tracing::{error, info, warn};

use crate::cli::{read_jobs, Cli, Command};
use crate::config::PipelineConfig;

/// PostgreSQL catalog from the configured URL, or an in-memory one for dry runs.
pub async fn open_catalog(
    config: &PipelineConfig,
    dry_run: bool,
) -> ClimateResult<Arc<dyn DatasetCatalog>> {
    if dry_run {
        warn!("Dry run: catalog records are kept in memory and discarded on exit");
        return Ok(Arc::new(MemoryCatalog::new()));
    }

    let url = config.database_url.as_deref().ok_or_else(|| {
        ClimateError::Config(
            "DATABASE_URL is not set; use --dry-run for an in-memory catalog".to_string(),
        )
    })?;
    let catalog = PgCatalog::connect(url).await?;
    catalog.migrate().await?;
    info!("Connected to catalog");
    Ok(Arc::new(catalog))
}

pub fn build_pipeline(config: &PipelineConfig, catalog: Arc<dyn DatasetCatalog>) -> Pipeline {
    Pipeline::new(
        catalog,
        NormalsStore::new(&config.data_dir),
        TileStore::new(&config.tile_dir),
        config.pipeline_options(),
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run the invoked subcommand. Returns the process exit code for batch runs
/// that completed with failed jobs.
pub async fn execute(cli: &Cli, config: &PipelineConfig) -> Result<i32> {
    if let Command::Migrate = cli.command {
        open_catalog(config, false).await?;
        info!("Catalog schema is up to date");
        return Ok(0);
    }

    let catalog = open_catalog(config, cli.dry_run).await?;
    let pipeline = build_pipeline(config, catalog);

    match &cli.command {
        Command::Transform(args) => {
            let record = pipeline.transform(&args.request()).await?;
            print_json(&record)?;
        }
        Command::Calibrate(args) => {
            let record = pipeline.calibrate(&args.request()).await?;
            print_json(&record)?;
        }
        Command::Tiles(args) => {
            let summary = pipeline.tiles(&args.request()).await?;
            print_json(&summary)?;
        }
        Command::Derive(args) => {
            let records = pipeline.derive(&args.request()).await?;
            print_json(&records)?;
        }
        Command::Lookup(args) => {
            let point = match args.calibration() {
                Some(request) => {
                    pipeline
                        .lookup_calibrated(&request, args.lat, args.lon)
                        .await?
                }
                None => {
                    pipeline
                        .lookup(&args.dataset.query(), args.lat, args.lon)
                        .await?
                }
            };
            print_json(&point)?;
        }
        Command::Delete(args) => {
            let key = args.key()?;
            let existed = pipeline.delete(&key).await?;
            if !existed {
                warn!(dataset = %key, "Dataset was not in the catalog");
            }
        }
        Command::Run { jobs } => {
            let jobs = read_jobs(jobs)?;
            let report = pipeline.run_batch(jobs).await;
            for (label, err) in &report.failed {
                eprintln!("{}: {}", label, err);
            }
            print_json(&report.succeeded)?;
            return Ok(report.exit_code());
        }
        Command::Migrate => {}
    }
    Ok(0)
}

/// Exit code for an error returned by [`execute`].
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<ClimateError>() {
        return e.exit_code();
    }
    1
}

/// Log a failure and describe it on stderr, naming stage and dataset when
/// known.
pub fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<PipelineError>() {
        Some(e) => {
            error!(stage = %e.stage(), dataset = %e.key(), kind = e.kind(), error = %e, "Command failed");
        }
        None => error!(error = %err, "Command failed"),
    }
    eprintln!("error: {:#}", err);
}
