//! Dry runs of the CLI against fixture rasters in a temporary directory.

use std::path::Path;

use clap::Parser;
use climate_pipeline::cli::Cli;
use climate_pipeline::commands::{execute, exit_code};
use test_utils::{global_spec, write_monthly_folder};

fn cli(dir: &Path, args: &[&str]) -> Cli {
    let data = dir.join("data");
    let tiles = dir.join("tiles");
    let mut argv = vec![
        "climate-pipeline".to_string(),
        "--dry-run".to_string(),
        "--data-dir".to_string(),
        data.display().to_string(),
        "--tile-dir".to_string(),
        tiles.display().to_string(),
        "--max-zoom".to_string(),
        "1".to_string(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    Cli::try_parse_from(argv).unwrap()
}

// ============================================================================
// Single commands
// ============================================================================

#[tokio::test]
async fn test_transform_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("prec");
    write_monthly_folder(&folder, "prec", &global_spec(30.0), -9999.0, |m, _, _| m as f32).unwrap();

    let cli = cli(
        dir.path(),
        &[
            "transform",
            "--source",
            "worldclim",
            "--path",
            folder.to_str().unwrap(),
            "--years",
            "1970-2000",
            "--unit",
            "mm",
        ],
    );
    let mut config = climate_pipeline::config::PipelineConfig::default();
    cli.apply(&mut config);
    config.tiles.periods = Some(vec!["year".parse().unwrap()]);

    assert_eq!(execute(&cli, &config).await.unwrap(), 0);
    assert!(dir.path().join("data/worldclim-1970-2000-precip-mm-data.bin").exists());
    assert!(dir
        .path()
        .join("tiles/worldclim/1970-2000/tiles/precip-year/1/0/1.png")
        .exists());
}

#[tokio::test]
async fn test_lookup_of_unknown_dataset_exits_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(
        dir.path(),
        &[
            "lookup",
            "--source",
            "worldclim",
            "--measurement",
            "tavg",
            "--years",
            "1970-2000",
            "--lat",
            "40.7",
            "--lon",
            "-74.0",
        ],
    );
    let mut config = climate_pipeline::config::PipelineConfig::default();
    cli.apply(&mut config);

    let err = execute(&cli, &config).await.unwrap_err();
    assert_eq!(exit_code(&err), 4);
    assert!(err.to_string().contains("lookup failed for worldclim-1970-2000-tavg"));
}

// ============================================================================
// Batch
// ============================================================================

#[tokio::test]
async fn test_batch_reports_first_failure_code() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("tmax");
    write_monthly_folder(&folder, "tmax", &global_spec(30.0), -9999.0, |_, _, _| 25.0).unwrap();
    let jobs = dir.path().join("jobs.yaml");
    std::fs::write(
        &jobs,
        format!(
            "- stage: transform\n  data_source: worldclim\n  paths: [{}]\n  start_year: 1970\n  end_year: 2000\n  measurement: tmax\n  unit: degC\n  tiles: false\n\
             - stage: transform\n  data_source: worldclim\n  paths: [{}]\n  start_year: 1970\n  end_year: 2000\n  measurement: tmin\n  unit: furlongs\n  tiles: false\n",
            folder.display(),
            folder.display()
        ),
    )
    .unwrap();

    let cli = cli(dir.path(), &["run", jobs.to_str().unwrap()]);
    let mut config = climate_pipeline::config::PipelineConfig::default();
    cli.apply(&mut config);

    // UnsupportedUnit on the second job; the first still completes
    assert_eq!(execute(&cli, &config).await.unwrap(), 3);
    assert!(dir.path().join("data/worldclim-1970-2000-tmax-degC-data.bin").exists());
}

#[tokio::test]
async fn test_unreadable_jobs_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(dir.path(), &["run", "/nonexistent/jobs.yaml"]);
    let config = climate_pipeline::config::PipelineConfig::default();

    let err = execute(&cli, &config).await.unwrap_err();
    assert_eq!(exit_code(&err), 2);
}

// ============================================================================
// Shipped configuration
// ============================================================================

#[test]
fn test_shipped_config_and_jobs_parse() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("config");

    let config =
        climate_pipeline::config::PipelineConfig::from_yaml_file(&root.join("pipeline.yaml"))
            .unwrap();
    config.validate().unwrap();
    assert!(config.tile_dir.ends_with("tiles"));
    assert!(config.database_url.unwrap().starts_with("postgres://"));

    let jobs = climate_pipeline::cli::read_jobs(&root.join("jobs.yaml")).unwrap();
    assert_eq!(jobs.len(), 6);
    assert!(matches!(jobs[4], pipeline::Job::Calibrate(_)));
}
