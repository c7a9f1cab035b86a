//! Climate pipeline CLI.
//!
//! Turns gridded climate sources into monthly normals, calibrated
//! projections and map tiles, recording each dataset in the catalog.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use climate_pipeline::cli::Cli;
use climate_pipeline::commands;
use climate_pipeline::config::{LogFormat, LoggingConfig};

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return exit_code(e.exit_code());
        }
    };
    init_tracing(&config.logging);

    info!(
        data_dir = %config.data_dir.display(),
        tile_dir = %config.tile_dir.display(),
        max_zoom = config.tiles.max_zoom,
        dry_run = cli.dry_run,
        "Starting climate pipeline"
    );

    match commands::execute(&cli, &config).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            commands::report_failure(&e);
            exit_code(commands::exit_code(&e))
        }
    }
}
