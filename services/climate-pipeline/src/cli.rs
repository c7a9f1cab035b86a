//! Command line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use climate_common::{ClimateError, ClimateResult, DatasetKey, Measurement, Period};
use pipeline::{CalibrateRequest, DeriveRequest, TilesRequest, TransformRequest};
use storage::DatasetQuery;

use crate::config::{LogFormat, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "climate-pipeline", version)]
#[command(about = "Transform, calibrate and tile gridded climate normals")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "CLIMATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Directory for packed normals files
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Root directory of the tile pyramid
    #[arg(long, global = true)]
    pub tile_dir: Option<PathBuf>,

    /// Highest zoom level rendered
    #[arg(long, global = true)]
    pub max_zoom: Option<u32>,

    /// Use an in-memory catalog instead of PostgreSQL
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build monthly normals from source files and tile them
    Transform(TransformArgs),
    /// Calibrate a projection against a baseline
    Calibrate(CalibrateArgs),
    /// Re-render tiles of a catalogued dataset
    Tiles(TilesArgs),
    /// Derive the missing one of tavg, tmin and tmax
    Derive(DeriveArgs),
    /// Print the monthly normals nearest a location as JSON
    Lookup(LookupArgs),
    /// Remove a dataset, its normals file and its tiles
    Delete(DatasetArgs),
    /// Run the jobs listed in a YAML file, each independently
    Run {
        /// YAML list of jobs
        jobs: PathBuf,
    },
    /// Create the catalog schema
    Migrate,
}

/// Parse `START-END`, e.g. `1970-2000`.
pub fn parse_years(s: &str) -> Result<(i32, i32), String> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| format!("expected START-END, got '{}'", s))?;
    let start: i32 = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid start year '{}'", start))?;
    let end: i32 = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid end year '{}'", end))?;
    if start > end {
        return Err(format!("year range {}-{} is reversed", start, end));
    }
    Ok((start, end))
}

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Data source name, e.g. worldclim
    #[arg(long)]
    pub source: String,

    /// Source file or folder of monthly files; repeat to average several
    #[arg(long = "path", required = true)]
    pub paths: Vec<PathBuf>,

    /// Year window, e.g. 1970-2000
    #[arg(long, value_parser = parse_years)]
    pub years: (i32, i32),

    /// Measurement; inferred from the variable name when omitted
    #[arg(long)]
    pub measurement: Option<Measurement>,

    /// Variable to read from multi-variable sources
    #[arg(long)]
    pub variable: Option<String>,

    /// Unit of the source values when the format does not declare one
    #[arg(long)]
    pub unit: Option<String>,

    /// Multiplier applied to raw values
    #[arg(long)]
    pub scale: Option<f32>,

    /// Skip tile rendering
    #[arg(long)]
    pub no_tiles: bool,
}

impl TransformArgs {
    pub fn request(&self) -> TransformRequest {
        TransformRequest {
            data_source: self.source.clone(),
            paths: self.paths.clone(),
            start_year: self.years.0,
            end_year: self.years.1,
            measurement: self.measurement,
            variable: self.variable.clone(),
            unit: self.unit.clone(),
            scale: self.scale,
            tiles: !self.no_tiles,
        }
    }
}

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    #[arg(long)]
    pub baseline_source: String,

    #[arg(long)]
    pub historical_source: String,

    #[arg(long)]
    pub projection_source: String,

    #[arg(long)]
    pub measurement: Measurement,

    /// Years of the baseline and of the historical run
    #[arg(long, value_parser = parse_years)]
    pub baseline_years: (i32, i32),

    #[arg(long, value_parser = parse_years)]
    pub projection_years: (i32, i32),

    #[arg(long)]
    pub no_tiles: bool,
}

impl CalibrateArgs {
    pub fn request(&self) -> CalibrateRequest {
        CalibrateRequest {
            baseline_source: self.baseline_source.clone(),
            historical_source: self.historical_source.clone(),
            projection_source: self.projection_source.clone(),
            measurement: self.measurement,
            baseline_years: self.baseline_years,
            projection_years: self.projection_years,
            tiles: !self.no_tiles,
        }
    }
}

/// Identifies one dataset, or the preferred one of a calibrated pair.
#[derive(Args, Debug)]
pub struct DatasetArgs {
    #[arg(long)]
    pub source: String,

    #[arg(long)]
    pub measurement: Measurement,

    #[arg(long, value_parser = parse_years)]
    pub years: (i32, i32),

    /// Only the calibrated dataset
    #[arg(long, conflicts_with = "uncalibrated")]
    pub calibrated: bool,

    /// Only the uncalibrated dataset
    #[arg(long)]
    pub uncalibrated: bool,
}

impl DatasetArgs {
    pub fn query(&self) -> DatasetQuery {
        let query = DatasetQuery::new(&self.source, self.measurement, self.years.0, self.years.1);
        match (self.calibrated, self.uncalibrated) {
            (true, _) => query.calibrated(true),
            (_, true) => query.calibrated(false),
            _ => query,
        }
    }

    pub fn key(&self) -> ClimateResult<DatasetKey> {
        DatasetKey::new(
            &self.source,
            self.measurement,
            self.years.0,
            self.years.1,
            self.calibrated,
        )
    }
}

#[derive(Args, Debug)]
pub struct TilesArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Period to render (`07`, `jja`, `year`); repeat for several
    #[arg(long = "period")]
    pub periods: Vec<Period>,
}

impl TilesArgs {
    pub fn request(&self) -> TilesRequest {
        TilesRequest {
            query: self.dataset.query(),
            periods: (!self.periods.is_empty()).then(|| self.periods.clone()),
        }
    }
}

#[derive(Args, Debug)]
pub struct DeriveArgs {
    #[arg(long)]
    pub source: String,

    #[arg(long, value_parser = parse_years)]
    pub years: (i32, i32),

    #[arg(long)]
    pub calibrated: bool,

    #[arg(long)]
    pub no_tiles: bool,
}

impl DeriveArgs {
    pub fn request(&self) -> DeriveRequest {
        DeriveRequest {
            data_source: self.source.clone(),
            start_year: self.years.0,
            end_year: self.years.1,
            calibrated: self.calibrated,
            tiles: !self.no_tiles,
        }
    }
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Calibrate on the fly against this baseline
    #[arg(long, requires = "historical_source")]
    pub baseline_source: Option<String>,

    #[arg(long, requires = "baseline_years")]
    pub historical_source: Option<String>,

    #[arg(long, value_parser = parse_years, requires = "baseline_source")]
    pub baseline_years: Option<(i32, i32)>,
}

impl LookupArgs {
    /// Calibration inputs when a baseline was given.
    pub fn calibration(&self) -> Option<CalibrateRequest> {
        let baseline_source = self.baseline_source.clone()?;
        let historical_source = self.historical_source.clone()?;
        let baseline_years = self.baseline_years?;
        Some(CalibrateRequest {
            baseline_source,
            historical_source,
            projection_source: self.dataset.source.clone(),
            measurement: self.dataset.measurement,
            baseline_years,
            projection_years: self.dataset.years,
            tiles: false,
        })
    }
}

impl Cli {
    /// Configuration from file and environment with this invocation's flags
    /// applied on top.
    pub fn load_config(&self) -> ClimateResult<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.to_lowercase();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.tile_dir {
            config.tile_dir = dir.clone();
        }
        if let Some(zoom) = self.max_zoom {
            config.tiles.max_zoom = zoom;
        }
    }
}

/// Read a batch file: a YAML list of jobs.
pub fn read_jobs(path: &std::path::Path) -> ClimateResult<Vec<pipeline::Job>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ClimateError::Config(format!("Failed to read jobs from {}: {}", path.display(), e))
    })?;
    serde_yaml::from_str(&content).map_err(|e| {
        ClimateError::Config(format!("Failed to parse jobs in {}: {}", path.display(), e))
    })
}
