//! Pipeline configuration.
//!
//! Settings come from three layers, later ones winning:
//! - an optional YAML file, with `${VAR}` and `${VAR:-default}` substitution
//! - environment variables (`CLIMATE_*`, `DATABASE_URL`), including `.env`
//! - command line flags

use std::fs;
use std::path::{Path, PathBuf};

use climate_common::tile::MAX_SUPPORTED_ZOOM;
use climate_common::{ClimateError, ClimateResult, Period};
use pipeline::PipelineOptions;
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where packed normals files are written.
    pub data_dir: PathBuf,
    /// Root of the tile pyramid.
    pub tile_dir: PathBuf,
    /// PostgreSQL catalog. Required unless running dry.
    pub database_url: Option<String>,
    pub tiles: TilingConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tile_dir: PathBuf::from("tiles"),
            database_url: None,
            tiles: TilingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    pub max_zoom: u32,
    pub tile_retries: u32,
    /// Render pool size; all cores when unset.
    pub render_threads: Option<usize>,
    /// Periods rendered by default; every month, season and the year when unset.
    pub periods: Option<Vec<Period>>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            max_zoom: options.max_zoom,
            tile_retries: options.tile_retries,
            render_threads: None,
            periods: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

// ============================================================================
// Loading
// ============================================================================

impl PipelineConfig {
    /// Load from `path` (defaults when `None`), then apply the process
    /// environment, then validate.
    pub fn load(path: Option<&Path>) -> ClimateResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> ClimateResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ClimateError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ClimateResult<Self> {
        let expanded = expand_env_vars(content, |name| std::env::var(name).ok())?;
        serde_yaml::from_str(&expanded)
            .map_err(|e| ClimateError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    /// Override settings from environment variables looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> ClimateResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = set("CLIMATE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = set("CLIMATE_TILE_DIR") {
            self.tile_dir = PathBuf::from(dir);
        }
        if let Some(url) = set("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(zoom) = set("CLIMATE_MAX_ZOOM") {
            self.tiles.max_zoom = parse_env("CLIMATE_MAX_ZOOM", &zoom)?;
        }
        if let Some(retries) = set("CLIMATE_TILE_RETRIES") {
            self.tiles.tile_retries = parse_env("CLIMATE_TILE_RETRIES", &retries)?;
        }
        if let Some(threads) = set("CLIMATE_RENDER_THREADS") {
            self.tiles.render_threads = Some(parse_env("CLIMATE_RENDER_THREADS", &threads)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> ClimateResult<()> {
        if self.tiles.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(ClimateError::Config(format!(
                "max_zoom {} exceeds the supported maximum of {}",
                self.tiles.max_zoom, MAX_SUPPORTED_ZOOM
            )));
        }
        if self.tiles.render_threads == Some(0) {
            return Err(ClimateError::Config(
                "render_threads must be at least 1".to_string(),
            ));
        }
        if matches!(&self.tiles.periods, Some(p) if p.is_empty()) {
            return Err(ClimateError::Config(
                "periods must name at least one period".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() || self.tile_dir.as_os_str().is_empty() {
            return Err(ClimateError::Config(
                "data_dir and tile_dir cannot be empty".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ClimateError::Config(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }
        Ok(())
    }

    /// Stage options derived from the tiling settings.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_zoom: self.tiles.max_zoom,
            tile_retries: self.tiles.tile_retries,
            render_threads: self.tiles.render_threads,
            periods: self.tiles.periods.clone().unwrap_or_else(Period::all),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> ClimateResult<T> {
    value.trim().parse().map_err(|_| {
        ClimateError::Config(format!("{} has invalid value '{}'", name, value))
    })
}

// ============================================================================
// Environment variable expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` in YAML content.
fn expand_env_vars<F>(content: &str, var: F) -> ClimateResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => expr.push(c),
                    None => {
                        return Err(ClimateError::Config(format!(
                            "Unclosed variable substitution: ${{{}",
                            expr
                        )))
                    }
                }
            }
            result.push_str(&resolve_var_expr(&expr, &var)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr<F>(expr: &str, var: &F) -> ClimateResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some((name, default)) = expr.split_once(":-") {
        match var(name.trim()) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Ok(default.to_string()),
        }
    } else {
        var(expr.trim()).ok_or_else(|| {
            ClimateError::Config(format!("Environment variable {} not set", expr.trim()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_expand_env_vars_simple() {
        let result = expand_env_vars("prefix_${ROOT}_suffix", env(&[("ROOT", "srv")])).unwrap();
        assert_eq!(result, "prefix_srv_suffix");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("${MISSING:-/var/tiles}", env(&[])).unwrap();
        assert_eq!(result, "/var/tiles");

        let result = expand_env_vars("${EMPTY:-fallback}", env(&[("EMPTY", "")])).unwrap();
        assert_eq!(result, "fallback");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        let err = expand_env_vars("${REQUIRED}", env(&[])).unwrap_err();
        assert!(matches!(err, ClimateError::Config(_)));

        assert!(expand_env_vars("${UNCLOSED", env(&[])).is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        let options = config.pipeline_options();
        assert_eq!(options.max_zoom, 7);
        assert_eq!(options.periods.len(), 17);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = PipelineConfig::from_yaml_str(
            "tile_dir: /srv/tiles\ntiles:\n  max_zoom: 5\n  periods: [\"year\", \"07\"]\n",
        )
        .unwrap();
        assert_eq!(config.tile_dir, PathBuf::from("/srv/tiles"));
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.tiles.max_zoom, 5);
        assert_eq!(config.tiles.tile_retries, 2);
        assert_eq!(
            config.pipeline_options().periods,
            vec![Period::Annual, Period::Month(7)]
        );
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = PipelineConfig::from_yaml_str("data_dir: /from/file\n").unwrap();
        config
            .apply_env(env(&[
                ("CLIMATE_DATA_DIR", "/from/env"),
                ("DATABASE_URL", "postgres://localhost/climate"),
                ("CLIMATE_MAX_ZOOM", "9"),
                ("CLIMATE_RENDER_THREADS", "4"),
                ("CLIMATE_TILE_RETRIES", ""),
            ]))
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/from/env"));
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/climate")
        );
        assert_eq!(config.tiles.max_zoom, 9);
        assert_eq!(config.tiles.render_threads, Some(4));
        assert_eq!(config.tiles.tile_retries, 2);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_env(env(&[("CLIMATE_MAX_ZOOM", "seven")]))
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_validation() {
        let mut config = PipelineConfig::default();
        config.tiles.max_zoom = 30;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.tiles.render_threads = Some(0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.tiles.periods = Some(Vec::new());
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ClimateError::Config(_))));
    }

    #[test]
    fn test_unknown_period_rejected() {
        let err = PipelineConfig::from_yaml_str("tiles:\n  periods: [\"13\"]\n").unwrap_err();
        assert!(matches!(err, ClimateError::Config(_)));
    }
}
