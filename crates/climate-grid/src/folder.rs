//! A directory holding one file per calendar month.
//!
//! Files are matched by a `_MM` suffix on the file stem (`tmean_01.bil`,
//! `wc2.1_10m_prec_07.tif`). When a variable is given, only stems containing
//! it are considered, so several variables can share a directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use climate_common::{ClimateError, ClimateResult};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::grid::Grid2D;
use crate::source::{source_for_path, GridSource, SourceOptions};
use crate::{Grid, TimeAxis};

#[derive(Debug, Clone)]
pub struct FolderSource {
    dir: PathBuf,
    options: SourceOptions,
}

impl FolderSource {
    pub fn new(dir: impl AsRef<Path>, options: SourceOptions) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            options,
        }
    }

    /// Map month (1..=12) to the file holding it.
    pub fn monthly_files(&self) -> ClimateResult<BTreeMap<u32, PathBuf>> {
        let mut files = BTreeMap::new();

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            if !matches!(ext.as_deref(), Some("bil" | "tif" | "tiff" | "nc")) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(variable) = &self.options.variable {
                if !stem.contains(variable.as_str()) {
                    continue;
                }
            }
            let Some(month) = month_suffix(stem) else {
                continue;
            };
            if let Some(previous) = files.insert(month, path.to_path_buf()) {
                return Err(ClimateError::Format(format!(
                    "month {:02} matched both {} and {}",
                    month,
                    previous.display(),
                    path.display()
                )));
            }
        }

        Ok(files)
    }
}

/// Month number from a trailing `_MM` (01..=12) on a file stem.
fn month_suffix(stem: &str) -> Option<u32> {
    let (_, suffix) = stem.rsplit_once('_')?;
    if suffix.len() != 2 {
        return None;
    }
    let month: u32 = suffix.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

impl GridSource for FolderSource {
    fn load(&self) -> ClimateResult<Grid> {
        let files = self.monthly_files()?;
        let missing: Vec<String> = (1..=12)
            .filter(|m| !files.contains_key(m))
            .map(|m| format!("{:02}", m))
            .collect();
        if !missing.is_empty() {
            return Err(ClimateError::MissingData(format!(
                "months {} absent from {}",
                missing.join(","),
                self.dir.display()
            )));
        }

        let mut months: Vec<Grid2D> = Vec::with_capacity(12);
        for (month, path) in &files {
            let grid = source_for_path(path, &self.options)?.load()?;
            if grid.time != TimeAxis::Static {
                return Err(ClimateError::Format(format!(
                    "{} holds {} layers, expected one month",
                    path.display(),
                    grid.layer_count()
                )));
            }
            debug!(month = month, path = %path.display(), "Loaded monthly layer");
            months.push(grid.layer(0)?);
        }

        let variable = self.options.variable.clone().unwrap_or_else(|| {
            self.dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string()
        });

        info!(dir = %self.dir.display(), "Assembled monthly normals from folder");
        Grid::from_monthly(months, variable)
    }

    fn describe(&self) -> String {
        format!("monthly folder {}", self.dir.display())
    }
}
