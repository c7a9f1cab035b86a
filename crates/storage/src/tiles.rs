//! On-disk tile pyramid layout.
//!
//! ```text
//! <tile_dir>/<data_source>/<start>-<end>/tiles/<measurement>-<period>/<z>/<x>/<y>.png
//! ```
//!
//! Calibrated and uncalibrated datasets of one key share a directory; the
//! pipeline tiles whichever one the catalog prefers.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use climate_common::{ClimateError, ClimateResult, DatasetKey, Period, TileCoord};
use serde::Serialize;
use tracing::{debug, info};

use crate::fs::write_atomic;
use crate::staging::staging_root;

pub const LEGEND_FILE: &str = "legend.json";

#[derive(Debug, Clone)]
pub struct TileStore {
    tile_dir: PathBuf,
}

impl TileStore {
    pub fn new(tile_dir: impl Into<PathBuf>) -> Self {
        Self {
            tile_dir: tile_dir.into(),
        }
    }

    pub fn tile_dir(&self) -> &Path {
        &self.tile_dir
    }

    /// A store with the same layout under a fresh staging directory, for
    /// rendering a pyramid before it replaces the live one.
    pub fn staging(&self) -> Self {
        Self::new(staging_root(&self.tile_dir))
    }

    /// `<tile_dir>/<data_source>/<start>-<end>/tiles`
    pub fn dataset_dir(&self, key: &DatasetKey) -> PathBuf {
        self.tile_dir
            .join(&key.data_source)
            .join(key.date_range())
            .join("tiles")
    }

    /// Directory holding every zoom level of one measurement and period.
    pub fn period_dir(&self, key: &DatasetKey, period: Period) -> PathBuf {
        self.dataset_dir(key)
            .join(format!("{}-{}", key.measurement, period.path_segment()))
    }

    pub fn tile_path(&self, key: &DatasetKey, period: Period, coord: &TileCoord) -> PathBuf {
        self.period_dir(key, period)
            .join(coord.z.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.png", coord.y))
    }

    /// Remove tiles left by an earlier run. Returns whether there were any.
    pub fn clear_period(&self, key: &DatasetKey, period: Period) -> ClimateResult<bool> {
        let dir = self.period_dir(key, period);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(path = %dir.display(), "Removed stale tiles");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ClimateError::Storage(format!(
                "Failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    /// Remove every period of a dataset's measurement. Returns how many
    /// period directories existed.
    pub fn clear_dataset(&self, key: &DatasetKey) -> ClimateResult<usize> {
        let mut removed = 0;
        for period in Period::all() {
            if self.clear_period(key, period)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn write_tile(
        &self,
        key: &DatasetKey,
        period: Period,
        coord: &TileCoord,
        png: &[u8],
    ) -> ClimateResult<()> {
        let path = self.tile_path(key, period, coord);
        write_atomic(&path, png)?;
        debug!(tile = %coord.path_fragment(), bytes = png.len(), "Wrote tile");
        Ok(())
    }

    pub fn read_tile(
        &self,
        key: &DatasetKey,
        period: Period,
        coord: &TileCoord,
    ) -> ClimateResult<Bytes> {
        let path = self.tile_path(key, period, coord);
        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ClimateError::NotFound(
                format!("tile {}", path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the colour legend next to the zoom directories.
    pub fn write_legend<T: Serialize>(
        &self,
        key: &DatasetKey,
        period: Period,
        legend: &T,
    ) -> ClimateResult<PathBuf> {
        let path = self.period_dir(key, period).join(LEGEND_FILE);
        let json = serde_json::to_vec_pretty(legend)?;
        write_atomic(&path, &json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_common::{Measurement, Season};

    fn key() -> DatasetKey {
        DatasetKey::new("worldclim", Measurement::Tavg, 1970, 2000, false).unwrap()
    }

    #[test]
    fn test_tile_path_layout() {
        let store = TileStore::new("/srv/tiles");
        let path = store.tile_path(&key(), Period::Month(7), &TileCoord::new(3, 2, 5));
        assert_eq!(
            path,
            PathBuf::from("/srv/tiles/worldclim/1970-2000/tiles/tavg-07/3/2/5.png")
        );

        let season = store.period_dir(&key(), Period::Season(Season::Djf));
        assert!(season.ends_with("tavg-12_01_02"));
        let annual = store.period_dir(&key(), Period::Annual);
        assert!(annual.ends_with("tavg-year"));
    }

    #[test]
    fn test_staging_keeps_layout() {
        let store = TileStore::new("/srv/tiles");
        let staged = store.staging();
        assert!(staged.tile_dir().starts_with("/srv/tiles/.staging"));
        assert_ne!(staged.tile_dir(), store.staging().tile_dir());
        assert!(staged
            .period_dir(&key(), Period::Annual)
            .ends_with("worldclim/1970-2000/tiles/tavg-year"));
    }

    #[test]
    fn test_calibrated_shares_directory() {
        let store = TileStore::new("/srv/tiles");
        assert_eq!(
            store.period_dir(&key(), Period::Annual),
            store.period_dir(&key().calibrated(), Period::Annual)
        );
    }
}
