//! Replacing a dataset's artifacts all at once.
//!
//! New normals and tiles are written under a staging directory first. Once
//! everything is written, [`Staging::promote`] swaps each staged path into
//! place and keeps the previous version aside. The caller then either
//! [`Promotion::commit`]s (dropping the previous versions) or
//! [`Promotion::rollback`]s (restoring them).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use climate_common::{ClimateError, ClimateResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the directory, inside a store's root, that holds staged writes.
pub const STAGING_DIR: &str = ".staging";

/// A fresh, unique staging root under `base`.
pub fn staging_root(base: &Path) -> PathBuf {
    base.join(STAGING_DIR).join(Uuid::new_v4().to_string())
}

/// Staged paths waiting to replace live ones.
///
/// Staging roots are removed when the value is dropped, whether or not it was
/// promoted.
#[derive(Debug, Default)]
pub struct Staging {
    roots: Vec<PathBuf>,
    moves: Vec<(PathBuf, PathBuf)>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `root` (and its parent, if left empty) once staging is over.
    pub fn track_root(&mut self, root: PathBuf) {
        self.roots.push(root);
    }

    /// Replace `live` with `staged` on promotion.
    pub fn add(&mut self, staged: PathBuf, live: PathBuf) {
        self.moves.push((staged, live));
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Move every staged path into place.
    ///
    /// If any move fails, the ones already made are undone before the error
    /// is returned.
    pub fn promote(mut self) -> ClimateResult<Promotion> {
        let moves = std::mem::take(&mut self.moves);
        let mut promotion = Promotion {
            swapped: Vec::with_capacity(moves.len()),
        };

        for (staged, live) in moves {
            if let Err(e) = promotion.swap(&staged, live) {
                if let Err(restore) = promotion.restore() {
                    warn!(error = %restore, "Failed to restore after an aborted promotion");
                }
                return Err(e);
            }
        }
        debug!(paths = promotion.swapped.len(), "Promoted staged artifacts");
        Ok(promotion)
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        for root in &self.roots {
            if let Err(e) = remove_path(root) {
                warn!(path = %root.display(), error = %e, "Failed to remove staging directory");
            }
            // Shared by concurrent runs, so only removed once empty
            if let Some(parent) = root.parent() {
                let _ = fs::remove_dir(parent);
            }
        }
    }
}

#[derive(Debug)]
struct Swapped {
    live: PathBuf,
    previous: Option<PathBuf>,
}

/// Staged artifacts in place, with the versions they replaced kept aside.
#[must_use = "a promotion must be committed or rolled back"]
#[derive(Debug)]
pub struct Promotion {
    swapped: Vec<Swapped>,
}

impl Promotion {
    fn swap(&mut self, staged: &Path, live: PathBuf) -> ClimateResult<()> {
        if let Some(parent) = live.parent() {
            fs::create_dir_all(parent)?;
        }

        let previous = match fs::symlink_metadata(&live) {
            Ok(_) => {
                let aside = previous_path(&live);
                rename(&live, &aside)?;
                Some(aside)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = rename(staged, &live) {
            if let Some(aside) = &previous {
                let _ = fs::rename(aside, &live);
            }
            return Err(e);
        }

        self.swapped.push(Swapped { live, previous });
        Ok(())
    }

    /// Keep the new versions and delete the replaced ones.
    pub fn commit(self) {
        for swapped in self.swapped {
            if let Some(previous) = swapped.previous {
                if let Err(e) = remove_path(&previous) {
                    warn!(path = %previous.display(), error = %e, "Failed to remove replaced artifact");
                }
            }
        }
    }

    /// Put the replaced versions back, removing the new ones.
    pub fn rollback(mut self) -> ClimateResult<()> {
        let restored = self.swapped.len();
        self.restore()?;
        info!(paths = restored, "Rolled back promoted artifacts");
        Ok(())
    }

    fn restore(&mut self) -> ClimateResult<()> {
        while let Some(swapped) = self.swapped.pop() {
            remove_path(&swapped.live)?;
            if let Some(previous) = swapped.previous {
                rename(&previous, &swapped.live)?;
            }
        }
        Ok(())
    }
}

fn previous_path(live: &Path) -> PathBuf {
    let name = live
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    live.with_file_name(format!(".{}.{}.previous", name, Uuid::new_v4()))
}

fn rename(from: &Path, to: &Path) -> ClimateResult<()> {
    fs::rename(from, to).map_err(|e| {
        ClimateError::Storage(format!(
            "Failed to move {} to {}: {}",
            from.display(),
            to.display(),
            e
        ))
    })
}

/// Remove a file or a directory tree. A missing path is not an error.
fn remove_path(path: &Path) -> ClimateResult<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ClimateError::Storage(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}
