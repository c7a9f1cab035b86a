//! Filesystem helpers shared by the stores.

use std::fs;
use std::path::Path;

use climate_common::{ClimateError, ClimateResult};
use uuid::Uuid;

/// Write `data` to `path` through a temporary sibling and a rename, so readers
/// see either the previous file or the complete new one.
pub fn write_atomic(path: &Path, data: &[u8]) -> ClimateResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| ClimateError::Storage(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let temp_path = parent.join(format!(".{}.{}.partial", file_name, Uuid::new_v4()));

    fs::write(&temp_path, data)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(ClimateError::Storage(format!(
            "Failed to move {} into place: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_partials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/file.bin");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
