//! Writers for on-disk source fixtures.
//!
//! Tests that exercise the readers or the pipeline end to end write small
//! rasters into a temporary directory with these helpers.

use std::path::{Path, PathBuf};

use bytes::BufMut;
use climate_common::GridSpec;

/// Write `values` (row-major, north-up) as a little-endian float32 BIL
/// raster plus `.hdr` header. Returns the path of the `.bil` file.
pub fn write_bil_f32(
    dir: &Path,
    name: &str,
    spec: &GridSpec,
    values: &[f32],
    nodata: f32,
) -> std::io::Result<PathBuf> {
    assert_eq!(values.len(), spec.len(), "values do not match the grid");

    let header = format!(
        "BYTEORDER I\nLAYOUT BIL\nNROWS {}\nNCOLS {}\nNBANDS 1\nNBITS 32\nPIXELTYPE FLOAT\n\
         ULXMAP {}\nULYMAP {}\nXDIM {}\nYDIM {}\nNODATA {}\n",
        spec.rows,
        spec.cols,
        spec.lon_start,
        spec.lat_start,
        spec.lon_delta.abs(),
        spec.lat_delta.abs(),
        nodata
    );

    let bil = dir.join(format!("{}.bil", name));
    std::fs::write(bil.with_extension("hdr"), header)?;

    let mut buf = bytes::BytesMut::with_capacity(values.len() * 4);
    for &v in values {
        buf.put_f32_le(v);
    }
    std::fs::write(&bil, &buf[..])?;
    Ok(bil)
}

/// Write a folder of twelve monthly BIL files named `<variable>_<MM>.bil`,
/// where month `m` holds `f(m, lat, lon)` at each cell centre.
pub fn write_monthly_folder(
    dir: &Path,
    variable: &str,
    spec: &GridSpec,
    nodata: f32,
    f: impl Fn(u32, f64, f64) -> f32,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    for month in 1..=12u32 {
        let mut values = Vec::with_capacity(spec.len());
        for row in 0..spec.rows {
            for col in 0..spec.cols {
                let (lat, lon) = spec.cell_center(row, col);
                values.push(f(month, lat, lon));
            }
        }
        write_bil_f32(dir, &format!("{}_{:02}", variable, month), spec, &values, nodata)?;
    }
    Ok(dir.to_path_buf())
}

/// A fresh temporary directory that is removed when dropped.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temporary directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_spec;

    #[test]
    fn test_write_monthly_folder() {
        let dir = scratch_dir();
        let folder = dir.path().join("tmean");
        write_monthly_folder(&folder, "tmean", &global_spec(90.0), -9999.0, |m, _, _| m as f32)
            .unwrap();

        let count = std::fs::read_dir(&folder).unwrap().count();
        assert_eq!(count, 24); // 12 rasters + 12 headers

        let bil = std::fs::read(folder.join("tmean_03.bil")).unwrap();
        assert_eq!(bil.len(), 8 * 4);
        assert_eq!(f32::from_le_bytes([bil[0], bil[1], bil[2], bil[3]]), 3.0);
    }
}
