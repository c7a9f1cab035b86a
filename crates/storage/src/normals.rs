//! Packed monthly normals on disk.
//!
//! A dataset's twelve monthly layers are stored back to back, January first,
//! each row-major, as little-endian `i16` holding the value times the
//! measurement's [`scale_factor`]. [`PACKED_FILL`] marks missing cells.
//! Catalog records carry the grid geometry and measurement, so the file has
//! no header.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use climate_common::{
    ClimateError, ClimateResult, DatasetKey, DatasetRecord, GridSpec, Measurement,
};
use climate_grid::{is_fill, Grid2D, MonthlyNormals};
use tracing::{debug, info, instrument};

use crate::fs::write_atomic;
use crate::staging::staging_root;

/// Multiplier applied before rounding to `i16`: values are kept in tenths.
pub const SCALE_FACTOR: f32 = 10.0;

/// Packing multiplier of a measurement.
///
/// Elevation and precipitation are kept in whole units (up to 32767 m or mm);
/// everything else in tenths (up to 3276.7).
pub fn scale_factor(measurement: Measurement) -> f32 {
    match measurement {
        Measurement::Elevation | Measurement::Precip => 1.0,
        _ => SCALE_FACTOR,
    }
}

/// Packed value of a missing cell.
pub const PACKED_FILL: i16 = i16::MIN;

const MONTHS: usize = 12;

/// Writes and reads packed normals files under a data directory.
#[derive(Debug, Clone)]
pub struct NormalsStore {
    data_dir: PathBuf,
}

impl NormalsStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// A store with the same layout under a fresh staging directory.
    pub fn staging(&self) -> Self {
        Self::new(staging_root(&self.data_dir))
    }

    /// `<data_dir>/<base_name>-data.bin`
    pub fn path_for(&self, key: &DatasetKey) -> PathBuf {
        self.data_dir.join(format!("{}-data.bin", key.base_name()))
    }

    /// Pack `normals` and atomically replace the dataset's file.
    ///
    /// Fails with `OutOfBounds` if a value does not fit the packed range.
    #[instrument(skip(self, normals), fields(dataset = %key))]
    pub fn write(&self, key: &DatasetKey, normals: &MonthlyNormals) -> ClimateResult<PathBuf> {
        let spec = normals.spec();
        let fill = normals.fill_value();
        let scale = scale_factor(key.measurement);
        let mut buf = BytesMut::with_capacity(MONTHS * spec.len() * 2);

        for month in 1..=MONTHS as u32 {
            for &v in normals.month_values(month) {
                buf.put_i16_le(pack_value(v, fill, month, scale)?);
            }
        }

        let path = self.path_for(key);
        write_atomic(&path, &buf)?;
        info!(path = %path.display(), bytes = buf.len(), "Wrote packed normals");
        Ok(path)
    }

    /// Delete the dataset's file. Returns whether it existed.
    pub fn remove(&self, key: &DatasetKey) -> ClimateResult<bool> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read one month (1..=12) of a dataset as a grid.
pub fn read_month(record: &DatasetRecord, month: u32) -> ClimateResult<Grid2D> {
    if !(1..=MONTHS as u32).contains(&month) {
        return Err(ClimateError::OutOfBounds(format!(
            "month {} is outside 1..=12",
            month
        )));
    }

    let mut file = open_checked(record)?;
    let cells = record.spec.len();
    file.seek(SeekFrom::Start(((month as usize - 1) * cells * 2) as u64))?;
    let mut raw = vec![0u8; cells * 2];
    file.read_exact(&mut raw)?;

    let values = unpack_layer(
        Bytes::from(raw),
        record.fill_value,
        scale_factor(record.key.measurement),
    );
    Grid2D::new(record.spec, values, record.fill_value, record.key.unit.as_str())
}

/// Read all twelve months of a dataset.
pub fn read_normals(record: &DatasetRecord) -> ClimateResult<MonthlyNormals> {
    let months = (1..=MONTHS as u32)
        .map(|m| read_month(record, m))
        .collect::<ClimateResult<Vec<_>>>()?;
    MonthlyNormals::from_months(months, record.key.measurement.as_str())
}

/// Per-cell mean over the months that have a value.
pub fn read_annual_mean(record: &DatasetRecord) -> ClimateResult<Grid2D> {
    let cells = record.spec.len();
    let mut sums = vec![0f64; cells];
    let mut counts = vec![0u32; cells];

    for month in 1..=MONTHS as u32 {
        let layer = read_month(record, month)?;
        for (i, &v) in layer.values.iter().enumerate() {
            if !layer.is_fill(v) {
                sums[i] += v as f64;
                counts[i] += 1;
            }
        }
    }

    let values = sums
        .iter()
        .zip(&counts)
        .map(|(&s, &n)| {
            if n == 0 {
                record.fill_value
            } else {
                (s / n as f64) as f32
            }
        })
        .collect();
    Grid2D::new(record.spec, values, record.fill_value, record.key.unit.as_str())
}

/// The twelve values of the cell nearest `(lat, lon)` with that cell's centre.
///
/// Fails with `OutOfBounds` outside the dataset's coverage and `NotFound`
/// when the cell has no value in any month.
pub fn read_cell(
    record: &DatasetRecord,
    lat: f64,
    lon: f64,
) -> ClimateResult<((f64, f64), [Option<f64>; 12])> {
    let (row, col) = record.cell_index(lat, lon)?;
    let centre = record.spec.cell_center(row, col);

    let mut file = open_checked(record)?;
    let cells = record.spec.len();
    let idx = record.spec.flat_index(row, col);
    let scale = scale_factor(record.key.measurement) as f64;
    let mut series = [None; 12];
    let mut raw = [0u8; 2];

    for (m, slot) in series.iter_mut().enumerate() {
        file.seek(SeekFrom::Start(((m * cells + idx) * 2) as u64))?;
        file.read_exact(&mut raw)?;
        let packed = i16::from_le_bytes(raw);
        if packed != PACKED_FILL {
            *slot = Some(packed as f64 / scale);
        }
    }

    if series.iter().all(Option::is_none) {
        return Err(ClimateError::NotFound(format!(
            "no data at ({}, {}) in {}",
            centre.0, centre.1, record.key
        )));
    }
    debug!(row, col, "Read point series");
    Ok((centre, series))
}

fn open_checked(record: &DatasetRecord) -> ClimateResult<File> {
    let path = Path::new(&record.data_path);
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ClimateError::NotFound(format!("normals file {}", path.display()))
        } else {
            e.into()
        }
    })?;

    let expected = expected_len(&record.spec);
    let actual = file.metadata()?.len();
    if actual != expected {
        return Err(ClimateError::Format(format!(
            "{} is {} bytes, expected {} for a {}x{} grid",
            path.display(),
            actual,
            expected,
            record.spec.rows,
            record.spec.cols
        )));
    }
    Ok(file)
}

fn expected_len(spec: &GridSpec) -> u64 {
    (MONTHS * spec.len() * 2) as u64
}

fn pack_value(v: f32, fill: f32, month: u32, scale: f32) -> ClimateResult<i16> {
    if is_fill(v, fill) {
        return Ok(PACKED_FILL);
    }
    let scaled = (v * scale).round();
    // i16::MIN is reserved for fill
    if scaled < -(i16::MAX as f32) || scaled > i16::MAX as f32 {
        return Err(ClimateError::OutOfBounds(format!(
            "value {} in month {} does not fit the packed range",
            v, month
        )));
    }
    Ok(scaled as i16)
}

fn unpack_layer(mut raw: Bytes, fill: f32, scale: f32) -> Vec<f32> {
    let mut values = Vec::with_capacity(raw.len() / 2);
    while raw.remaining() >= 2 {
        let packed = raw.get_i16_le();
        values.push(if packed == PACKED_FILL {
            fill
        } else {
            packed as f32 / scale
        });
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_value_rounds_to_tenths() {
        assert_eq!(pack_value(6.86, -9999.0, 1, SCALE_FACTOR).unwrap(), 69);
        assert_eq!(pack_value(-12.34, -9999.0, 1, SCALE_FACTOR).unwrap(), -123);
        assert_eq!(pack_value(0.0, -9999.0, 1, SCALE_FACTOR).unwrap(), 0);
    }

    #[test]
    fn test_pack_value_fill() {
        assert_eq!(pack_value(-9999.0, -9999.0, 1, SCALE_FACTOR).unwrap(), PACKED_FILL);
        assert_eq!(pack_value(f32::NAN, -9999.0, 1, 1.0).unwrap(), PACKED_FILL);
    }

    #[test]
    fn test_pack_value_out_of_range() {
        assert!(pack_value(3276.7, -9999.0, 1, SCALE_FACTOR).is_ok());
        assert!(matches!(
            pack_value(3276.8, -9999.0, 3, SCALE_FACTOR),
            Err(ClimateError::OutOfBounds(_))
        ));
        assert!(pack_value(-3276.8, -9999.0, 3, SCALE_FACTOR).is_err());
    }

    #[test]
    fn test_whole_unit_measurements() {
        assert_eq!(scale_factor(Measurement::Elevation), 1.0);
        assert_eq!(scale_factor(Measurement::Precip), 1.0);
        assert_eq!(scale_factor(Measurement::Tmin), SCALE_FACTOR);
        assert_eq!(scale_factor(Measurement::Et), SCALE_FACTOR);

        assert_eq!(pack_value(8848.4, -9999.0, 1, 1.0).unwrap(), 8848);
        assert_eq!(pack_value(-430.0, -9999.0, 1, 1.0).unwrap(), -430);
        assert!(pack_value(32768.0, -9999.0, 1, 1.0).is_err());
    }

    #[test]
    fn test_unpack_layer() {
        let mut buf = BytesMut::new();
        buf.put_i16_le(69);
        buf.put_i16_le(PACKED_FILL);
        buf.put_i16_le(-5);
        let values = unpack_layer(buf.freeze(), -9999.0, SCALE_FACTOR);
        assert_eq!(values, vec![6.9, -9999.0, -0.5]);
    }
}
