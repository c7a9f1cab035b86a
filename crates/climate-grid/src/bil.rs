//! ESRI BIL rasters (`.bil` data plus a `.hdr` header).
//!
//! This is the layout WorldClim-era monthly normals were distributed in:
//! one band of 16-bit signed integers or 32-bit floats, with the upper-left
//! cell centre given by `ULXMAP`/`ULYMAP` and the cell size by `XDIM`/`YDIM`.
//!
//! BIL carries no unit. Without a unit hint it is taken from the file name,
//! and integer temperatures are read as tenths of a degree unless a scale is
//! given.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::{Buf, Bytes};
use climate_common::{ClimateError, ClimateResult, GridSpec, TimeAxis};
use tracing::debug;

use crate::source::{unit_from_file_name, GridSource, SourceOptions};
use crate::Grid;

/// Fill used when the header declares no `NODATA`.
const DEFAULT_NODATA: f32 = -9999.0;

/// Scale of integer temperature rasters, stored in tenths of a degree.
const TENTHS: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PixelType {
    SignedInt16,
    UnsignedInt16,
    Float32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BilHeader {
    pub rows: usize,
    pub cols: usize,
    pixel_type: PixelType,
    big_endian: bool,
    pub ul_lon: f64,
    pub ul_lat: f64,
    pub x_dim: f64,
    pub y_dim: f64,
    pub nodata: Option<f32>,
}

impl BilHeader {
    /// Parse `KEY value` lines. Keys are case-insensitive.
    pub fn parse(text: &str) -> ClimateResult<Self> {
        let fields: HashMap<String, String> = text
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let key = parts.next()?.to_ascii_uppercase();
                let value = parts.next()?.to_string();
                Some((key, value))
            })
            .collect();

        let get = |key: &str| -> ClimateResult<&String> {
            fields
                .get(key)
                .ok_or_else(|| ClimateError::Format(format!("BIL header lacks {}", key)))
        };
        let number = |key: &str| -> ClimateResult<f64> {
            get(key)?
                .parse::<f64>()
                .map_err(|_| ClimateError::Format(format!("BIL header {} is not a number", key)))
        };

        let bands = fields.get("NBANDS").map(|v| v.as_str()).unwrap_or("1");
        if bands != "1" {
            return Err(ClimateError::Format(format!(
                "BIL with {} bands is not supported",
                bands
            )));
        }

        let nbits = fields.get("NBITS").map(|v| v.as_str()).unwrap_or("16");
        let pixel = fields.get("PIXELTYPE").map(|v| v.to_ascii_uppercase());
        let pixel_type = match (nbits, pixel.as_deref()) {
            ("16", None | Some("SIGNEDINT")) => PixelType::SignedInt16,
            ("16", Some("UNSIGNEDINT")) => PixelType::UnsignedInt16,
            ("32", None | Some("FLOAT")) => PixelType::Float32,
            (bits, kind) => {
                return Err(ClimateError::Format(format!(
                    "unsupported BIL pixel type {} bits {:?}",
                    bits, kind
                )))
            }
        };

        let big_endian = match fields.get("BYTEORDER").map(|v| v.to_ascii_uppercase()) {
            None => false,
            Some(order) if order == "I" => false,
            Some(order) if order == "M" => true,
            Some(order) => {
                return Err(ClimateError::Format(format!("unknown BIL byte order {}", order)))
            }
        };

        let nodata = match fields.get("NODATA") {
            Some(v) => Some(
                v.parse::<f32>()
                    .map_err(|_| ClimateError::Format("BIL header NODATA is not a number".into()))?,
            ),
            None => None,
        };

        Ok(Self {
            rows: number("NROWS")? as usize,
            cols: number("NCOLS")? as usize,
            pixel_type,
            big_endian,
            ul_lon: number("ULXMAP")?,
            ul_lat: number("ULYMAP")?,
            x_dim: number("XDIM")?,
            y_dim: number("YDIM")?,
            nodata,
        })
    }

    pub fn is_integer(&self) -> bool {
        self.pixel_type != PixelType::Float32
    }

    fn bytes_per_value(&self) -> usize {
        match self.pixel_type {
            PixelType::SignedInt16 | PixelType::UnsignedInt16 => 2,
            PixelType::Float32 => 4,
        }
    }

    pub fn spec(&self) -> GridSpec {
        // BIL rows run north to south from the upper-left cell
        GridSpec::new(
            self.ul_lat,
            -self.y_dim.abs(),
            self.ul_lon,
            self.x_dim.abs(),
            self.rows,
            self.cols,
        )
    }
}

/// Decode raw BIL cell data into `f32`, mapping NODATA to `fill`.
pub fn decode_values(header: &BilHeader, data: Bytes, fill: f32) -> ClimateResult<Vec<f32>> {
    let expected = header.rows * header.cols * header.bytes_per_value();
    if data.len() != expected {
        return Err(ClimateError::Format(format!(
            "BIL data is {} bytes, header implies {}",
            data.len(),
            expected
        )));
    }

    let mut buf = data;
    let mut values = Vec::with_capacity(header.rows * header.cols);
    while buf.has_remaining() {
        let raw = match (header.pixel_type, header.big_endian) {
            (PixelType::SignedInt16, false) => buf.get_i16_le() as f32,
            (PixelType::SignedInt16, true) => buf.get_i16() as f32,
            (PixelType::UnsignedInt16, false) => buf.get_u16_le() as f32,
            (PixelType::UnsignedInt16, true) => buf.get_u16() as f32,
            (PixelType::Float32, false) => buf.get_f32_le(),
            (PixelType::Float32, true) => buf.get_f32(),
        };
        let is_nodata = header.nodata.is_some_and(|nd| raw == nd);
        values.push(if is_nodata || !raw.is_finite() { fill } else { raw });
    }
    Ok(values)
}

/// Reads a single-band BIL file as a static one-layer grid.
#[derive(Debug, Clone)]
pub struct BilSource {
    path: PathBuf,
    options: SourceOptions,
}

impl BilSource {
    pub fn new(path: impl AsRef<Path>, options: SourceOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
        }
    }

    fn header_path(&self) -> PathBuf {
        self.path.with_extension("hdr")
    }

    fn unit(&self) -> String {
        self.options
            .unit
            .clone()
            .or_else(|| unit_from_file_name(&self.path).map(String::from))
            .unwrap_or_default()
    }

    /// The explicit scale, else tenths for integer temperature rasters.
    fn scale(&self, header: &BilHeader, unit: &str) -> Option<f32> {
        match self.options.scale {
            Some(scale) => Some(scale),
            None if unit == "degC" && header.is_integer() => Some(TENTHS),
            None => None,
        }
    }
}

impl GridSource for BilSource {
    fn load(&self) -> ClimateResult<Grid> {
        let header_text = std::fs::read_to_string(self.header_path()).map_err(|e| {
            ClimateError::Format(format!(
                "cannot read header {}: {}",
                self.header_path().display(),
                e
            ))
        })?;
        let header = BilHeader::parse(&header_text)?;

        let data = Bytes::from(std::fs::read(&self.path).map_err(|e| {
            ClimateError::Format(format!("cannot read {}: {}", self.path.display(), e))
        })?);

        let unit = self.unit();
        let fill = header.nodata.unwrap_or(DEFAULT_NODATA);
        let mut values = decode_values(&header, data, fill)?;
        if let Some(scale) = self.scale(&header, &unit) {
            for v in values.iter_mut().filter(|v| **v != fill) {
                *v *= scale;
            }
        }

        debug!(
            path = %self.path.display(),
            rows = header.rows,
            cols = header.cols,
            unit = %unit,
            "Decoded BIL raster"
        );

        let variable = self
            .options
            .variable
            .clone()
            .or_else(|| {
                self.path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(String::from)
            })
            .unwrap_or_default();

        Grid::new(
            header.spec(),
            TimeAxis::Static,
            vec![values],
            fill,
            unit,
            variable,
        )
    }

    fn describe(&self) -> String {
        format!("BIL {}", self.path.display())
    }
}
