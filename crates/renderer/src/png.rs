//! PNG encoding for RGBA tiles.
//!
//! Supports two encoding modes:
//! - **Indexed PNG (color type 3)**: used when the image has at most 256
//!   distinct RGBA values. Climate tiles are drawn from a ramp of a few dozen
//!   colours plus transparency, so this is the usual path.
//! - **RGBA PNG (color type 6)**: fallback for images with more colours.

use std::collections::HashMap;
use std::io::Write;

use climate_common::{ClimateError, ClimateResult};
use rayon::prelude::*;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Minimum pixels to benefit from parallel palette extraction
const PARALLEL_THRESHOLD: usize = 4096; // 64x64 or larger

type Palette = Vec<[u8; 4]>;

/// Encode RGBA pixels, choosing indexed encoding when the palette fits.
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> ClimateResult<Vec<u8>> {
    check_dimensions(pixels.len(), width, height, 4)?;

    let palette = if width * height >= PARALLEL_THRESHOLD {
        extract_palette_parallel(pixels)
    } else {
        extract_palette_sequential(pixels)
    };

    match palette {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
        None => create_png(pixels, width, height),
    }
}

fn check_dimensions(len: usize, width: usize, height: usize, bytes_per_pixel: usize) -> ClimateResult<()> {
    if width == 0 || height == 0 || len != width * height * bytes_per_pixel {
        return Err(ClimateError::Render(format!(
            "{} bytes do not form a {}x{} image",
            len, width, height
        )));
    }
    Ok(())
}

/// Pack RGBA bytes into a u32 for faster hashing and comparison
#[inline(always)]
fn pack_color(px: &[u8]) -> u32 {
    u32::from_le_bytes([px[0], px[1], px[2], px[3]])
}

/// Sequential palette extraction for small images.
fn extract_palette_sequential(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for px in pixels.chunks_exact(4) {
        let packed = pack_color(px);
        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push(packed.to_le_bytes());
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Parallel palette extraction for larger images.
///
/// Distinct colours are collected per chunk, merged, and only if they fit
/// in a palette are pixels mapped to indices in a second parallel pass.
fn extract_palette_parallel(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let pixels_per_chunk = (pixels.len() / 4 / rayon::current_num_threads()).max(256);
    let chunk_bytes = pixels_per_chunk * 4;

    let unique: Vec<u32> = pixels
        .par_chunks(chunk_bytes)
        .flat_map_iter(|chunk| {
            let mut local: HashMap<u32, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE);
            for px in chunk.chunks_exact(4) {
                local.insert(pack_color(px), ());
                // Early exit if we definitely have too many colors
                if local.len() > MAX_PALETTE_SIZE {
                    break;
                }
            }
            local.into_keys()
        })
        .collect();

    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    for packed in unique {
        if color_to_index.contains_key(&packed) {
            continue;
        }
        if palette.len() >= MAX_PALETTE_SIZE {
            return None;
        }
        color_to_index.insert(packed, palette.len() as u8);
        palette.push(packed.to_le_bytes());
    }

    let indices: Vec<u8> = pixels
        .par_chunks_exact(4)
        .map(|px| color_to_index.get(&pack_color(px)).copied().unwrap_or(0))
        .collect();

    Some((palette, indices))
}

/// Create an indexed PNG (color type 3) from a palette and one index per
/// pixel.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[[u8; 4]],
    indices: &[u8],
) -> ClimateResult<Vec<u8>> {
    check_dimensions(indices.len(), width, height, 1)?;
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE {
        return Err(ClimateError::Render(format!(
            "palette of {} colours",
            palette.len()
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS chunk (transparency) - only if any color has alpha < 255
    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width, height, 1)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Create a PNG image from RGBA pixel data (color type 6).
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> ClimateResult<Vec<u8>> {
    check_dimensions(pixels.len(), width, height, 4)?;

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));

    let idat = deflate_scanlines(pixels, width, height, 4)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(0); // interlace method
    data
}

/// Write a PNG chunk: length, type, data, CRC over type and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Prefix each scanline with filter type 0 and zlib-compress.
fn deflate_scanlines(
    data: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> ClimateResult<Vec<u8>> {
    let stride = width * bytes_per_pixel;
    let mut uncompressed = Vec::with_capacity(height * (1 + stride));
    for row in data.chunks_exact(stride) {
        uncompressed.push(0); // filter type: none
        uncompressed.extend_from_slice(row);
    }

    let compress = |e: std::io::Error| ClimateError::Render(format!("IDAT compression failed: {}", e));
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&uncompressed).map_err(compress)?;
    encoder.finish().map_err(compress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    /// Chunk types in order, with their data.
    fn chunks(png: &[u8]) -> Vec<(String, Vec<u8>)> {
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        let mut out = Vec::new();
        let mut pos = 8;
        while pos < png.len() {
            let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
            let kind = String::from_utf8(png[pos + 4..pos + 8].to_vec()).unwrap();
            let data = png[pos + 8..pos + 8 + len].to_vec();
            let crc = u32::from_be_bytes(png[pos + 8 + len..pos + 12 + len].try_into().unwrap());
            assert_eq!(crc, crc32fast::hash(&png[pos + 4..pos + 8 + len]), "{} CRC", kind);
            out.push((kind, data));
            pos += 12 + len;
        }
        out
    }

    fn inflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_extract_palette_simple() {
        let pixels = [
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            0, 0, 0, 0, // transparent
            255, 0, 0, 255, // red again
        ];

        let (palette, indices) = extract_palette_sequential(&pixels).unwrap();
        assert_eq!(palette.len(), 3);
        assert_eq!(indices, vec![0, 1, 2, 0]);
        assert_eq!(palette[2], [0, 0, 0, 0]);
    }

    #[test]
    fn test_parallel_matches_sequential_palette_size() {
        // 128x128 tile drawn from 40 ramp colours
        let mut pixels = Vec::with_capacity(128 * 128 * 4);
        for y in 0..128u32 {
            for x in 0..128u32 {
                let band = ((x / 8 + y / 8) % 40) as u8;
                pixels.extend_from_slice(&[255, 255 - band * 4, 255 - band * 4, 255]);
            }
        }

        let (seq_palette, _) = extract_palette_sequential(&pixels).unwrap();
        let (par_palette, par_indices) = extract_palette_parallel(&pixels).unwrap();
        assert_eq!(seq_palette.len(), par_palette.len());
        assert_eq!(par_indices.len(), 128 * 128);
        for (i, px) in pixels.chunks_exact(4).enumerate() {
            assert_eq!(&par_palette[par_indices[i] as usize][..], px);
        }
    }

    #[test]
    fn test_indexed_png_layout() {
        let pixels = [
            255, 170, 170, 255, //
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            255, 170, 170, 255,
        ];
        let png = create_png_auto(&pixels, 2, 2).unwrap();
        let chunks = chunks(&png);
        let kinds: Vec<&str> = chunks.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(kinds, vec!["IHDR", "PLTE", "tRNS", "IDAT", "IEND"]);

        let ihdr = &chunks[0].1;
        assert_eq!(ihdr[9], 3); // color type indexed
        assert_eq!(inflate(&chunks[3].1), vec![0, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_rgba_fallback_for_many_colours() {
        let mut pixels = Vec::with_capacity(300 * 4);
        for i in 0..300u32 {
            pixels.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8, 7, 255]);
        }

        let png = create_png_auto(&pixels, 300, 1).unwrap();
        let chunks = chunks(&png);
        assert_eq!(chunks[0].1[9], 6); // color type RGBA
        let raw = inflate(&chunks[1].1);
        assert_eq!(raw.len(), 1 + 300 * 4);
        assert_eq!(&raw[1..], &pixels[..]);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(create_png_auto(&[0u8; 12], 2, 2).is_err());
        assert!(create_png(&[], 0, 0).is_err());
    }
}
