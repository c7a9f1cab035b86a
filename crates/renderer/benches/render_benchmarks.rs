//! Benchmarks for the renderer crate - tile rendering and PNG encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use climate_common::{Measurement, Period, TileCoord};
use climate_grid::Grid2D;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use renderer::{png, render_pyramid, render_tile, ColorRamp, PyramidOptions};
use test_utils::{field_grid, global_spec};

/// Temperature-like normals with noise, in degC.
fn noisy_temperature(resolution: f64) -> Grid2D {
    let mut rng = rand::thread_rng();
    let mut grid = field_grid(global_spec(resolution), "degC", |lat, lon| {
        (28.0 - 0.5 * lat.abs() + (lon.to_radians() * 4.0).sin() * 3.0) as f32
    });
    for v in grid.values.iter_mut() {
        *v += rng.gen_range(-2.0..2.0);
    }
    grid
}

/// Random RGBA pixels (many unique colours - RGBA fallback).
fn random_rgba(width: usize, height: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut data = vec![0u8; width * height * 4];
    for px in data.chunks_mut(4) {
        px[0] = rng.gen();
        px[1] = rng.gen();
        px[2] = rng.gen();
        px[3] = 255;
    }
    data
}

// =============================================================================
// TILE RENDERING
// =============================================================================

fn bench_render_tile(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_tile");
    let ramp = ColorRamp::for_measurement(Measurement::Tavg);
    group.throughput(Throughput::Elements(256 * 256));

    for (name, resolution) in [("1deg", 1.0), ("10min", 1.0 / 6.0)] {
        let grid = noisy_temperature(resolution);
        for coord in [TileCoord::new(0, 0, 0), TileCoord::new(5, 9, 11)] {
            group.bench_with_input(
                BenchmarkId::new(name, coord.path_fragment()),
                &coord,
                |b, coord| {
                    b.iter(|| render_tile(black_box(&grid), &ramp, *coord));
                },
            );
        }
    }

    group.finish();
}

fn bench_color_ramp(c: &mut Criterion) {
    let mut group = c.benchmark_group("color_ramp");
    let values: Vec<f64> = (0..10_000).map(|i| i as f64 / 100.0 - 50.0).collect();
    group.throughput(Throughput::Elements(values.len() as u64));

    for (name, measurement, period) in [
        ("tavg_month", Measurement::Tavg, Period::Month(7)),
        ("precip_year", Measurement::Precip, Period::Annual),
    ] {
        let ramp = ColorRamp::for_period(measurement, period);
        group.bench_function(name, |b| {
            b.iter(|| {
                for v in &values {
                    black_box(ramp.color_at(*v));
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// PNG ENCODING
// =============================================================================

fn bench_png_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encoding");
    group.throughput(Throughput::Bytes(256 * 256 * 4));

    let random = random_rgba(256, 256);
    group.bench_function("rgba_random", |b| {
        b.iter(|| png::create_png(black_box(&random), 256, 256));
    });

    let ramp = ColorRamp::for_measurement(Measurement::Tavg);
    let tile = render_tile(&noisy_temperature(0.5), &ramp, TileCoord::new(2, 1, 1))
        .expect("tile renders");
    group.bench_function("auto_climate_tile", |b| {
        b.iter(|| png::create_png_auto(black_box(&tile.pixels), 256, 256));
    });
    group.bench_function("rgba_climate_tile", |b| {
        b.iter(|| png::create_png(black_box(&tile.pixels), 256, 256));
    });

    group.finish();
}

// =============================================================================
// PYRAMID
// =============================================================================

fn bench_pyramid(c: &mut Criterion) {
    let mut group = c.benchmark_group("pyramid");
    group.sample_size(10);

    let grid = noisy_temperature(1.0);
    let ramp = ColorRamp::for_measurement(Measurement::Tavg);
    let options = PyramidOptions {
        max_zoom: 3,
        tile_retries: 0,
        threads: None,
    };

    group.bench_function("zoom_0_to_3", |b| {
        b.iter(|| render_pyramid(&grid, &ramp, &options, |_, png| {
            black_box(png.len());
            Ok(())
        }));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_render_tile,
    bench_color_ramp,
    bench_png_encoding,
    bench_pyramid,
);
criterion_main!(benches);
