//! End-to-end tiling properties: ramp lookups on real grid geometry, tile
//! coverage and the projection round trip.

use climate_common::tile::{lat_lon_to_pixel, pixel_to_lat_lon, tiles_at_zoom};
use climate_common::{GridSpec, Measurement, TileCoord};
use climate_grid::Grid2D;
use renderer::{colour_for_value, render_tile, Color, ColorRamp};
use test_utils::{constant_grid, fixtures::points, TEST_FILL};

// ============================================================================
// Colour lookup on a half-degree grid
// ============================================================================

#[test]
fn test_single_cell_colour() {
    let spec = GridSpec::new(85.0, -0.5, -180.0, 0.5, 340, 720);
    let mut values = vec![TEST_FILL; spec.len()];
    values[spec.flat_index(0, 0)] = 10.0;
    let grid = Grid2D::new(spec, values, TEST_FILL, "degC").unwrap();

    let value = grid.get(0, 0).unwrap() as f64;
    let expected = Color::opaque(255, 170, 170);
    assert_eq!(colour_for_value(value, Measurement::Tavg, "degC").unwrap(), expected);

    // The same colour lands in the pixel over that cell at zoom 6
    let (tile, px, py) = lat_lon_to_pixel(84.9, -179.9, 6).unwrap();
    let ramp = ColorRamp::for_measurement(Measurement::Tavg);
    let image = render_tile(&grid, &ramp, tile).unwrap();
    assert_eq!(image.pixel(px as usize, py as usize), expected.rgba());

    // Everything else in that tile is fill
    let (other_tile, qx, qy) = lat_lon_to_pixel(84.7, -176.0, 6).unwrap();
    assert_eq!(other_tile, tile);
    assert_eq!(image.pixel(qx as usize, qy as usize)[3], 0);
}

// ============================================================================
// Coverage
// ============================================================================

#[test]
fn test_global_grid_covers_every_tile() {
    let grid = constant_grid(test_utils::global_spec(2.0), 42.0, "mm");
    let ramp = ColorRamp::for_measurement(Measurement::Precip);

    for z in 0..=3 {
        for coord in tiles_at_zoom(z) {
            let image = render_tile(&grid, &ramp, coord).unwrap();
            assert!(
                image.pixels.chunks_exact(4).all(|p| p[3] == 255),
                "tile {} has gaps",
                coord.path_fragment()
            );
        }
    }
}

#[test]
fn test_tiles_outside_regional_grid_are_blank() {
    let grid = constant_grid(test_utils::fixtures::grid::conus_1deg(), 5.0, "degC");
    let ramp = ColorRamp::for_measurement(Measurement::Tavg);

    // Sydney is far from CONUS
    let (lat, lon) = points::SYDNEY;
    let (tile, _, _) = lat_lon_to_pixel(lat, lon, 4).unwrap();
    assert!(render_tile(&grid, &ramp, tile).unwrap().is_blank());

    let (lat, lon) = points::NEW_YORK;
    let (tile, px, py) = lat_lon_to_pixel(lat, lon, 4).unwrap();
    let image = render_tile(&grid, &ramp, tile).unwrap();
    assert_eq!(image.pixel(px as usize, py as usize)[3], 255);
}

// ============================================================================
// Projection round trip
// ============================================================================

#[test]
fn test_pixel_round_trip_within_one_pixel() {
    for z in 0..=12 {
        let n = TileCoord::tiles_per_axis(z);
        for (tx, ty) in [(0, 0), (n / 2, n / 3), (n - 1, n - 1)] {
            let tile = TileCoord::new(z, tx, ty);
            for (px, py) in [(0, 0), (128, 77), (255, 255)] {
                let (lat, lon) = pixel_to_lat_lon(&tile, px, py);
                let (back, bx, by) = lat_lon_to_pixel(lat, lon, z).unwrap();
                let gx = |t: &TileCoord, p: u32| t.x as i64 * 256 + p as i64;
                let gy = |t: &TileCoord, p: u32| t.y as i64 * 256 + p as i64;
                assert!((gx(&back, bx) - gx(&tile, px)).abs() <= 1, "z{} x", z);
                assert!((gy(&back, by) - gy(&tile, py)).abs() <= 1, "z{} y", z);
            }
        }
    }
}
