//! Tile store layout on a real filesystem.

use climate_common::{ClimateError, Measurement, Period, TileCoord};
use serde::Serialize;
use storage::TileStore;
use test_utils::fixtures::datasets;

#[derive(Serialize)]
struct Entry {
    value: f64,
    color: &'static str,
}

#[test]
fn test_write_and_read_tile() {
    let dir = tempfile::tempdir().unwrap();
    let store = TileStore::new(dir.path());
    let key = datasets::baseline_key(Measurement::Precip);
    let coord = TileCoord::new(2, 3, 1);

    store.write_tile(&key, Period::Month(1), &coord, b"png-bytes").unwrap();

    let path = dir.path().join("worldclim/1970-2000/tiles/precip-01/2/3/1.png");
    assert!(path.exists());
    assert_eq!(&store.read_tile(&key, Period::Month(1), &coord).unwrap()[..], b"png-bytes");
    assert!(matches!(
        store.read_tile(&key, Period::Month(2), &coord),
        Err(ClimateError::NotFound(_))
    ));
}

#[test]
fn test_clear_period_removes_only_that_period() {
    let dir = tempfile::tempdir().unwrap();
    let store = TileStore::new(dir.path());
    let key = datasets::baseline_key(Measurement::Tavg);
    let coord = TileCoord::new(0, 0, 0);

    store.write_tile(&key, Period::Annual, &coord, b"a").unwrap();
    store.write_tile(&key, Period::Month(6), &coord, b"b").unwrap();

    assert!(store.clear_period(&key, Period::Annual).unwrap());
    assert!(!store.clear_period(&key, Period::Annual).unwrap());
    assert!(store.read_tile(&key, Period::Annual, &coord).is_err());
    assert!(store.read_tile(&key, Period::Month(6), &coord).is_ok());

    assert_eq!(store.clear_dataset(&key).unwrap(), 1);
}

#[test]
fn test_legend_written_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = TileStore::new(dir.path());
    let key = datasets::baseline_key(Measurement::Tavg);

    let legend = vec![
        Entry { value: -10.0, color: "#0000ff" },
        Entry { value: 10.0, color: "#ffaaaa" },
    ];
    let path = store.write_legend(&key, Period::Annual, &legend).unwrap();
    assert!(path.ends_with("tavg-year/legend.json"));

    let parsed: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(parsed[1]["color"], "#ffaaaa");
}
