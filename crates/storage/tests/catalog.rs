//! Catalog semantics, exercised against the in-memory implementation.

use std::sync::Arc;

use chrono::Utc;
use climate_common::{ClimateError, DatasetKey, DatasetRecord, Measurement};
use storage::{DatasetCatalog, DatasetQuery, MemoryCatalog};
use test_utils::fixtures::{datasets, grid};

fn record(key: DatasetKey, max_zoom: u32) -> DatasetRecord {
    DatasetRecord {
        data_path: format!("/data/{}-data.bin", key.base_name()),
        key,
        spec: grid::model_2_5deg(),
        fill_value: -9999.0,
        max_zoom,
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Upsert
// ============================================================================

#[tokio::test]
async fn test_upsert_replaces_existing_record() {
    let catalog = MemoryCatalog::new();
    let key = datasets::baseline_key(Measurement::Tavg);

    catalog.upsert(&record(key.clone(), 5)).await.unwrap();
    catalog.upsert(&record(key.clone(), 7)).await.unwrap();

    assert_eq!(catalog.len().await, 1);
    let stored = catalog.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.max_zoom, 7);
}

#[tokio::test]
async fn test_concurrent_upserts_leave_one_record() {
    let catalog = Arc::new(MemoryCatalog::new());
    let key = datasets::model_key(Measurement::Precip);

    let handles: Vec<_> = (0..8)
        .map(|zoom| {
            let catalog = Arc::clone(&catalog);
            let record = record(key.clone(), zoom);
            tokio::spawn(async move { catalog.upsert(&record).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(catalog.list(datasets::MODEL_SOURCE).await.unwrap().len(), 1);
}

// ============================================================================
// Find
// ============================================================================

#[tokio::test]
async fn test_find_prefers_calibrated() {
    let catalog = MemoryCatalog::new();
    let key = datasets::model_key(Measurement::Precip);
    catalog.upsert(&record(key.clone(), 7)).await.unwrap();

    let (start, end) = datasets::FUTURE_YEARS;
    let query = DatasetQuery::new(datasets::MODEL_SOURCE, Measurement::Precip, start, end);
    assert!(!catalog.find(&query).await.unwrap().key.calibrated);

    catalog.upsert(&record(key.calibrated(), 7)).await.unwrap();
    assert!(catalog.find(&query).await.unwrap().key.calibrated);

    let uncalibrated = query.calibrated(false);
    assert!(!catalog.find(&uncalibrated).await.unwrap().key.calibrated);
}

#[tokio::test]
async fn test_find_missing_is_not_found() {
    let catalog = MemoryCatalog::new();
    catalog
        .upsert(&record(datasets::baseline_key(Measurement::Tavg), 7))
        .await
        .unwrap();

    let query = DatasetQuery::new(datasets::BASELINE_SOURCE, Measurement::Tmax, 1970, 2000);
    assert!(matches!(
        catalog.find(&query).await,
        Err(ClimateError::NotFound(_))
    ));
}

// ============================================================================
// Delete and list
// ============================================================================

#[tokio::test]
async fn test_delete() {
    let catalog = MemoryCatalog::new();
    let key = datasets::baseline_key(Measurement::Precip);
    catalog.upsert(&record(key.clone(), 7)).await.unwrap();

    assert!(catalog.delete(&key).await.unwrap());
    assert!(!catalog.delete(&key).await.unwrap());
    assert!(catalog.get(&key).await.unwrap().is_none());
    assert!(catalog.is_empty().await);
}

#[tokio::test]
async fn test_list_filters_by_source_and_orders_by_range() {
    let catalog = MemoryCatalog::new();
    let late = DatasetKey::new(datasets::MODEL_SOURCE, Measurement::Tavg, 2070, 2099, false).unwrap();
    let early = datasets::model_key(Measurement::Tavg);

    catalog.upsert(&record(late, 7)).await.unwrap();
    catalog.upsert(&record(early, 7)).await.unwrap();
    catalog
        .upsert(&record(datasets::baseline_key(Measurement::Tavg), 7))
        .await
        .unwrap();

    let listed = catalog.list(datasets::MODEL_SOURCE).await.unwrap();
    let ranges: Vec<String> = listed.iter().map(|r| r.key.date_range()).collect();
    assert_eq!(ranges, vec!["2040-2069", "2070-2099"]);
}
