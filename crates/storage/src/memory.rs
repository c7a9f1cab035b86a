//! In-process catalog for dry runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use climate_common::{ClimateResult, DatasetKey, DatasetRecord};

use crate::catalog::{DatasetCatalog, DatasetQuery};

/// Catalog held in a map behind a mutex. Same semantics as the PostgreSQL
/// catalog, nothing survives the process.
#[derive(Default)]
pub struct MemoryCatalog {
    records: Mutex<HashMap<DatasetKey, DatasetRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl DatasetCatalog for MemoryCatalog {
    async fn upsert(&self, record: &DatasetRecord) -> ClimateResult<()> {
        self.records
            .lock()
            .await
            .insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, query: &DatasetQuery) -> ClimateResult<DatasetRecord> {
        let records = self.records.lock().await;
        records
            .values()
            .filter(|r| query.matches(&r.key))
            .max_by_key(|r| r.key.calibrated)
            .cloned()
            .ok_or_else(|| query.not_found())
    }

    async fn get(&self, key: &DatasetKey) -> ClimateResult<Option<DatasetRecord>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &DatasetKey) -> ClimateResult<bool> {
        Ok(self.records.lock().await.remove(key).is_some())
    }

    async fn list(&self, data_source: &str) -> ClimateResult<Vec<DatasetRecord>> {
        let records = self.records.lock().await;
        let mut out: Vec<DatasetRecord> = records
            .values()
            .filter(|r| r.key.data_source == data_source)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.key.start_year, a.key.end_year, a.key.measurement, a.key.calibrated).cmp(&(
                b.key.start_year,
                b.key.end_year,
                b.key.measurement,
                b.key.calibrated,
            ))
        });
        Ok(out)
    }
}
