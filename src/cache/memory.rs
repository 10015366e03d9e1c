//! In-process cache backend.

use super::{
    dispatch_get, dispatch_put, CacheBackend, CacheCallback, CacheKey, CacheRecord,
    CacheRecordBuilder, CacheStats, CacheStatsSnapshot, RequestOwner,
};
use crate::worker::WorkerPool;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MemoryCacheBackend {
    records: Arc<RwLock<HashMap<CacheKey, CacheRecord>>>,
    workers: Arc<WorkerPool>,
    stats: Arc<CacheStats>,
}

impl MemoryCacheBackend {
    pub fn new(workers: Arc<WorkerPool>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            workers,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.records.read().contains_key(key)
    }

    /// Drop every stored record.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &CacheKey, owner: &RequestOwner, on_complete: CacheCallback) {
        let records = self.records.clone();
        dispatch_get(
            self.name(),
            &self.workers,
            &self.stats,
            key,
            owner,
            on_complete,
            move |key| Ok(records.read().get(key).cloned()),
        );
    }

    fn put(&self, record: CacheRecordBuilder, owner: &RequestOwner) {
        let records = self.records.clone();
        dispatch_put(
            self.name(),
            &self.workers,
            &self.stats,
            record,
            owner,
            move |record| {
                records.write().insert(record.key.clone(), record);
                Ok(())
            },
        );
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
