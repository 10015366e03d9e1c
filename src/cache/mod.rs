//! Content-addressed shader map cache
//!
//! Compiled shader maps are stored in a typed bucket ([`BUCKET`]) as a
//! single value ([`VALUE_ID`]) keyed by the kernel's content hash. Backends
//! are process-wide services with their own synchronisation:
//!
//! - [`MemoryCacheBackend`] - in-process map, lost on exit
//! - [`FileSystemCacheBackend`] - `<root>/<bucket>/<hh>/<hash>.rec` files
//!
//! Both `get` and `put` return immediately and complete on the worker pool.
//! A [`RequestOwner`] ties requests to their issuer: once cancelled, pending
//! `get` callbacks observe [`CacheStatus::Cancelled`] and do nothing else.

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemCacheBackend;
pub use memory::MemoryCacheBackend;

use crate::error::Result;
use crate::hash::Digest;
use crate::worker::WorkerPool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bucket holding compiled compute kernel shader maps
pub const BUCKET: &str = "ComputeGraphKernel";

/// Value id of the serialized shader map inside a record
pub const VALUE_ID: &str = "Data";

/// Key of one cache record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub bucket: String,
    pub hash: Digest,
}

impl CacheKey {
    /// Key in the kernel bucket
    pub fn kernel(hash: Digest) -> Self {
        Self {
            bucket: BUCKET.to_string(),
            hash,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.hash)
    }
}

/// A stored record: named binary values under one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: CacheKey,
    values: BTreeMap<String, Vec<u8>>,
}

impl CacheRecord {
    pub fn value(&self, id: &str) -> Option<&[u8]> {
        self.values.get(id).map(Vec::as_slice)
    }

    pub fn value_ids(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Accumulates values for a record before a `put`.
#[derive(Debug, Clone)]
pub struct CacheRecordBuilder {
    key: CacheKey,
    values: BTreeMap<String, Vec<u8>>,
}

impl CacheRecordBuilder {
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            values: BTreeMap::new(),
        }
    }

    pub fn add_value(mut self, id: impl Into<String>, data: Vec<u8>) -> Self {
        self.values.insert(id.into(), data);
        self
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn build(self) -> CacheRecord {
        CacheRecord {
            key: self.key,
            values: self.values,
        }
    }
}

/// Outcome of a `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Ok,
    Miss,
    Error,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CacheResponse {
    pub key: CacheKey,
    pub status: CacheStatus,
    /// Present iff `status == Ok`
    pub record: Option<CacheRecord>,
    pub error: Option<String>,
}

impl CacheResponse {
    fn new(key: CacheKey, status: CacheStatus) -> Self {
        Self {
            key,
            status,
            record: None,
            error: None,
        }
    }
}

pub type CacheCallback = Box<dyn FnOnce(CacheResponse) + Send + 'static>;

#[derive(Debug, Default)]
struct RequestOwnerInner {
    cancelled: AtomicBool,
    pending: AtomicUsize,
}

/// Issuer of cache requests. Clones share cancellation state.
#[derive(Debug, Clone, Default)]
pub struct RequestOwner {
    inner: Arc<RequestOwnerInner>,
}

impl RequestOwner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Keep the owner alive and counted as busy until the guard drops.
    pub fn keep_alive(&self) -> KeepAlive {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        KeepAlive {
            owner: self.clone(),
        }
    }

    /// Requests started through this owner that have not completed
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }
}

/// Guard returned by [`RequestOwner::keep_alive`].
#[derive(Debug)]
pub struct KeepAlive {
    owner: RequestOwner,
}

impl KeepAlive {
    pub fn owner(&self) -> &RequestOwner {
        &self.owner
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.owner.inner.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counters kept by every backend.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    cancelled: AtomicU64,
    puts: AtomicU64,
    put_errors: AtomicU64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            put_errors: self.put_errors.load(Ordering::Relaxed),
        }
    }

    fn record(&self, status: CacheStatus) {
        let counter = match status {
            CacheStatus::Ok => &self.hits,
            CacheStatus::Miss => &self.misses,
            CacheStatus::Error => &self.errors,
            CacheStatus::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_put(&self, ok: bool) {
        let counter = if ok { &self.puts } else { &self.put_errors };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub cancelled: u64,
    pub puts: u64,
    pub put_errors: u64,
}

/// Content-addressed get/put service.
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Look up a record. `on_complete` runs once, on an unspecified worker
    /// thread (or inline if the pool has shut down).
    fn get(&self, key: &CacheKey, owner: &RequestOwner, on_complete: CacheCallback);

    /// Store a record. Fire-and-forget; the owner is kept alive until the
    /// write completes.
    fn put(&self, record: CacheRecordBuilder, owner: &RequestOwner);

    fn stats(&self) -> CacheStatsSnapshot;
}

/// Runs a blocking lookup on the worker pool and reports it through the
/// callback, honouring cancellation. Shared by the concrete backends.
pub(crate) fn dispatch_get<F>(
    backend: &str,
    workers: &Arc<WorkerPool>,
    stats: &Arc<CacheStats>,
    key: &CacheKey,
    owner: &RequestOwner,
    on_complete: CacheCallback,
    lookup: F,
) where
    F: FnOnce(&CacheKey) -> Result<Option<CacheRecord>> + Send + 'static,
{
    let guard = owner.keep_alive();
    let job_key = key.clone();
    let job_stats = stats.clone();
    let backend_name = backend.to_string();

    // The callback is shared between the job and the failure path below
    let callback = Arc::new(parking_lot::Mutex::new(Some(on_complete)));
    let job_callback = callback.clone();

    let queued = workers.execute(move || {
        let Some(on_complete) = job_callback.lock().take() else {
            return;
        };
        if guard.owner().is_cancelled() {
            job_stats.record(CacheStatus::Cancelled);
            on_complete(CacheResponse::new(job_key, CacheStatus::Cancelled));
            return;
        }

        let result = lookup(&job_key);

        // Cancelled while the lookup ran
        let cancelled = guard.owner().is_cancelled();
        drop(guard);
        if cancelled {
            job_stats.record(CacheStatus::Cancelled);
            on_complete(CacheResponse::new(job_key, CacheStatus::Cancelled));
            return;
        }

        let response = match result {
            Ok(Some(record)) => CacheResponse {
                record: Some(record),
                ..CacheResponse::new(job_key, CacheStatus::Ok)
            },
            Ok(None) => CacheResponse::new(job_key, CacheStatus::Miss),
            Err(e) => {
                tracing::warn!("Cache backend '{}' failed to read {}: {}", backend_name, job_key, e);
                CacheResponse {
                    error: Some(e.to_string()),
                    ..CacheResponse::new(job_key, CacheStatus::Error)
                }
            }
        };
        job_stats.record(response.status);
        on_complete(response);
    });

    if let Err(e) = queued {
        if let Some(on_complete) = callback.lock().take() {
            stats.record(CacheStatus::Error);
            on_complete(CacheResponse {
                error: Some(e.to_string()),
                ..CacheResponse::new(key.clone(), CacheStatus::Error)
            });
        }
    }
}

/// Runs a write on the worker pool. Failures are logged and counted; the
/// caller never observes them.
pub(crate) fn dispatch_put<F>(
    backend: &str,
    workers: &Arc<WorkerPool>,
    stats: &Arc<CacheStats>,
    record: CacheRecordBuilder,
    owner: &RequestOwner,
    store: F,
) where
    F: FnOnce(CacheRecord) -> Result<()> + Send + 'static,
{
    let guard = owner.keep_alive();
    let job_stats = stats.clone();
    let backend_name = backend.to_string();

    let queued = workers.execute(move || {
        let record = record.build();
        let key = record.key.clone();
        match store(record) {
            Ok(()) => {
                tracing::trace!("Cache backend '{}' stored {}", backend_name, key);
                job_stats.record_put(true);
            }
            Err(e) => {
                tracing::warn!("Cache backend '{}' failed to store {}: {}", backend_name, key, e);
                job_stats.record_put(false);
            }
        }
        drop(guard);
    });

    if let Err(e) = queued {
        tracing::warn!("Cache backend '{}' dropped a write: {}", backend, e);
        stats.record_put(false);
    }
}
