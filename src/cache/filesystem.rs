//! On-disk cache backend.
//!
//! Records live at `<root>/<bucket>/<hh>/<hash>.rec`, where `hh` is the first
//! byte of the hash in hex. Writes go to a temporary file in the same
//! directory and are renamed into place, so readers never see a partial
//! record.

use super::{
    dispatch_get, dispatch_put, CacheBackend, CacheCallback, CacheKey, CacheRecord,
    CacheRecordBuilder, CacheStats, CacheStatsSnapshot, RequestOwner,
};
use crate::error::{ComputeGraphError, Result, ResultExt};
use crate::worker::WorkerPool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct FileSystemCacheBackend {
    root: PathBuf,
    workers: Arc<WorkerPool>,
    stats: Arc<CacheStats>,
}

impl FileSystemCacheBackend {
    pub fn new(root: impl Into<PathBuf>, workers: Arc<WorkerPool>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(ComputeGraphError::from)
            .with_context(|| format!("Failed to create cache directory {}", root.display()))?;
        tracing::info!("File system cache rooted at {}", root.display());
        Ok(Self {
            root,
            workers,
            stats: Arc::new(CacheStats::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `key`
    pub fn record_path(&self, key: &CacheKey) -> PathBuf {
        record_path(&self.root, key)
    }
}

fn record_path(root: &Path, key: &CacheKey) -> PathBuf {
    let hex = key.hash.to_hex();
    root.join(&key.bucket)
        .join(&hex[..2])
        .join(format!("{}.rec", hex))
}

fn read_record(root: &Path, key: &CacheKey) -> Result<Option<CacheRecord>> {
    let path = record_path(root, key);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let record = CacheRecord::from_bytes(&bytes)
        .with_context(|| format!("Corrupt cache record {}", path.display()))?;
    if record.key != *key {
        return Err(ComputeGraphError::Cache(format!(
            "record {} holds key {}",
            path.display(),
            record.key
        )));
    }
    Ok(Some(record))
}

fn write_record(root: &Path, record: &CacheRecord) -> Result<()> {
    let path = record_path(root, &record.key);
    let Some(dir) = path.parent() else {
        return Err(ComputeGraphError::Cache(format!(
            "invalid record path {}",
            path.display()
        )));
    };
    std::fs::create_dir_all(dir)?;

    let temp = dir.join(format!(
        "{}.{}.{}.tmp",
        record.key.hash.to_hex(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&temp, record.to_bytes()?)?;
    if let Err(e) = std::fs::rename(&temp, &path) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}

impl CacheBackend for FileSystemCacheBackend {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn get(&self, key: &CacheKey, owner: &RequestOwner, on_complete: CacheCallback) {
        let root = self.root.clone();
        dispatch_get(
            self.name(),
            &self.workers,
            &self.stats,
            key,
            owner,
            on_complete,
            move |key| read_record(&root, key),
        );
    }

    fn put(&self, record: CacheRecordBuilder, owner: &RequestOwner) {
        let root = self.root.clone();
        dispatch_put(
            self.name(),
            &self.workers,
            &self.stats,
            record,
            owner,
            move |record| write_record(&root, &record),
        );
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
