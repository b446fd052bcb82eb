//! Offline rate cache: the most recent snapshot per base.

use async_trait::async_trait;
use dashmap::DashMap;
use ratekeeper_common::{CurrencyCode, CurrencySnapshot};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{FxError, FxResult};

/// Persistent store of the last snapshot fetched for each base.
///
/// Writes are last-writer-wins per base code.
#[async_trait]
pub trait RateCache: Send + Sync {
    /// Most recent snapshot for `base`, if one was ever stored.
    async fn get(&self, base: &CurrencyCode) -> FxResult<Option<CurrencySnapshot>>;

    /// Store `snapshot`, replacing any earlier one for the same base.
    async fn put(&self, snapshot: &CurrencySnapshot) -> FxResult<()>;
}

/// Thread-safe in-memory rate cache.
pub struct InMemoryRateCache {
    cache: DashMap<CurrencyCode, CurrencySnapshot>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryRateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            writes: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every read and write fail, to exercise the fallback paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot stored for `base`, bypassing the async interface.
    pub fn peek(&self, base: &CurrencyCode) -> Option<CurrencySnapshot> {
        self.cache.get(base).map(|s| s.clone())
    }

    /// Get the number of bases cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn check(&self) -> FxResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(FxError::Cache("in-memory cache marked failing".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateCache for InMemoryRateCache {
    async fn get(&self, base: &CurrencyCode) -> FxResult<Option<CurrencySnapshot>> {
        self.check()?;
        let hit = self.peek(base);
        debug!(base = %base, hit = hit.is_some(), "Cache lookup");
        Ok(hit)
    }

    async fn put(&self, snapshot: &CurrencySnapshot) -> FxResult<()> {
        self.check()?;
        self.cache.insert(snapshot.base().clone(), snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Rate cache persisted as a single JSON document keyed by base.
pub struct FileRateCache {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileRateCache {
    /// Create a cache backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> FxResult<BTreeMap<CurrencyCode, CurrencySnapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RateCache for FileRateCache {
    async fn get(&self, base: &CurrencyCode) -> FxResult<Option<CurrencySnapshot>> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        let hit = all.remove(base);
        debug!(base = %base, hit = hit.is_some(), path = %self.path.display(), "Cache lookup");
        Ok(hit)
    }

    async fn put(&self, snapshot: &CurrencySnapshot) -> FxResult<()> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        all.insert(snapshot.base().clone(), snapshot.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&all)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(base = %snapshot.base(), path = %self.path.display(), "Snapshot persisted");
        Ok(())
    }
}
