//! Path-keyed cache of loaded stores
//!
//! Host integrations that open the same database file from many places share
//! one loaded [`BinaryStore`] per absolute path. An entry is rechecked at most
//! once per `recheck_interval`; it is reloaded only when the file's mtime
//! moved forward and is at least `settle_delay` in the past, so a file still
//! being written is not picked up half-way.
//!
//! Stores are handed out as `Arc`s. A reload swaps the entry and leaves
//! stores already handed out valid for as long as their holders keep them.
//!
//! ```no_run
//! use prefixdb::DatabaseCache;
//! use std::time::Duration;
//!
//! let mut cache = DatabaseCache::new().recheck_interval(Duration::from_secs(10));
//! let store = cache.get("/var/lib/prefixdb/blocklist.pfdb")?;
//! println!("{:?}", store.lookup(0x0A00_0001)?);
//! # Ok::<(), prefixdb::PrefixDbError>(())
//! ```

use crate::error::{PrefixDbError, Result};
use crate::loader::{self, LoadMode};
use crate::store::BinaryStore;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Timing and load settings for a [`DatabaseCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Minimum time between two mtime checks of one entry
    pub recheck_interval: Duration,
    /// How old a new mtime must be before the file is reloaded
    pub settle_delay: Duration,
    /// How files are loaded
    pub load_mode: LoadMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            recheck_interval: Duration::from_secs(30),
            settle_delay: Duration::from_secs(5),
            load_mode: LoadMode::Copy,
        }
    }
}

struct Entry {
    store: Arc<BinaryStore<'static>>,
    checked: SystemTime,
    modified: SystemTime,
}

/// Shared, read-only stores keyed by absolute path
#[derive(Default)]
pub struct DatabaseCache {
    config: CacheConfig,
    entries: FxHashMap<PathBuf, Entry>,
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

fn cache_key(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        PrefixDbError::InvalidParameter(format!("cannot resolve {}: {}", path.display(), e))
    })
}

impl DatabaseCache {
    /// Empty cache with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache with `config`
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            entries: FxHashMap::default(),
        }
    }

    /// Set the recheck interval
    pub fn recheck_interval(mut self, interval: Duration) -> Self {
        self.config.recheck_interval = interval;
        self
    }

    /// Set the settle delay
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set how files are loaded
    pub fn load_mode(mut self, mode: LoadMode) -> Self {
        self.config.load_mode = mode;
        self
    }

    /// Current settings
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store for `path`, loading or reloading it as needed
    pub fn get<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<BinaryStore<'static>>> {
        self.get_at(path, SystemTime::now())
    }

    /// [`DatabaseCache::get`] with an explicit current time
    pub fn get_at<P: AsRef<Path>>(
        &mut self,
        path: P,
        now: SystemTime,
    ) -> Result<Arc<BinaryStore<'static>>> {
        let key = cache_key(path.as_ref())?;
        let config = self.config;

        if let Some(entry) = self.entries.get_mut(&key) {
            let since_check = now.duration_since(entry.checked).unwrap_or(Duration::ZERO);
            if since_check < config.recheck_interval {
                return Ok(Arc::clone(&entry.store));
            }
            entry.checked = now;

            let Ok(mtime) = modified(&key) else {
                return Ok(Arc::clone(&entry.store));
            };
            let settled = now
                .checked_sub(config.settle_delay)
                .is_some_and(|limit| mtime <= limit);
            if mtime > entry.modified && settled {
                match loader::load_file(&key, config.load_mode) {
                    Ok(store) => {
                        info!(path = %key.display(), "reloaded changed database");
                        entry.store = Arc::new(store);
                        entry.modified = mtime;
                    }
                    Err(err) => {
                        warn!(path = %key.display(), error = %err, "reload failed, keeping cached database");
                    }
                }
            }
            return Ok(Arc::clone(&entry.store));
        }

        let store = Arc::new(loader::load_file(&key, config.load_mode)?);
        let mtime = modified(&key).unwrap_or(now);
        self.entries.insert(
            key,
            Entry {
                store: Arc::clone(&store),
                checked: now,
                modified: mtime,
            },
        );
        Ok(store)
    }

    /// Drop the entry for `path`; returns whether one existed
    pub fn invalidate<P: AsRef<Path>>(&mut self, path: P) -> bool {
        match cache_key(path.as_ref()) {
            Ok(key) => self.entries.remove(&key).is_some(),
            Err(_) => false,
        }
    }

    /// Number of cached stores
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for DatabaseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseCache")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .finish()
    }
}
