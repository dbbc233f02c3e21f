//! High-level cache orchestrator.
//!
//! `Cache` ties the entry store, the in-memory map, and the persistent index
//! together. It is shared by reference between scheduler workers; every
//! method takes `&self`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use kiln_common::{ContentHash, KILN_VERSION};

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::hasher::{ChangeSet, SourceHasher};
use crate::index::CacheIndex;
use crate::key::CacheKey;
use crate::store::EntryStore;

/// What a [`Cache::store`] call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    /// A new value was written.
    Stored,
    /// The key already held a byte-identical value; nothing was written.
    Unchanged,
}

/// Incremental cache for one project.
pub struct Cache {
    cache_dir: PathBuf,
    store: EntryStore,
    memory: DashMap<CacheKey, Arc<CacheEntry>>,
    last_used: DashMap<String, u64>,
    generation: AtomicU64,
    sources: Mutex<BTreeMap<PathBuf, ContentHash>>,
    load_error: Option<CacheError>,
}

impl Cache {
    /// Opens the cache in `cache_dir`, loading the index if one exists.
    ///
    /// Never fails: a missing, unreadable or incompatible index starts an
    /// empty one. A load error is kept so the caller can report it.
    pub fn open(cache_dir: &Path) -> Self {
        let (index, load_error) = match CacheIndex::load(cache_dir) {
            Ok(Some(index)) if index.is_compatible(KILN_VERSION) => (index, None),
            Ok(Some(index)) => {
                tracing::debug!(
                    found = %index.kiln_version,
                    "cache index written by another version; starting fresh"
                );
                (CacheIndex::new(KILN_VERSION), None)
            }
            Ok(None) => (CacheIndex::new(KILN_VERSION), None),
            Err(e) => {
                tracing::warn!("ignoring unreadable cache index: {e}");
                (CacheIndex::new(KILN_VERSION), Some(e))
            }
        };

        Self {
            cache_dir: cache_dir.to_path_buf(),
            store: EntryStore::new(cache_dir),
            memory: DashMap::new(),
            last_used: index.entries.into_iter().collect(),
            generation: AtomicU64::new(index.generation),
            sources: Mutex::new(index.sources),
            load_error,
        }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The error encountered while loading the index, if any.
    pub fn load_error(&self) -> Option<&CacheError> {
        self.load_error.as_ref()
    }

    /// Starts a new build generation and returns its number.
    pub fn begin_build(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The current build generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Number of entries currently held in memory.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Returns `true` if no entries are held in memory.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Looks up the entry for `key`, in memory first and then on disk.
    ///
    /// `Ok(None)` is a plain miss. An `Err` means a stored entry exists but
    /// is unusable; callers treat it as a miss.
    pub fn lookup(&self, key: &CacheKey) -> Result<Option<Arc<CacheEntry>>, CacheError> {
        if let Some(entry) = self.memory.get(key) {
            self.touch(key);
            return Ok(Some(Arc::clone(entry.value())));
        }

        match self.store.read(key)? {
            Some(entry) => {
                let entry = Arc::new(entry);
                self.memory.insert(*key, Arc::clone(&entry));
                self.touch(key);
                tracing::trace!(%key, "cache entry loaded from disk");
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Stores `entry` under `key`.
    ///
    /// Storing a value identical to the one already held is a no-op. The
    /// in-memory map is updated even if writing the file fails, so the
    /// current build can still reuse the result.
    pub fn store(
        &self,
        key: &CacheKey,
        entry: Arc<CacheEntry>,
    ) -> Result<StoreOutcome, CacheError> {
        if let Some(existing) = self.memory.get(key) {
            if existing.same_value(&entry) {
                drop(existing);
                self.touch(key);
                return Ok(StoreOutcome::Unchanged);
            }
        }

        self.memory.insert(*key, Arc::clone(&entry));
        self.touch(key);
        self.store.write(key, &entry)?;
        tracing::trace!(%key, "cache entry stored");
        Ok(StoreOutcome::Stored)
    }

    /// Drops every entry from memory and disk.
    pub fn invalidate_all(&self) -> Result<(), CacheError> {
        self.memory.clear();
        self.last_used.clear();
        self.lock_sources().clear();
        self.store.clear()?;
        tracing::debug!(dir = %self.cache_dir.display(), "cache invalidated");
        Ok(())
    }

    /// Removes entries not used within the last `max_idle_builds` builds,
    /// along with entry files the index does not know about.
    ///
    /// Returns the number of entry files removed. A limit of zero disables
    /// collection.
    pub fn gc(&self, max_idle_builds: u64) -> Result<usize, CacheError> {
        if max_idle_builds == 0 {
            return Ok(0);
        }
        let generation = self.generation();
        self.last_used
            .retain(|_, used| generation.saturating_sub(*used) < max_idle_builds);
        self.memory
            .retain(|key, _| self.last_used.contains_key(&key.file_stem()));

        let mut removed = 0;
        for stem in self.store.list()? {
            if !self.last_used.contains_key(&stem) && self.store.remove(&stem)? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "cache entries collected");
        }
        Ok(removed)
    }

    /// Persists the index.
    pub fn save(&self) -> Result<(), CacheError> {
        let index = CacheIndex {
            kiln_version: KILN_VERSION.to_string(),
            generation: self.generation(),
            entries: self
                .last_used
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            sources: self.lock_sources().clone(),
        };
        index.save(&self.cache_dir)
    }

    /// Hashes `paths`, compares them with the fingerprints recorded by the
    /// previous call (or the previous build), and records the new ones.
    pub fn refresh_sources(&self, paths: &[PathBuf]) -> ChangeSet {
        let current = SourceHasher::hash_files(paths);
        let mut sources = self.lock_sources();
        let changes = SourceHasher::detect_changes(&current, &sources);
        *sources = current.into_iter().collect();
        changes
    }

    fn touch(&self, key: &CacheKey) {
        self.last_used.insert(key.file_stem(), self.generation());
    }

    fn lock_sources(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, ContentHash>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
