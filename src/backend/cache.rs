//! Cache backend
//!
//! HashMap-based in-memory store with RwLock for concurrency. Never
//! persisted; contents live as long as the library context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::{PclError, Result};

use super::{StorageBackend, StorageKey};

/// In-memory backend for `Policy::Cached`
///
/// ## Concurrency:
/// - `data`: RwLock (many concurrent readers, exclusive writer)
/// - `size`: updated while holding the write lock, read lock-free
pub struct CacheBackend {
    data: RwLock<HashMap<StorageKey, Vec<u8>>>,

    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl CacheBackend {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Approximate size in bytes
    pub fn size_bytes(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Drop every cached value
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::Release);
    }

    fn entry_size(key: &StorageKey, value: &[u8]) -> usize {
        key.database.len() + key.key.len() + value.len()
    }
}

impl Default for CacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for CacheBackend {
    fn get(&self, key: &StorageKey) -> Result<Vec<u8>> {
        self.data.read().get(key).cloned().ok_or(PclError::NoKey)
    }

    fn set(&self, key: &StorageKey, value: &[u8]) -> Result<usize> {
        let mut data = self.data.write();

        let added = Self::entry_size(key, value);
        if let Some(old) = data.insert(key.clone(), value.to_vec()) {
            self.size
                .fetch_sub(Self::entry_size(key, &old), Ordering::AcqRel);
        }
        self.size.fetch_add(added, Ordering::AcqRel);

        Ok(value.len())
    }

    fn delete(&self, key: &StorageKey) -> Result<()> {
        let mut data = self.data.write();

        let old = data.remove(key).ok_or(PclError::NoKey)?;
        self.size
            .fetch_sub(Self::entry_size(key, &old), Ordering::AcqRel);

        Ok(())
    }

    fn size(&self, key: &StorageKey) -> Result<usize> {
        self.data
            .read()
            .get(key)
            .map(|v| v.len())
            .ok_or(PclError::NoKey)
    }

    fn name(&self) -> &str {
        "cache"
    }
}
