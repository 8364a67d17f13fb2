//! Storage Backend Module
//!
//! Uniform key-value surface over the three storage kinds.
//!
//! ## Responsibilities
//! - `CacheBackend`: in-memory, process lifetime only
//! - `WriteThroughBackend`: durable record log, synced on every write
//! - `PluginBackend`: externally registered providers
//! - Select the backend from the resolved policy (callers never name one)
//!
//! All backends report a missing value as `PclError::NoKey`.

mod cache;
mod plugin;
mod write_through;

use std::sync::Arc;

pub use cache::CacheBackend;
pub use plugin::{PluginBackend, PluginRegistry};
pub use write_through::{Record, RecordLog, ReplayStats, WriteThroughBackend};

pub use crate::resolver::StorageKey;

use crate::error::{PclError, Result};
use crate::resolver::Policy;

/// Key-value capability every backend provides
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &StorageKey) -> Result<Vec<u8>>;

    /// Store `value` under `key`, returning the number of bytes accepted
    fn set(&self, key: &StorageKey, value: &[u8]) -> Result<usize>;

    /// Remove `key`
    fn delete(&self, key: &StorageKey) -> Result<()>;

    /// Size in bytes of the value stored under `key`
    fn size(&self, key: &StorageKey) -> Result<usize>;

    /// True if a value is stored under `key`
    fn contains(&self, key: &StorageKey) -> Result<bool> {
        match self.size(key) {
            Ok(_) => Ok(true),
            Err(PclError::NoKey) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Flush buffered state to durable storage
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Human-readable name, used in logging
    fn name(&self) -> &str;
}

/// The backend instances of one initialized library context
pub struct BackendSet {
    cache: Arc<CacheBackend>,
    write_through: Arc<WriteThroughBackend>,
    plugins: Arc<PluginRegistry>,
}

impl BackendSet {
    pub fn new(
        cache: Arc<CacheBackend>,
        write_through: Arc<WriteThroughBackend>,
        plugins: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            cache,
            write_through,
            plugins,
        }
    }

    /// Select the backend serving a policy
    pub fn dispatch(&self, policy: Policy) -> Result<Arc<dyn StorageBackend>> {
        match policy {
            Policy::Cached => Ok(self.cache.clone()),
            Policy::WriteThrough => Ok(self.write_through.clone()),
            Policy::Plugin(id) => {
                let provider = self.plugins.provider(id)?;
                Ok(Arc::new(PluginBackend::new(id, provider)))
            }
        }
    }

    /// Sync write-through logs and every registered plugin
    pub fn sync_all(&self) -> Result<()> {
        self.write_through.sync()?;
        self.plugins.sync_all()
    }

    pub fn cache(&self) -> &CacheBackend {
        &self.cache
    }

    pub fn write_through(&self) -> &WriteThroughBackend {
        &self.write_through
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }
}
