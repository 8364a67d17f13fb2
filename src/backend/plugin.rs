//! Plugin backends
//!
//! Externally registered storage providers, keyed by plugin id. The
//! dispatch wrapper keeps the error taxonomy uniform so plugin-backed keys
//! look like native ones to callers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{PclError, Result};
use crate::resolver::PluginId;

use super::{StorageBackend, StorageKey};

/// Registry of plugin providers
#[derive(Default)]
pub struct PluginRegistry {
    providers: RwLock<HashMap<PluginId, Arc<dyn StorageBackend>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, returning the one it replaces
    pub fn register(
        &self,
        id: PluginId,
        provider: Arc<dyn StorageBackend>,
    ) -> Option<Arc<dyn StorageBackend>> {
        tracing::debug!(plugin = %id, provider = provider.name(), "Plugin registered");
        self.providers.write().insert(id, provider)
    }

    pub fn unregister(&self, id: PluginId) -> Option<Arc<dyn StorageBackend>> {
        self.providers.write().remove(&id)
    }

    /// Look up the provider for `id`
    pub fn provider(&self, id: PluginId) -> Result<Arc<dyn StorageBackend>> {
        self.providers
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| PclError::NotInitialized(format!("plugin {} not registered", id)))
    }

    pub fn is_registered(&self, id: PluginId) -> bool {
        self.providers.read().contains_key(&id)
    }

    /// Sync every registered provider
    pub fn sync_all(&self) -> Result<()> {
        let providers: Vec<_> = self.providers.read().iter().map(|(id, p)| (*id, p.clone())).collect();
        for (id, provider) in providers {
            provider.sync().map_err(|e| normalize(id, e))?;
        }
        Ok(())
    }
}

/// Dispatch wrapper around one provider
pub struct PluginBackend {
    id: PluginId,
    provider: Arc<dyn StorageBackend>,
}

impl PluginBackend {
    pub fn new(id: PluginId, provider: Arc<dyn StorageBackend>) -> Self {
        Self { id, provider }
    }

    pub fn id(&self) -> PluginId {
        self.id
    }
}

impl StorageBackend for PluginBackend {
    fn get(&self, key: &StorageKey) -> Result<Vec<u8>> {
        self.provider.get(key).map_err(|e| normalize(self.id, e))
    }

    fn set(&self, key: &StorageKey, value: &[u8]) -> Result<usize> {
        self.provider.set(key, value).map_err(|e| normalize(self.id, e))
    }

    fn delete(&self, key: &StorageKey) -> Result<()> {
        self.provider.delete(key).map_err(|e| normalize(self.id, e))
    }

    fn size(&self, key: &StorageKey) -> Result<usize> {
        self.provider.size(key).map_err(|e| normalize(self.id, e))
    }

    fn sync(&self) -> Result<()> {
        self.provider.sync().map_err(|e| normalize(self.id, e))
    }

    fn name(&self) -> &str {
        self.id.as_str()
    }
}

/// Collapse provider errors onto the public taxonomy
fn normalize(id: PluginId, error: PclError) -> PclError {
    match error {
        PclError::NoKey | PclError::NotInitialized(_) | PclError::InvalidArgument(_) => error,
        other => PclError::Plugin(format!("{}: {}", id, other)),
    }
}
