//! Tests for plugin dispatch
//!
//! These tests verify:
//! - Registered providers serve their plugin id
//! - Unregistered plugin ids report NotInitialized
//! - Provider errors collapse onto the public taxonomy

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use pcl::backend::{BackendSet, CacheBackend, PluginRegistry, StorageBackend, StorageKey, WriteThroughBackend};
use pcl::error::Result;
use pcl::{PclError, PluginId, Policy, WriteThroughSync};
use tempfile::TempDir;

// =============================================================================
// Test Providers
// =============================================================================

#[derive(Default)]
struct MemoryPlugin {
    values: Mutex<HashMap<StorageKey, Vec<u8>>>,
}

impl StorageBackend for MemoryPlugin {
    fn get(&self, key: &StorageKey) -> Result<Vec<u8>> {
        self.values.lock().get(key).cloned().ok_or(PclError::NoKey)
    }

    fn set(&self, key: &StorageKey, value: &[u8]) -> Result<usize> {
        self.values.lock().insert(key.clone(), value.to_vec());
        Ok(value.len())
    }

    fn delete(&self, key: &StorageKey) -> Result<()> {
        self.values.lock().remove(key).map(|_| ()).ok_or(PclError::NoKey)
    }

    fn size(&self, key: &StorageKey) -> Result<usize> {
        self.values.lock().get(key).map(|v| v.len()).ok_or(PclError::NoKey)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct BrokenPlugin;

impl StorageBackend for BrokenPlugin {
    fn get(&self, _key: &StorageKey) -> Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::Other, "device gone").into())
    }

    fn set(&self, _key: &StorageKey, _value: &[u8]) -> Result<usize> {
        Err(PclError::InvalidArgument("rejected".to_string()))
    }

    fn delete(&self, _key: &StorageKey) -> Result<()> {
        Err(PclError::NoKey)
    }

    fn size(&self, _key: &StorageKey) -> Result<usize> {
        Err(PclError::Corruption("bad block".to_string()))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn backend_set(dir: &TempDir, plugins: Arc<PluginRegistry>) -> BackendSet {
    BackendSet::new(
        Arc::new(CacheBackend::new()),
        Arc::new(WriteThroughBackend::new(dir.path(), WriteThroughSync::EveryWrite, 1024)),
        plugins,
    )
}

fn key() -> StorageKey {
    StorageKey::new("app1", "/node/secret")
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[test]
fn test_dispatch_to_registered_plugin() {
    let dir = TempDir::new().unwrap();
    let plugins = Arc::new(PluginRegistry::new());
    let provider = Arc::new(MemoryPlugin::default());
    plugins.register(PluginId::Secure, provider.clone());

    let set = backend_set(&dir, plugins);
    let backend = set.dispatch(Policy::Plugin(PluginId::Secure)).unwrap();

    backend.set(&key(), b"s3cr3t").unwrap();

    assert_eq!(backend.name(), "secure");
    assert_eq!(provider.get(&key()).unwrap(), b"s3cr3t");
    assert_eq!(backend.size(&key()).unwrap(), 6);
}

#[test]
fn test_unregistered_plugin() {
    let dir = TempDir::new().unwrap();
    let set = backend_set(&dir, Arc::new(PluginRegistry::new()));

    let result = set.dispatch(Policy::Plugin(PluginId::Early));

    assert!(matches!(result, Err(PclError::NotInitialized(_))));
}

#[test]
fn test_register_replaces_and_unregister_removes() {
    let plugins = PluginRegistry::new();

    assert!(plugins
        .register(PluginId::Custom1, Arc::new(MemoryPlugin::default()))
        .is_none());
    assert!(plugins
        .register(PluginId::Custom1, Arc::new(MemoryPlugin::default()))
        .is_some());
    assert!(plugins.is_registered(PluginId::Custom1));

    assert!(plugins.unregister(PluginId::Custom1).is_some());
    assert!(!plugins.is_registered(PluginId::Custom1));
}

#[test]
fn test_provider_errors_are_normalized() {
    let dir = TempDir::new().unwrap();
    let plugins = Arc::new(PluginRegistry::new());
    plugins.register(PluginId::Emergency, Arc::new(BrokenPlugin));

    let set = backend_set(&dir, plugins);
    let backend = set.dispatch(Policy::Plugin(PluginId::Emergency)).unwrap();

    assert!(matches!(backend.get(&key()), Err(PclError::Plugin(_))));
    assert!(matches!(backend.size(&key()), Err(PclError::Plugin(_))));
    assert!(matches!(backend.set(&key(), b"x"), Err(PclError::InvalidArgument(_))));
    assert!(matches!(backend.delete(&key()), Err(PclError::NoKey)));
}

#[test]
fn test_native_policies_dispatch() {
    let dir = TempDir::new().unwrap();
    let set = backend_set(&dir, Arc::new(PluginRegistry::new()));

    assert_eq!(set.dispatch(Policy::Cached).unwrap().name(), "cache");
    assert_eq!(set.dispatch(Policy::WriteThrough).unwrap().name(), "write-through");
}
