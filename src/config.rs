//! Configuration for the persistence client library
//!
//! Centralized configuration with sensible defaults.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::resolver::{Policy, ResourceConfigEntry};

/// Main configuration for a PCL instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all persistence data
    /// Internal structure:
    ///   {root_dir}/
    ///     ├── mnt-c/{db}/          (cached resources, table and default files)
    ///     ├── mnt-wt/{db}/         (write-through resources, wt.kvlog)
    ///     └── mnt-backup/{db}/     (backup triples of file resources)
    pub root_dir: PathBuf,

    /// Sync strategy for the write-through store
    pub write_through_sync: WriteThroughSync,

    /// Dead bytes a write-through log must accumulate before compaction
    pub wt_compaction_min_bytes: u64,

    /// Largest value accepted by the key API (in bytes)
    pub max_key_value_size: usize,

    // -------------------------------------------------------------------------
    // Handle Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the shared handle table
    pub max_handles: usize,

    // -------------------------------------------------------------------------
    // Resolution Configuration
    // -------------------------------------------------------------------------
    /// Policy applied to resources without a configuration entry
    pub fallback_policy: Policy,

    /// Resource configuration entries supplied in code
    pub resource_entries: Vec<ResourceConfigEntry>,

    /// Built-in default values, keyed by resource name
    pub builtin_defaults: HashMap<String, Vec<u8>>,

    /// Configurable default values, keyed by resource name
    pub configurable_defaults: HashMap<String, Vec<u8>>,
}

/// Write-through sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteThroughSync {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// Leave flushing to the OS until deinit
    OnDeinit,
}

/// Default handle table capacity
pub const DEFAULT_MAX_HANDLES: usize = 256;

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./pcl_data"),
            write_through_sync: WriteThroughSync::EveryWrite,
            wt_compaction_min_bytes: 64 * 1024, // 64 KB
            max_key_value_size: 16 * 1024,      // 16 KB
            max_handles: DEFAULT_MAX_HANDLES,
            fallback_policy: Policy::Cached,
            resource_entries: Vec::new(),
            builtin_defaults: HashMap::new(),
            configurable_defaults: HashMap::new(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the root directory for all persistence data
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = path.into();
        self
    }

    /// Set the write-through sync strategy
    pub fn write_through_sync(mut self, sync: WriteThroughSync) -> Self {
        self.config.write_through_sync = sync;
        self
    }

    /// Set the dead-byte threshold for write-through compaction
    pub fn wt_compaction_min_bytes(mut self, bytes: u64) -> Self {
        self.config.wt_compaction_min_bytes = bytes;
        self
    }

    /// Set the largest value accepted by the key API
    pub fn max_key_value_size(mut self, size: usize) -> Self {
        self.config.max_key_value_size = size;
        self
    }

    /// Set the handle table capacity
    pub fn max_handles(mut self, count: usize) -> Self {
        self.config.max_handles = count;
        self
    }

    /// Set the policy for resources without a configuration entry
    pub fn fallback_policy(mut self, policy: Policy) -> Self {
        self.config.fallback_policy = policy;
        self
    }

    /// Add a resource configuration entry
    pub fn resource_entry(mut self, entry: ResourceConfigEntry) -> Self {
        self.config.resource_entries.push(entry);
        self
    }

    /// Add a built-in default value
    pub fn builtin_default(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.config.builtin_defaults.insert(name.into(), value.into());
        self
    }

    /// Add a configurable default value
    pub fn configurable_default(
        mut self,
        name: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.config
            .configurable_defaults
            .insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
