//! Client Module
//!
//! The library context and its `init`/`deinit` lifecycle.
//!
//! ## Responsibilities
//! - Build the per-application context on the first `init`
//! - Reference-count `init`/`deinit`
//! - Route every key and file call to the live context
//! - Close handles of any kind
//! - Tear down on the last `deinit` (handles, sessions, sync, cache)

use std::fs;
use std::io::SeekFrom;
use std::ops::BitOr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{BackendSet, CacheBackend, PluginRegistry, StorageBackend, WriteThroughBackend};
use crate::config::Config;
use crate::defaults::DefaultValueProvider;
use crate::error::{PclError, Result};
use crate::file::{AccessMode, CreatedPath, FileResourceManager, MappedRegion};
use crate::handle::{Handle, HandleRecord, HandleTable};
use crate::key::KeyAccessManager;
use crate::notify::{ChangeNotification, NotificationRegistry};
use crate::resolver::{AddressResolver, PluginId, ResourceReference, ResourceTable};

/// Shutdown behaviour registered at `init`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownFlags(u32);

impl ShutdownFlags {
    pub const NONE: ShutdownFlags = ShutdownFlags(0);
    pub const FAST: ShutdownFlags = ShutdownFlags(0x1);
    pub const NORMAL: ShutdownFlags = ShutdownFlags(0x2);

    pub fn contains(self, other: ShutdownFlags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// True if the write-through store is synced at the last `deinit`
    pub fn syncs_on_deinit(self) -> bool {
        self.contains(Self::FAST) || self.contains(Self::NORMAL)
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for ShutdownFlags {
    type Output = ShutdownFlags;

    fn bitor(self, rhs: ShutdownFlags) -> ShutdownFlags {
        ShutdownFlags(self.0 | rhs.0)
    }
}

/// Result of a successful `init`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Fresh,
    AlreadyInitialized,
}

impl InitStatus {
    pub fn code(self) -> i32 {
        match self {
            InitStatus::Fresh => 0,
            InitStatus::AlreadyInitialized => 1,
        }
    }
}

/// Everything that lives between the first `init` and the last `deinit`
struct Context {
    app_id: String,
    shutdown_flags: ShutdownFlags,
    handles: Arc<HandleTable<HandleRecord>>,
    backends: Arc<BackendSet>,
    notifications: Arc<NotificationRegistry>,
    keys: KeyAccessManager,
    files: FileResourceManager,
}

impl Context {
    const RESOURCE_TABLE_FILE: &'static str = "resource-table.json";

    /// Build a context
    ///
    /// Steps:
    /// 1. Create the root and the application's cache directory
    /// 2. Load the resource table (config entries + JSON file)
    /// 3. Load default values
    /// 4. Set up backends, handle table and notification registry
    fn open(
        config: &Config,
        app_id: &str,
        shutdown: ShutdownFlags,
        plugins: Arc<PluginRegistry>,
    ) -> Result<Self> {
        if config.max_handles < 2 {
            return Err(PclError::Config(format!(
                "max_handles must be at least 2, got {}",
                config.max_handles
            )));
        }

        let root = &config.root_dir;
        let app_dir = root.join(AddressResolver::CACHE_MOUNT).join(app_id);
        fs::create_dir_all(&app_dir)?;

        let mut entries = config.resource_entries.clone();
        let table_path = app_dir.join(Self::RESOURCE_TABLE_FILE);
        if table_path.exists() {
            entries.extend(ResourceTable::load_json(&table_path)?);
        }
        let table = ResourceTable::from_entries(entries)?;
        tracing::debug!(entries = table.len(), "Resource table loaded");

        let resolver = Arc::new(AddressResolver::new(
            root.clone(),
            app_id,
            table,
            config.fallback_policy,
        ));
        let defaults = Arc::new(DefaultValueProvider::load(
            config,
            &root.join(AddressResolver::CACHE_MOUNT),
            app_id,
        )?);

        let write_through = WriteThroughBackend::new(
            root.join(AddressResolver::WRITE_THROUGH_MOUNT),
            config.write_through_sync,
            config.wt_compaction_min_bytes,
        );
        let backends = Arc::new(BackendSet::new(
            Arc::new(CacheBackend::new()),
            Arc::new(write_through),
            plugins,
        ));

        let handles = Arc::new(HandleTable::new(config.max_handles));
        let notifications = Arc::new(NotificationRegistry::new());

        let keys = KeyAccessManager::new(
            resolver.clone(),
            backends.clone(),
            defaults,
            handles.clone(),
            notifications.clone(),
            config.max_key_value_size,
        );
        let files = FileResourceManager::new(resolver, handles.clone());

        Ok(Self {
            app_id: app_id.to_string(),
            shutdown_flags: shutdown,
            handles,
            backends,
            notifications,
            keys,
            files,
        })
    }

    /// Close a handle of any kind
    fn close_handle(&self, handle: Handle) -> Result<()> {
        let record = self.handles.close(handle)?;
        tracing::trace!(handle, kind = ?record.kind(), "Closing handle");
        self.release(handle, record)
    }

    fn release(&self, handle: Handle, record: HandleRecord) -> Result<()> {
        match record {
            HandleRecord::Key(key_handle) => {
                self.keys.release(handle, &key_handle);
                Ok(())
            }
            HandleRecord::File(file_handle) => self.files.release(handle, &file_handle),
            HandleRecord::Path(path_handle) => {
                tracing::debug!(handle, path = %path_handle.path.display(), "Path released");
                Ok(())
            }
        }
    }

    /// Tear down after the last `deinit`
    ///
    /// Every step runs even if an earlier one failed; the first error wins.
    fn shutdown(&self) -> Result<()> {
        let mut first_error = None;

        for (handle, record) in self.handles.drain() {
            if let Err(e) = self.release(handle, record) {
                tracing::warn!(handle, "Failed to close handle at shutdown: {}", e);
                first_error.get_or_insert(e);
            }
        }
        self.files.end_all_sessions();
        self.notifications.clear();

        if self.shutdown_flags.syncs_on_deinit() {
            if let Err(e) = self.backends.sync_all() {
                tracing::warn!("Failed to sync backends at shutdown: {}", e);
                first_error.get_or_insert(e);
            }
        }
        self.backends.cache().clear();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct LifecycleState {
    context: Option<Arc<Context>>,
    init_count: usize,
}

/// Persistence client
///
/// One instance per process is the usual setup; instances are independent
/// of each other.
///
/// ## Concurrency:
/// - `state`: RwLock; calls take the read lock just long enough to clone the
///   context, `init`/`deinit` take the write lock
/// - `plugins`: survives `init`/`deinit` cycles
pub struct PersistenceClient {
    config: Config,
    plugins: Arc<PluginRegistry>,
    state: RwLock<LifecycleState>,
}

impl PersistenceClient {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            plugins: Arc::new(PluginRegistry::new()),
            state: RwLock::new(LifecycleState {
                context: None,
                init_count: 0,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initialize the library for `app_id`
    ///
    /// Repeated calls only bump the reference count.
    pub fn init(&self, app_id: &str, shutdown: ShutdownFlags) -> Result<InitStatus> {
        let mut state = self.state.write();

        if let Some(context) = &state.context {
            if context.app_id != app_id {
                tracing::warn!(
                    active = %context.app_id,
                    requested = app_id,
                    "Already initialized for another application"
                );
            }
            state.init_count += 1;
            return Ok(InitStatus::AlreadyInitialized);
        }

        if app_id.is_empty() || app_id.contains('/') || app_id == "." || app_id == ".." {
            return Err(PclError::invalid(format!("Invalid application id: {:?}", app_id)));
        }

        let context = Context::open(&self.config, app_id, shutdown, self.plugins.clone())?;
        state.context = Some(Arc::new(context));
        state.init_count = 1;

        tracing::info!(
            app_id,
            root = %self.config.root_dir.display(),
            shutdown = shutdown.bits(),
            "Persistence client initialized"
        );
        Ok(InitStatus::Fresh)
    }

    /// Drop one reference; the last one tears the context down
    pub fn deinit(&self) -> Result<()> {
        let mut state = self.state.write();

        if state.context.is_none() {
            return Err(PclError::NotInitialized("deinit without init".to_string()));
        }

        state.init_count -= 1;
        if state.init_count > 0 {
            return Ok(());
        }

        let context = match state.context.take() {
            Some(context) => context,
            None => return Ok(()),
        };
        let result = context.shutdown();

        tracing::info!(app_id = %context.app_id, "Persistence client deinitialized");
        result
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().context.is_some()
    }

    /// Application id of the live context
    pub fn app_id(&self) -> Option<String> {
        self.state.read().context.as_ref().map(|c| c.app_id.clone())
    }

    /// Number of handles currently open (0 when uninitialized)
    pub fn open_handle_count(&self) -> usize {
        self.state
            .read()
            .context
            .as_ref()
            .map_or(0, |c| c.handles.open_count())
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// Register a storage provider for `id`, replacing any earlier one
    pub fn register_plugin(&self, id: PluginId, provider: Arc<dyn StorageBackend>) {
        self.plugins.register(id, provider);
    }

    pub fn unregister_plugin(&self, id: PluginId) -> bool {
        self.plugins.unregister(id).is_some()
    }

    // =========================================================================
    // Key API
    // =========================================================================

    pub fn key_read_data(&self, reference: &ResourceReference) -> Result<Vec<u8>> {
        self.context()?.keys.read_data(reference)
    }

    pub fn key_write_data(&self, reference: &ResourceReference, data: &[u8]) -> Result<usize> {
        self.context()?.keys.write_data(reference, data)
    }

    pub fn key_delete(&self, reference: &ResourceReference) -> Result<()> {
        self.context()?.keys.delete_data(reference)
    }

    pub fn key_get_size(&self, reference: &ResourceReference) -> Result<usize> {
        self.context()?.keys.get_size(reference)
    }

    pub fn key_handle_open(&self, reference: &ResourceReference) -> Result<Handle> {
        self.context()?.keys.handle_open(reference)
    }

    pub fn key_handle_read_data(&self, handle: Handle, max_len: usize) -> Result<Vec<u8>> {
        self.context()?.keys.handle_read(handle, max_len)
    }

    pub fn key_handle_write_data(&self, handle: Handle, data: &[u8]) -> Result<usize> {
        self.context()?.keys.handle_write(handle, data)
    }

    pub fn key_handle_get_size(&self, handle: Handle) -> Result<usize> {
        self.context()?.keys.handle_get_size(handle)
    }

    /// Close a handle; works for key, file and path handles alike
    pub fn key_handle_close(&self, handle: Handle) -> Result<()> {
        self.context()?.close_handle(handle)
    }

    /// Attach a change callback to an open key handle
    pub fn key_handle_register_notify<F>(&self, handle: Handle, callback: F) -> Result<()>
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        self.context()?
            .keys
            .handle_register_notify(handle, Arc::new(callback))
    }

    pub fn key_handle_unregister_notify(&self, handle: Handle) -> Result<bool> {
        self.context()?.keys.handle_unregister_notify(handle)
    }

    // =========================================================================
    // File API
    // =========================================================================

    pub fn file_open(&self, reference: &ResourceReference, mode: AccessMode) -> Result<Handle> {
        self.context()?.files.open(reference, mode)
    }

    pub fn file_read_data(&self, handle: Handle, max_len: usize) -> Result<Vec<u8>> {
        self.context()?.files.read(handle, max_len)
    }

    pub fn file_write_data(&self, handle: Handle, data: &[u8]) -> Result<usize> {
        self.context()?.files.write(handle, data)
    }

    pub fn file_seek(&self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        self.context()?.files.seek(handle, pos)
    }

    /// Set the length of an open read-write file
    pub fn file_truncate(&self, handle: Handle, len: u64) -> Result<()> {
        self.context()?.files.truncate(handle, len)
    }

    /// Size of an open file; 0 for a bad handle or when uninitialized
    pub fn file_get_size(&self, handle: Handle) -> u64 {
        match self.context() {
            Ok(context) => context.files.get_size(handle),
            Err(_) => 0,
        }
    }

    /// Close a handle; works for key, file and path handles alike
    pub fn file_close(&self, handle: Handle) -> Result<()> {
        self.context()?.close_handle(handle)
    }

    pub fn file_remove(&self, reference: &ResourceReference) -> Result<()> {
        self.context()?.files.remove(reference)
    }

    pub fn file_map_region(&self, handle: Handle) -> Result<MappedRegion> {
        self.context()?.files.map_region(handle)
    }

    pub fn file_unmap_region(&self, region: MappedRegion) -> Result<()> {
        self.context()?.files.unmap_region(region)
    }

    pub fn file_create_path(&self, reference: &ResourceReference) -> Result<CreatedPath> {
        self.context()?.files.create_path(reference)
    }

    pub fn file_release_path(&self, handle: Handle) -> Result<()> {
        self.context()?.close_handle(handle)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn context(&self) -> Result<Arc<Context>> {
        self.state
            .read()
            .context
            .clone()
            .ok_or_else(|| PclError::NotInitialized("call init first".to_string()))
    }
}

impl Drop for PersistenceClient {
    fn drop(&mut self) {
        let context = self.state.get_mut().context.take();
        if let Some(context) = context {
            if let Err(e) = context.shutdown() {
                tracing::warn!("Shutdown on drop failed: {}", e);
            }
        }
    }
}
