//! Key access manager
//!
//! Composes resolver, backends, defaults, handle table and notification
//! registry into the key API.

use std::sync::Arc;

use crate::backend::{BackendSet, StorageBackend};
use crate::defaults::DefaultValueProvider;
use crate::error::{PclError, Result};
use crate::file::ResourceLocks;
use crate::handle::{Handle, HandleRecord, HandleTable};
use crate::notify::{ChangeCallback, ChangeNotification, NotificationRegistry, NotifyStatus};
use crate::resolver::{AddressResolver, ResolvedResource, ResourceReference};

use super::KeyHandle;

/// Key API over one initialized library context
pub struct KeyAccessManager {
    resolver: Arc<AddressResolver>,
    backends: Arc<BackendSet>,
    defaults: Arc<DefaultValueProvider>,
    handles: Arc<HandleTable<HandleRecord>>,
    notifications: Arc<NotificationRegistry>,

    /// Held across the existence check and the store of a write or delete
    locks: ResourceLocks,

    /// Largest value accepted by writes
    max_value_size: usize,
}

impl KeyAccessManager {
    pub fn new(
        resolver: Arc<AddressResolver>,
        backends: Arc<BackendSet>,
        defaults: Arc<DefaultValueProvider>,
        handles: Arc<HandleTable<HandleRecord>>,
        notifications: Arc<NotificationRegistry>,
        max_value_size: usize,
    ) -> Self {
        Self {
            resolver,
            backends,
            defaults,
            handles,
            notifications,
            locks: ResourceLocks::default(),
            max_value_size,
        }
    }

    // =========================================================================
    // One-shot API
    // =========================================================================

    /// Read a value, falling back to defaults on a miss
    pub fn read_data(&self, reference: &ResourceReference) -> Result<Vec<u8>> {
        let resolved = self.resolver.resolve(reference)?;
        self.read_resolved(&resolved)
    }

    /// Write a value, returning the number of bytes written
    pub fn write_data(&self, reference: &ResourceReference, data: &[u8]) -> Result<usize> {
        self.check_value(data)?;
        let resolved = self.resolver.resolve(reference)?;
        self.write_resolved(&resolved, reference, data)
    }

    /// Delete a value (`NoKey` if absent)
    pub fn delete_data(&self, reference: &ResourceReference) -> Result<()> {
        let resolved = self.resolver.resolve(reference)?;
        let key = resolved.storage_key();
        let backend = self.backend(&resolved)?;

        {
            let _guard = self.locks.lock(&key);
            backend.delete(&key)?;
        }

        self.notifications.notify(
            &key,
            &ChangeNotification::new(reference, NotifyStatus::Deleted),
        );
        Ok(())
    }

    /// Size of a stored value (`NoKey` if absent)
    pub fn get_size(&self, reference: &ResourceReference) -> Result<usize> {
        let resolved = self.resolver.resolve(reference)?;
        self.backend(&resolved)?.size(&resolved.storage_key())
    }

    // =========================================================================
    // Handle API
    // =========================================================================

    /// Open a key handle; no data is read
    pub fn handle_open(&self, reference: &ResourceReference) -> Result<Handle> {
        let resolved = self.resolver.resolve(reference)?;
        let handle = self
            .handles
            .open(HandleRecord::Key(Arc::new(KeyHandle { resolved })))?;

        tracing::debug!(handle, resource = %reference, "Key handle opened");
        Ok(handle)
    }

    /// Read at most `max_len` bytes of the value behind `handle`
    pub fn handle_read(&self, handle: Handle, max_len: usize) -> Result<Vec<u8>> {
        let key_handle = self.key_handle(handle)?;
        if max_len == 0 {
            return Err(PclError::invalid("Read buffer length is zero"));
        }

        let mut value = self.read_resolved(&key_handle.resolved)?;
        value.truncate(max_len);
        Ok(value)
    }

    /// Write the value behind `handle`
    pub fn handle_write(&self, handle: Handle, data: &[u8]) -> Result<usize> {
        let key_handle = self.key_handle(handle)?;
        self.check_value(data)?;

        let resolved = &key_handle.resolved;
        self.write_resolved(resolved, &resolved.reference, data)
    }

    /// Size of the value behind `handle`
    pub fn handle_get_size(&self, handle: Handle) -> Result<usize> {
        let key_handle = self.key_handle(handle)?;
        let resolved = &key_handle.resolved;
        self.backend(resolved)?.size(&resolved.storage_key())
    }

    /// Attach a change callback to `handle`
    pub fn handle_register_notify(&self, handle: Handle, callback: ChangeCallback) -> Result<()> {
        let key_handle = self.key_handle(handle)?;
        self.notifications
            .register(handle, key_handle.resolved.storage_key(), callback);

        tracing::debug!(handle, key = %key_handle.resolved.storage_key(), "Change callback registered");
        Ok(())
    }

    /// Detach the change callback of `handle`; returns true if one was attached
    pub fn handle_unregister_notify(&self, handle: Handle) -> Result<bool> {
        self.key_handle(handle)?;
        Ok(self.notifications.unregister(handle))
    }

    /// Drop per-handle state of a key handle that was just closed
    pub fn release(&self, handle: Handle, key_handle: &KeyHandle) {
        self.notifications.unregister(handle);
        tracing::debug!(handle, resource = %key_handle.resolved.reference, "Key handle closed");
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn key_handle(&self, handle: Handle) -> Result<Arc<KeyHandle>> {
        match self.handles.get(handle)? {
            HandleRecord::Key(key_handle) => Ok(key_handle),
            _ => Err(PclError::InvalidHandle),
        }
    }

    fn backend(&self, resolved: &ResolvedResource) -> Result<Arc<dyn StorageBackend>> {
        self.backends.dispatch(resolved.policy)
    }

    fn check_value(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(PclError::invalid("Write buffer is empty"));
        }
        if data.len() > self.max_value_size {
            return Err(PclError::invalid(format!(
                "Value of {} bytes exceeds limit of {}",
                data.len(),
                self.max_value_size
            )));
        }
        Ok(())
    }

    fn read_resolved(&self, resolved: &ResolvedResource) -> Result<Vec<u8>> {
        let key = resolved.storage_key();

        match self.backend(resolved)?.get(&key) {
            Err(PclError::NoKey) => match self.defaults.lookup(resolved) {
                Some((source, value)) => {
                    tracing::debug!(key = %key, ?source, "Serving default value");
                    Ok(value)
                }
                None => Err(PclError::NoKey),
            },
            other => other,
        }
    }

    fn write_resolved(
        &self,
        resolved: &ResolvedResource,
        reference: &ResourceReference,
        data: &[u8],
    ) -> Result<usize> {
        let key = resolved.storage_key();
        let backend = self.backend(resolved)?;

        let (status, written) = {
            let _guard = self.locks.lock(&key);
            let status = if backend.contains(&key)? {
                NotifyStatus::Changed
            } else {
                NotifyStatus::Created
            };
            (status, backend.set(&key, data)?)
        };

        self.notifications
            .notify(&key, &ChangeNotification::new(reference, status));
        Ok(written)
    }
}
