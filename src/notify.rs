//! Change notifications
//!
//! Observer registry keyed by resolved storage key. Callbacks are attached
//! to open key handles and invoked synchronously on the writer's thread.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::handle::Handle;
use crate::resolver::{ResourceReference, StorageKey};

/// What happened to the observed key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyStatus {
    Created,
    Changed,
    Deleted,
}

/// Payload handed to change callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub ldbid: u16,
    pub name: String,
    pub user: u32,
    pub seat: u32,
    pub status: NotifyStatus,
}

impl ChangeNotification {
    pub fn new(reference: &ResourceReference, status: NotifyStatus) -> Self {
        Self {
            ldbid: reference.ldbid,
            name: reference.name.clone(),
            user: reference.user,
            seat: reference.seat,
            status,
        }
    }
}

/// Change callback
pub type ChangeCallback = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;

struct Observer {
    handle: Handle,
    callback: ChangeCallback,
}

/// Registry of change callbacks
#[derive(Default)]
pub struct NotificationRegistry {
    observers: Mutex<HashMap<StorageKey, Vec<Observer>>>,
}

impl fmt::Debug for NotificationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationRegistry")
            .field("keys", &self.observers.lock().len())
            .finish()
    }
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `callback` to `handle`, replacing an earlier one
    pub fn register(&self, handle: Handle, key: StorageKey, callback: ChangeCallback) {
        let mut observers = self.observers.lock();
        let list = observers.entry(key).or_default();

        list.retain(|o| o.handle != handle);
        list.push(Observer { handle, callback });
    }

    /// Detach every callback of `handle`; returns true if one was attached
    pub fn unregister(&self, handle: Handle) -> bool {
        let mut observers = self.observers.lock();
        let mut removed = false;

        observers.retain(|_, list| {
            let before = list.len();
            list.retain(|o| o.handle != handle);
            removed |= list.len() != before;
            !list.is_empty()
        });

        removed
    }

    /// Invoke every callback observing `key`, returning how many ran
    ///
    /// Callbacks run after the registry lock is released, so they may call
    /// back into the library.
    pub fn notify(&self, key: &StorageKey, notification: &ChangeNotification) -> usize {
        let callbacks: Vec<ChangeCallback> = match self.observers.lock().get(key) {
            Some(list) => list.iter().map(|o| o.callback.clone()).collect(),
            None => return 0,
        };

        for callback in &callbacks {
            callback(notification);
        }

        tracing::trace!(key = %key, count = callbacks.len(), status = ?notification.status, "Change notified");
        callbacks.len()
    }

    /// Number of handles observing `key`
    pub fn observer_count(&self, key: &StorageKey) -> usize {
        self.observers.lock().get(key).map_or(0, |list| list.len())
    }

    pub fn clear(&self) {
        self.observers.lock().clear();
    }
}
