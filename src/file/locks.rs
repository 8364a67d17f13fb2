//! Striped resource locks
//!
//! Serializes backup, recovery and write steps on the same physical file,
//! and check-then-set steps on the same storage key, without a global lock.
//! Keys hash onto a fixed set of mutexes; unrelated keys may share a stripe,
//! which only costs concurrency.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::{Mutex, MutexGuard};

/// Default number of stripes
pub const DEFAULT_STRIPES: usize = 64;

pub struct ResourceLocks {
    stripes: Vec<Mutex<()>>,
}

impl ResourceLocks {
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Lock the stripe owning `key`
    pub fn lock<K: Hash + ?Sized>(&self, key: &K) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(key)].lock()
    }

    pub fn stripe_of<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

impl Default for ResourceLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}
