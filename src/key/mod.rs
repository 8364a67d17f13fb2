//! Key Access Module
//!
//! One-shot and handle-based key-value API.
//!
//! ## Read Path
//! 1. Resolve the reference (policy, scope, storage key)
//! 2. Read from the backend selected by the policy
//! 3. On a miss: configurable default → built-in default → `NoKey`
//!
//! ## Write Path
//! 1. Validate the value (non-empty, within the size limit)
//! 2. Resolve and write through the selected backend
//! 3. Notify callbacks of open handles observing the same storage key

mod manager;

use crate::resolver::ResolvedResource;

pub use manager::KeyAccessManager;

/// Record behind an open key handle
#[derive(Debug, Clone)]
pub struct KeyHandle {
    pub resolved: ResolvedResource,
}
