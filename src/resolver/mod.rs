//! Address Resolver Module
//!
//! Maps a resource reference onto its canonical storage location and access
//! policy.
//!
//! ## Responsibilities
//! - Look up the resource configuration entry (or fall back)
//! - Derive the access scope from logical database id, user and seat
//! - Produce the backend key and the physical file paths
//!
//! ## Layout
//! ```text
//! {root}/{mount}/{database}/{scope}/{name}
//!
//!   mount    : mnt-c (cached) | mnt-wt (write-through) | mnt-backup
//!   database : {app_id} | Shared/Public | Shared/Group/{ldbid:x}
//!   scope    : node | user/{user}/seat/{seat}
//! ```

mod address;
mod reference;
mod table;

pub use address::{AccessScope, AddressResolver, Database, ResolvedResource, StorageKey};
pub use reference::{ResourceReference, LDBID_LOCAL, LDBID_PUBLIC};
pub use table::{PluginId, Policy, ResourceConfigEntry, ResourceTable, ScopeKind};
