//! # PCL
//!
//! Persistence client library: a uniform API for reading and writing small
//! configuration values (keys) and larger blobs (files) on behalf of
//! applications, with:
//! - Per-resource storage policy (cached, write-through, plugin)
//! - Public, user/seat and group scoping
//! - A shared handle table for key, file and path handles
//! - Default values for keys that were never written
//! - Backup + checksum recovery for interrupted file modifications
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PersistenceClient                         │
//! │               (init / deinit, key + file API)                │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │                               │
//!                ▼                               ▼
//!      ┌──────────────────┐            ┌──────────────────┐
//!      │ KeyAccessManager │            │FileResourceManager│
//!      │ defaults, notify │            │ backup + recovery │
//!      └────────┬─────────┘            └────────┬─────────┘
//!               │      ┌─────────────────┐      │
//!               ├─────►│ AddressResolver │◄─────┤
//!               │      └─────────────────┘      │
//!               │      ┌─────────────────┐      │
//!               ├─────►│   HandleTable   │◄─────┘
//!               │      └─────────────────┘
//!               ▼
//!   ┌──────────┬───────────────┬──────────┐
//!   │  Cache   │ Write-Through │ Plugins  │
//!   │ (memory) │  (wt.kvlog)   │(external)│
//!   └──────────┴───────────────┴──────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod resolver;
pub mod handle;
pub mod backend;
pub mod defaults;
pub mod notify;
pub mod key;
pub mod file;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{status, PclError, Result};
pub use config::{Config, WriteThroughSync};
pub use client::{InitStatus, PersistenceClient, ShutdownFlags};
pub use resolver::{PluginId, Policy, ResourceConfigEntry, ResourceReference, ScopeKind};
pub use handle::Handle;
pub use backend::{StorageBackend, StorageKey};
pub use notify::{ChangeNotification, NotifyStatus};
pub use file::{AccessMode, CreatedPath, MappedRegion};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
