//! File Access Module
//!
//! File-oriented resources with crash recovery.
//!
//! ## Responsibilities
//! - Open/read/write/seek/size/close/remove physical files
//! - Capture a backup triple on the first write of each handle
//! - Recover interrupted sessions on open and path creation
//! - Map whole files into memory and hand out physical paths
//!
//! ## Modification Session
//! ```text
//!   open(rw) ──► first write ──► capture backup + crc
//!                    │
//!                    ▼
//!              writes to primary (each new writer recaptures, then joins)
//!                    │
//!                    ▼
//!   last writer closes cleanly ──► discard backup + crc
//! ```
//! A crash anywhere in between leaves the backup and checksum behind; the
//! next open restores the primary from them.

mod backup;
mod locks;
mod manager;

use std::fs::File;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use memmap2::Mmap;

use crate::handle::Handle;
use crate::resolver::ResolvedResource;

pub use backup::{BackupTriple, RecoveryOutcome};
pub use locks::{ResourceLocks, DEFAULT_STRIPES};
pub use manager::FileResourceManager;

/// How a file handle may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Record behind an open file handle
#[derive(Debug)]
pub struct FileHandle {
    pub resolved: ResolvedResource,
    pub triple: BackupTriple,
    pub mode: AccessMode,

    file: File,

    /// True once this handle has joined the modification session
    in_session: bool,
}

/// Record behind a handle obtained from `create_path`
#[derive(Debug, Clone)]
pub struct PathHandle {
    pub resolved: ResolvedResource,
    pub path: PathBuf,
}

/// Physical path handed out by `create_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPath {
    pub handle: Handle,
    pub path: PathBuf,
}

/// Read-only memory mapping of a whole file
///
/// The mapping shares the page cache with the file, so writes made through
/// the owning handle show up in the region. Its length is fixed at the
/// file size when it was mapped. An empty file maps to an empty region.
/// While any region of a file is alive, the file cannot be shrunk.
#[derive(Debug)]
pub struct MappedRegion {
    handle: Handle,
    map: Option<Mmap>,

    /// Shared by all live regions of the same file
    _live: Arc<()>,
}

impl MappedRegion {
    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}
