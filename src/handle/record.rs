//! Handle records
//!
//! Key, file and path handles share one id space; the slot stores a tagged
//! variant so close and validate work on any kind.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::file::{FileHandle, PathHandle};
use crate::key::KeyHandle;

/// Kind of resource a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Key,
    File,
    Path,
}

/// Record stored in a handle table slot
#[derive(Clone)]
pub enum HandleRecord {
    Key(Arc<KeyHandle>),
    File(Arc<Mutex<FileHandle>>),
    Path(Arc<PathHandle>),
}

impl HandleRecord {
    pub fn kind(&self) -> HandleKind {
        match self {
            HandleRecord::Key(_) => HandleKind::Key,
            HandleRecord::File(_) => HandleKind::File,
            HandleRecord::Path(_) => HandleKind::Path,
        }
    }
}
