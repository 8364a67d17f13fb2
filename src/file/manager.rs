//! File resource manager
//!
//! Lock order: path stripe, then the handle's own mutex. The handle table
//! lock is never held across file I/O.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use memmap2::Mmap;
use parking_lot::Mutex;

use crate::error::{PclError, Result};
use crate::handle::{Handle, HandleRecord, HandleTable};
use crate::resolver::{AddressResolver, Policy, ResourceReference};

use super::{
    AccessMode, BackupTriple, CreatedPath, FileHandle, MappedRegion, PathHandle, RecoveryOutcome,
    ResourceLocks,
};

/// File API over one initialized library context
pub struct FileResourceManager {
    resolver: Arc<AddressResolver>,
    handles: Arc<HandleTable<HandleRecord>>,
    locks: ResourceLocks,

    /// Primary path → number of handles in its modification session
    sessions: Mutex<HashMap<PathBuf, usize>>,

    /// Primary path → token held by every live region of that file
    mapped: Mutex<HashMap<PathBuf, Weak<()>>>,
}

impl FileResourceManager {
    pub fn new(resolver: Arc<AddressResolver>, handles: Arc<HandleTable<HandleRecord>>) -> Self {
        Self {
            resolver,
            handles,
            locks: ResourceLocks::default(),
            sessions: Mutex::new(HashMap::new()),
            mapped: Mutex::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Open / Close
    // =========================================================================

    /// Open a file resource, recovering an interrupted session first
    ///
    /// `ReadWrite` creates the primary (and its directories) if needed;
    /// `ReadOnly` on a missing primary fails with `NoKey`.
    pub fn open(&self, reference: &ResourceReference, mode: AccessMode) -> Result<Handle> {
        let resolved = self.resolver.resolve(reference)?;
        let primary = self.resolver.primary_path(&resolved)?;
        let triple = BackupTriple::new(primary.clone(), self.resolver.backup_path(&resolved));

        let file = {
            let _guard = self.locks.lock(&primary);
            self.recover(&triple);

            match mode {
                AccessMode::ReadWrite => {
                    if let Some(parent) = primary.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create(true)
                        .truncate(false)
                        .open(&primary)?
                }
                AccessMode::ReadOnly => match File::open(&primary) {
                    Ok(file) => file,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(PclError::NoKey),
                    Err(e) => return Err(e.into()),
                },
            }
        };

        let handle = self.handles.open(HandleRecord::File(Arc::new(Mutex::new(FileHandle {
            resolved,
            triple,
            mode,
            file,
            in_session: false,
        }))))?;

        tracing::debug!(handle, path = %primary.display(), ?mode, "File opened");
        Ok(handle)
    }

    /// Finish a file handle that was just removed from the table
    ///
    /// Flushes the primary and leaves the modification session. The backup
    /// is discarded only when the last writer leaves and the flush worked.
    pub fn release(&self, handle: Handle, file_handle: &Mutex<FileHandle>) -> Result<()> {
        let primary = file_handle.lock().triple.primary.clone();
        let _guard = self.locks.lock(&primary);
        let mut fh = file_handle.lock();

        let flushed = match fh.mode {
            AccessMode::ReadWrite => fh.file.sync_all(),
            AccessMode::ReadOnly => Ok(()),
        };

        if fh.in_session {
            fh.in_session = false;
            self.leave_session(&fh.triple, flushed.is_ok());
        }

        tracing::debug!(handle, path = %primary.display(), "File closed");
        flushed.map_err(PclError::from)
    }

    // =========================================================================
    // Data Access
    // =========================================================================

    /// Read up to `max_len` bytes at the current position
    pub fn read(&self, handle: Handle, max_len: usize) -> Result<Vec<u8>> {
        let file_handle = self.file_handle(handle)?;
        if max_len == 0 {
            return Err(PclError::invalid("Read buffer length is zero"));
        }

        let primary = file_handle.lock().triple.primary.clone();
        let _guard = self.locks.lock(&primary);
        let mut fh = file_handle.lock();

        let mut buf = Vec::with_capacity(max_len.min(64 * 1024));
        Read::take(&mut fh.file, max_len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Write at the current position
    ///
    /// The first write of a handle captures the backup triple and joins the
    /// modification session.
    pub fn write(&self, handle: Handle, data: &[u8]) -> Result<usize> {
        let file_handle = self.file_handle(handle)?;
        if data.is_empty() {
            return Err(PclError::invalid("Write buffer is empty"));
        }

        let primary = file_handle.lock().triple.primary.clone();
        let _guard = self.locks.lock(&primary);
        let mut fh = file_handle.lock();

        if fh.mode == AccessMode::ReadOnly {
            return Err(PclError::invalid("File handle is read-only"));
        }

        if !fh.in_session {
            self.join_session(&fh.triple)?;
            fh.in_session = true;
        }

        fh.file.write_all(data)?;
        if fh.resolved.policy == Policy::WriteThrough {
            fh.file.sync_data()?;
        }

        Ok(data.len())
    }

    /// Set the file length, following the same backup steps as `write`
    ///
    /// Shrinking a file that has live mapped regions is refused.
    pub fn truncate(&self, handle: Handle, len: u64) -> Result<()> {
        let file_handle = self.file_handle(handle)?;

        let primary = file_handle.lock().triple.primary.clone();
        let _guard = self.locks.lock(&primary);
        let mut fh = file_handle.lock();

        if fh.mode == AccessMode::ReadOnly {
            return Err(PclError::invalid("File handle is read-only"));
        }
        if len < fh.file.metadata()?.len() && self.has_regions(&primary) {
            return Err(PclError::invalid("File has mapped regions"));
        }

        if !fh.in_session {
            self.join_session(&fh.triple)?;
            fh.in_session = true;
        }

        fh.file.set_len(len)?;
        if fh.resolved.policy == Policy::WriteThrough {
            fh.file.sync_data()?;
        }

        tracing::debug!(handle, len, "File truncated");
        Ok(())
    }

    /// Move the position of a file handle, returning the new offset
    pub fn seek(&self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        let file_handle = self.file_handle(handle)?;
        let mut fh = file_handle.lock();
        Ok(fh.file.seek(pos)?)
    }

    /// Current size of the file behind `handle`; 0 for any bad handle
    pub fn get_size(&self, handle: Handle) -> u64 {
        let file_handle = match self.file_handle(handle) {
            Ok(file_handle) => file_handle,
            Err(e) => {
                tracing::debug!(handle, "Size of unusable file handle: {}", e);
                return 0;
            }
        };

        let fh = file_handle.lock();
        fh.file.metadata().map(|meta| meta.len()).unwrap_or(0)
    }

    /// Map the whole file behind `handle` into memory
    ///
    /// The handle's position is untouched.
    pub fn map_region(&self, handle: Handle) -> Result<MappedRegion> {
        let file_handle = self.file_handle(handle)?;

        let primary = file_handle.lock().triple.primary.clone();
        let _guard = self.locks.lock(&primary);
        let fh = file_handle.lock();

        let len = fh.file.metadata()?.len();
        let map = if len == 0 {
            None
        } else {
            // SAFETY: the mapping is read-only. Shrinking a primary from
            // outside the library while it is mapped breaks the file contract.
            Some(unsafe { Mmap::map(&fh.file)? })
        };

        let live = {
            let mut mapped = self.mapped.lock();
            match mapped.get(&primary).and_then(Weak::upgrade) {
                Some(live) => live,
                None => {
                    let live = Arc::new(());
                    mapped.insert(primary.clone(), Arc::downgrade(&live));
                    live
                }
            }
        };

        tracing::trace!(handle, bytes = len, "Region mapped");
        Ok(MappedRegion {
            handle,
            map,
            _live: live,
        })
    }

    /// Release a region obtained from `map_region`
    ///
    /// The mapping is dropped even when the handle turns out to be invalid.
    pub fn unmap_region(&self, region: MappedRegion) -> Result<()> {
        self.handles.validate(region.handle())?;
        tracing::trace!(handle = region.handle(), bytes = region.len(), "Region unmapped");
        drop(region);
        Ok(())
    }

    // =========================================================================
    // Whole-Resource Operations
    // =========================================================================

    /// Delete the primary and any leftover backup triple
    pub fn remove(&self, reference: &ResourceReference) -> Result<()> {
        let resolved = self.resolver.resolve(reference)?;
        let primary = self.resolver.primary_path(&resolved)?;
        let triple = BackupTriple::new(primary.clone(), self.resolver.backup_path(&resolved));

        let _guard = self.locks.lock(&primary);
        match fs::remove_file(&primary) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(PclError::NoKey),
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = triple.discard() {
            tracing::warn!(path = %primary.display(), "Failed to discard backup: {}", e);
        }

        tracing::debug!(path = %primary.display(), "File removed");
        Ok(())
    }

    /// Resolve the physical path of a file resource for direct access
    ///
    /// Parent directories are created and an interrupted session is
    /// recovered, so the caller always sees a consistent primary.
    pub fn create_path(&self, reference: &ResourceReference) -> Result<CreatedPath> {
        let resolved = self.resolver.resolve(reference)?;
        let primary = self.resolver.primary_path(&resolved)?;
        let triple = BackupTriple::new(primary.clone(), self.resolver.backup_path(&resolved));

        {
            let _guard = self.locks.lock(&primary);
            if let Some(parent) = primary.parent() {
                fs::create_dir_all(parent)?;
            }
            self.recover(&triple);
        }

        let handle = self.handles.open(HandleRecord::Path(Arc::new(PathHandle {
            resolved,
            path: primary.clone(),
        })))?;

        tracing::debug!(handle, path = %primary.display(), "Path created");
        Ok(CreatedPath {
            handle,
            path: primary,
        })
    }

    /// Number of primaries with a modification session in progress
    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Forget sessions still registered at shutdown
    ///
    /// Their backups stay on disk and are recovered by the next open.
    pub fn end_all_sessions(&self) {
        for (primary, writers) in self.sessions.lock().drain() {
            tracing::warn!(path = %primary.display(), writers, "Session still open at shutdown");
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn file_handle(&self, handle: Handle) -> Result<Arc<Mutex<FileHandle>>> {
        match self.handles.get(handle)? {
            HandleRecord::File(file_handle) => Ok(file_handle),
            _ => Err(PclError::InvalidHandle),
        }
    }

    fn has_regions(&self, primary: &Path) -> bool {
        self.mapped
            .lock()
            .get(primary)
            .map_or(false, |live| live.strong_count() > 0)
    }

    /// Run recovery unless a session on the primary is in progress
    ///
    /// Caller holds the path stripe. Never fails: problems are logged and
    /// the primary is served as found.
    fn recover(&self, triple: &BackupTriple) {
        if self.sessions.lock().contains_key(&triple.primary) {
            return;
        }

        match triple.recover() {
            Ok(RecoveryOutcome::NotNeeded) | Ok(RecoveryOutcome::NoBackup) => {}
            Ok(RecoveryOutcome::Restored { bytes }) => {
                tracing::info!(
                    path = %triple.primary.display(),
                    bytes,
                    "Restored file from backup"
                );
            }
            Ok(RecoveryOutcome::ChecksumMismatch { expected, actual }) => {
                tracing::warn!(
                    path = %triple.primary.display(),
                    expected = %format!("{:08x}", expected),
                    actual = %format!("{:08x}", actual),
                    "Backup checksum mismatch, keeping primary"
                );
            }
            Err(e) => {
                tracing::warn!(path = %triple.primary.display(), "Recovery failed: {}", e);
            }
        }
    }

    /// Capture the primary as it is now and count the handle as a writer
    ///
    /// Caller holds the path stripe. Every handle captures on its first
    /// write; the writer count only decides when the triple is discarded.
    fn join_session(&self, triple: &BackupTriple) -> Result<()> {
        triple.capture()?;
        *self
            .sessions
            .lock()
            .entry(triple.primary.clone())
            .or_insert(0) += 1;
        Ok(())
    }

    /// Caller holds the path stripe
    fn leave_session(&self, triple: &BackupTriple, clean: bool) {
        let mut sessions = self.sessions.lock();

        let remaining = match sessions.get_mut(&triple.primary) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => return,
        };
        if remaining > 0 {
            return;
        }
        sessions.remove(&triple.primary);

        if !clean {
            tracing::warn!(path = %triple.primary.display(), "Keeping backup after failed flush");
            return;
        }
        if let Err(e) = triple.discard() {
            tracing::warn!(path = %triple.primary.display(), "Failed to discard backup: {}", e);
        }
    }
}
