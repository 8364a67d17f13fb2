//! Backup triples
//!
//! A file resource that is being modified has three companions on disk:
//!
//! ```text
//!   mnt-c/{db}/{rel}            primary (live content)
//!   mnt-backup/{db}/{rel}~      backup  (content before the session)
//!   mnt-backup/{db}/{rel}~.crc  checksum of the backup, 8 hex digits
//! ```
//!
//! The backup and checksum exist only while a modification session is in
//! progress. Finding them at open time means the last session was
//! interrupted.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{PclError, Result};

/// Outcome of a recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Primary intact and no leftover backup
    NotNeeded,

    /// Primary rewritten from a verified backup
    Restored { bytes: usize },

    /// Primary missing or empty, but there is nothing to restore from
    NoBackup,

    /// Backup failed verification; primary served as-is
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Primary, backup and checksum paths of one file resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTriple {
    pub primary: PathBuf,
    pub backup: PathBuf,
    pub checksum: PathBuf,
}

impl BackupTriple {
    pub fn new(primary: PathBuf, backup: PathBuf) -> Self {
        let mut checksum: OsString = backup.clone().into_os_string();
        checksum.push(".crc");

        Self {
            primary,
            backup,
            checksum: PathBuf::from(checksum),
        }
    }

    /// True if both backup and checksum are on disk
    pub fn exists(&self) -> bool {
        self.backup.exists() && self.checksum.exists()
    }

    /// Copy the current primary into the backup and record its CRC32
    ///
    /// A missing primary is backed up as empty content. Backup data is
    /// synced before the checksum is written, so a checksum on disk always
    /// refers to a complete backup.
    pub fn capture(&self) -> Result<u32> {
        let content = match fs::read(&self.primary) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let crc = crc32fast::hash(&content);

        if let Some(parent) = self.backup.parent() {
            fs::create_dir_all(parent)?;
        }
        write_synced(&self.backup, &content)?;
        write_synced(&self.checksum, format!("{:08x}", crc).as_bytes())?;

        tracing::debug!(
            primary = %self.primary.display(),
            bytes = content.len(),
            crc = %format!("{:08x}", crc),
            "Backup captured"
        );

        Ok(crc)
    }

    /// Read the backup and check it against the stored checksum
    pub fn verify(&self) -> Result<Vec<u8>> {
        let content = fs::read(&self.backup)?;
        let stored = fs::read_to_string(&self.checksum)?;

        let expected = u32::from_str_radix(stored.trim(), 16).map_err(|_| {
            PclError::Corruption(format!(
                "Unreadable checksum file {}",
                self.checksum.display()
            ))
        })?;
        let actual = crc32fast::hash(&content);

        if expected != actual {
            return Err(PclError::ChecksumMismatch { expected, actual });
        }
        Ok(content)
    }

    /// Restore the primary from the backup if the last session did not
    /// finish or the primary is missing or empty
    pub fn recover(&self) -> Result<RecoveryOutcome> {
        let primary_damaged = match fs::metadata(&self.primary) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let interrupted = self.exists();

        if !interrupted && !primary_damaged {
            return Ok(RecoveryOutcome::NotNeeded);
        }
        if !interrupted {
            return Ok(RecoveryOutcome::NoBackup);
        }

        match self.verify() {
            Ok(content) => {
                if let Some(parent) = self.primary.parent() {
                    fs::create_dir_all(parent)?;
                }
                write_synced(&self.primary, &content)?;
                self.discard()?;
                Ok(RecoveryOutcome::Restored {
                    bytes: content.len(),
                })
            }
            Err(PclError::ChecksumMismatch { expected, actual }) => {
                Ok(RecoveryOutcome::ChecksumMismatch { expected, actual })
            }
            Err(e) => Err(e),
        }
    }

    /// Remove backup and checksum (missing files are fine)
    pub fn discard(&self) -> Result<()> {
        // Checksum first: a backup without checksum is never trusted
        remove_if_exists(&self.checksum)?;
        remove_if_exists(&self.backup)?;
        Ok(())
    }
}

fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file: File = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
