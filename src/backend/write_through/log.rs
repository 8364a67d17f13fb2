//! Write-through record log
//!
//! Append-only log with an in-memory index of live records. Opening a log
//! replays it and cuts off a torn or corrupted tail.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WriteThroughSync;
use crate::error::{PclError, Result};

use super::record::{Record, HEADER_SIZE};

/// Location of a live record inside the log
#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    frame_len: u64,
    value_len: usize,
}

/// Result of replaying a log on open
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Number of valid records read
    pub records_replayed: u64,

    /// Keys with a live value after replay
    pub live_keys: usize,

    /// Bytes cut off the end (torn or corrupted records)
    pub bytes_truncated: u64,
}

/// One database's durable record log
pub struct RecordLog {
    path: PathBuf,
    file: File,
    index: HashMap<String, Slot>,

    /// End of the last valid record (next append offset)
    end: u64,

    /// Bytes occupied by live Put records
    live_bytes: u64,

    sync: WriteThroughSync,
}

impl RecordLog {
    /// Open or create a log, replaying existing records
    pub fn open(path: &Path, sync: WriteThroughSync) -> Result<(Self, ReplayStats)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let mut log = Self {
            path: path.to_path_buf(),
            file,
            index: HashMap::new(),
            end: 0,
            live_bytes: 0,
            sync,
        };

        let mut stats = ReplayStats::default();
        let mut pos = 0usize;

        while pos + HEADER_SIZE <= data.len() {
            let (crc, len) = Record::parse_header(&data[pos..pos + HEADER_SIZE]);
            let payload_start = pos + HEADER_SIZE;

            if payload_start + len > data.len() {
                break; // Torn write at the tail
            }

            let record = match Record::decode(crc, &data[payload_start..payload_start + len]) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = %path.display(), offset = pos, "Stopping replay: {}", e);
                    break;
                }
            };

            let frame_len = (HEADER_SIZE + len) as u64;
            log.apply(&record, pos as u64, frame_len);
            stats.records_replayed += 1;
            pos += HEADER_SIZE + len;
        }

        log.end = pos as u64;

        if (pos as u64) < data.len() as u64 {
            stats.bytes_truncated = data.len() as u64 - pos as u64;
            tracing::warn!(
                path = %path.display(),
                bytes = stats.bytes_truncated,
                "Truncating incomplete write-through tail"
            );
            log.file.set_len(log.end)?;
            log.file.sync_all()?;
        }

        stats.live_keys = log.index.len();
        Ok((log, stats))
    }

    /// Read the value stored under `key` from disk
    pub fn get(&mut self, key: &str) -> Result<Vec<u8>> {
        let slot = *self.index.get(key).ok_or(PclError::NoKey)?;

        let mut frame = vec![0u8; slot.frame_len as usize];
        self.file.seek(SeekFrom::Start(slot.offset))?;
        self.file.read_exact(&mut frame)?;

        let (crc, _) = Record::parse_header(&frame[..HEADER_SIZE]);
        match Record::decode(crc, &frame[HEADER_SIZE..])? {
            Record::Put { key: stored, value } if stored == key => Ok(value),
            other => Err(PclError::Corruption(format!(
                "index for {} points at record for {}",
                key,
                other.key()
            ))),
        }
    }

    /// Size of the value stored under `key`
    pub fn size(&self, key: &str) -> Result<usize> {
        self.index
            .get(key)
            .map(|slot| slot.value_len)
            .ok_or(PclError::NoKey)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Append a Put record
    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<usize> {
        let record = Record::Put {
            key: key.to_string(),
            value: value.to_vec(),
        };
        self.append(&record)?;
        Ok(value.len())
    }

    /// Append a Delete record (fails with `NoKey` if `key` is not live)
    pub fn delete(&mut self, key: &str) -> Result<()> {
        if !self.index.contains_key(key) {
            return Err(PclError::NoKey);
        }

        let record = Record::Delete {
            key: key.to_string(),
        };
        self.append(&record)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Rewrite the log with live records only
    pub fn compact(&mut self) -> Result<()> {
        let tmp_path = self.path.with_extension("kvlog.compact");

        let mut keys: Vec<String> = self.index.keys().cloned().collect();
        keys.sort();

        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut new_index = HashMap::with_capacity(keys.len());
        let mut offset = 0u64;

        for key in keys {
            let value = self.get(&key)?;
            let value_len = value.len();
            let frame = Record::Put {
                key: key.clone(),
                value,
            }
            .encode()?;

            tmp.write_all(&frame)?;
            new_index.insert(
                key,
                Slot {
                    offset,
                    frame_len: frame.len() as u64,
                    value_len,
                },
            );
            offset += frame.len() as u64;
        }

        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)?;

        let before = self.end;
        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.index = new_index;
        self.end = offset;
        self.live_bytes = offset;

        tracing::debug!(
            path = %self.path.display(),
            before,
            after = offset,
            "Write-through log compacted"
        );

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the log in bytes
    pub fn len_bytes(&self) -> u64 {
        self.end
    }

    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    /// Bytes held by overwritten or deleted records
    pub fn dead_bytes(&self) -> u64 {
        self.end - self.live_bytes
    }

    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn append(&mut self, record: &Record) -> Result<()> {
        let frame = record.encode()?;
        let offset = self.end;

        self.file.seek(SeekFrom::Start(offset))?;
        if let Err(e) = self.file.write_all(&frame) {
            // Drop the partial frame so the next append starts clean
            if let Err(truncate) = self.file.set_len(offset) {
                tracing::warn!(
                    path = %self.path.display(),
                    offset,
                    "Failed to drop partial write-through frame: {}",
                    truncate
                );
            }
            return Err(e.into());
        }

        if self.sync == WriteThroughSync::EveryWrite {
            self.file.sync_data()?;
        }

        self.end += frame.len() as u64;
        self.apply(record, offset, frame.len() as u64);

        Ok(())
    }

    /// Update the index for a record located at `offset`
    fn apply(&mut self, record: &Record, offset: u64, frame_len: u64) {
        let previous = match record {
            Record::Put { key, value } => self.index.insert(
                key.clone(),
                Slot {
                    offset,
                    frame_len,
                    value_len: value.len(),
                },
            ),
            Record::Delete { key } => self.index.remove(key),
        };

        if let Some(old) = previous {
            self.live_bytes -= old.frame_len;
        }
        if matches!(record, Record::Put { .. }) {
            self.live_bytes += frame_len;
        }
    }
}
