//! Write-Through Backend
//!
//! Durable key-value storage: every `set` is appended to a record log and
//! synced before returning, every `get` reads the record back from disk.
//!
//! ## File Format
//! One log per database at `{root}/mnt-wt/{database}/wt.kvlog`:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ CRC (4) │ Len (4) │ Payload (Len)   │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```
//! Payload is a bincode-encoded `Record::Put` or `Record::Delete`.

mod log;
mod record;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::WriteThroughSync;
use crate::error::Result;

use super::{StorageBackend, StorageKey};

pub use log::{RecordLog, ReplayStats};
pub use record::Record;

/// Durable backend for `Policy::WriteThrough`
///
/// ## Concurrency:
/// - `logs`: Mutex over the database → log map (held only for lookup)
/// - each `RecordLog`: own Mutex, serializing I/O per database
pub struct WriteThroughBackend {
    /// Mount directory holding one subdirectory per database
    root: PathBuf,

    sync: WriteThroughSync,

    /// Dead bytes a log must accumulate before it is compacted
    compaction_min_bytes: u64,

    /// Open logs, keyed by database name
    logs: Mutex<HashMap<String, Arc<Mutex<RecordLog>>>>,
}

impl WriteThroughBackend {
    pub const LOG_FILENAME: &'static str = "wt.kvlog";

    pub fn new(root: impl Into<PathBuf>, sync: WriteThroughSync, compaction_min_bytes: u64) -> Self {
        Self {
            root: root.into(),
            sync,
            compaction_min_bytes,
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the log file for a database
    pub fn log_path(&self, database: &str) -> PathBuf {
        self.root.join(database).join(Self::LOG_FILENAME)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of databases opened so far
    pub fn open_databases(&self) -> usize {
        self.logs.lock().len()
    }

    /// Force compaction of one database log
    pub fn compact(&self, database: &str) -> Result<()> {
        let log = self.log_for(database)?;
        let mut log = log.lock();
        log.compact()
    }

    /// Get the log for a database, opening (and replaying) it on first use
    fn log_for(&self, database: &str) -> Result<Arc<Mutex<RecordLog>>> {
        let mut logs = self.logs.lock();

        if let Some(log) = logs.get(database) {
            return Ok(log.clone());
        }

        let path = self.log_path(database);
        let (log, stats) = RecordLog::open(&path, self.sync)?;

        if stats.records_replayed > 0 || stats.bytes_truncated > 0 {
            tracing::info!(
                database,
                records = stats.records_replayed,
                live_keys = stats.live_keys,
                truncated = stats.bytes_truncated,
                "Write-through log replayed"
            );
        }

        let log = Arc::new(Mutex::new(log));
        logs.insert(database.to_string(), log.clone());
        Ok(log)
    }

    fn maybe_compact(&self, log: &mut RecordLog) -> Result<()> {
        let dead = log.dead_bytes();
        if dead >= self.compaction_min_bytes && dead > log.live_bytes() {
            log.compact()?;
        }
        Ok(())
    }
}

impl StorageBackend for WriteThroughBackend {
    fn get(&self, key: &StorageKey) -> Result<Vec<u8>> {
        let log = self.log_for(&key.database)?;
        let mut log = log.lock();
        log.get(&key.key)
    }

    fn set(&self, key: &StorageKey, value: &[u8]) -> Result<usize> {
        let log = self.log_for(&key.database)?;
        let mut log = log.lock();

        let written = log.put(&key.key, value)?;
        self.maybe_compact(&mut log)?;

        Ok(written)
    }

    fn delete(&self, key: &StorageKey) -> Result<()> {
        let log = self.log_for(&key.database)?;
        let mut log = log.lock();

        log.delete(&key.key)?;
        self.maybe_compact(&mut log)
    }

    fn size(&self, key: &StorageKey) -> Result<usize> {
        let log = self.log_for(&key.database)?;
        let log = log.lock();
        log.size(&key.key)
    }

    fn sync(&self) -> Result<()> {
        let logs: Vec<_> = self.logs.lock().values().cloned().collect();
        for log in logs {
            log.lock().sync()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "write-through"
    }
}
