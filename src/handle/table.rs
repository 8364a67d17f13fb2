//! Handle table implementation
//!
//! Vec-indexed slots plus a free stack, behind one Mutex.

use parking_lot::Mutex;

use crate::error::{PclError, Result};

use super::Handle;

/// Fixed-capacity handle table
///
/// ## Concurrency:
/// - All slot and free-list mutation happens under `slots`
/// - Records are cloned out, so callers never hold the table lock during I/O
pub struct HandleTable<T> {
    capacity: usize,
    slots: Mutex<Slots<T>>,
}

struct Slots<T> {
    /// Index = handle id; `None` = free
    records: Vec<Option<T>>,

    /// Freed ids, most recently freed on top
    free: Vec<Handle>,

    /// Next never-used id
    high_watermark: Handle,
}

impl<T: Clone> HandleTable<T> {
    /// Create a table holding ids `1..capacity`
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Mutex::new(Slots {
                records: Vec::new(),
                free: Vec::new(),
                high_watermark: 1,
            }),
        }
    }

    /// Allocate a handle for `record`
    pub fn open(&self, record: T) -> Result<Handle> {
        let mut slots = self.slots.lock();

        let handle = match slots.free.pop() {
            Some(handle) => handle,
            None => {
                if slots.high_watermark as usize >= self.capacity {
                    return Err(PclError::MaxHandleExceeded);
                }
                let handle = slots.high_watermark;
                slots.high_watermark += 1;
                handle
            }
        };

        let idx = handle as usize;
        if slots.records.len() <= idx {
            slots.records.resize_with(idx + 1, || None);
        }
        slots.records[idx] = Some(record);

        Ok(handle)
    }

    /// Check that `handle` is in range and allocated
    pub fn validate(&self, handle: Handle) -> Result<()> {
        let slots = self.slots.lock();
        Self::slot(&slots, self.capacity, handle).map(|_| ())
    }

    /// Clone out the record for `handle`
    pub fn get(&self, handle: Handle) -> Result<T> {
        let slots = self.slots.lock();
        Self::slot(&slots, self.capacity, handle).cloned()
    }

    /// Free `handle`, returning its record
    pub fn close(&self, handle: Handle) -> Result<T> {
        let mut slots = self.slots.lock();
        Self::slot(&slots, self.capacity, handle)?;

        let record = slots.records[handle as usize]
            .take()
            .ok_or(PclError::InvalidHandle)?;
        slots.free.push(handle);

        Ok(record)
    }

    /// Free every allocated handle (in id order) and reset the table
    pub fn drain(&self) -> Vec<(Handle, T)> {
        let mut slots = self.slots.lock();

        let drained: Vec<(Handle, T)> = slots
            .records
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, record)| record.take().map(|r| (idx as Handle, r)))
            .collect();

        slots.records.clear();
        slots.free.clear();
        slots.high_watermark = 1;

        drained
    }

    /// Ids currently allocated, in ascending order
    pub fn open_handles(&self) -> Vec<Handle> {
        self.slots
            .lock()
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_some())
            .map(|(idx, _)| idx as Handle)
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.slots.lock().records.iter().filter(|r| r.is_some()).count()
    }

    pub fn high_watermark(&self) -> Handle {
        self.slots.lock().high_watermark
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn slot<'a>(slots: &'a Slots<T>, capacity: usize, handle: Handle) -> Result<&'a T> {
        if handle < 0 || handle as usize >= capacity || handle >= slots.high_watermark {
            return Err(PclError::MaxHandleExceeded);
        }

        slots
            .records
            .get(handle as usize)
            .and_then(|r| r.as_ref())
            .ok_or(PclError::InvalidHandle)
    }
}
