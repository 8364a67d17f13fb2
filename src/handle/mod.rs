//! Handle Module
//!
//! Bounded table of small integer handles shared by key, file and path
//! resources.
//!
//! ## Allocation Order
//! - Freed ids are reused most-recently-freed first (a stack)
//! - With no freed ids, the next never-used id (the high watermark) is taken
//! - Id 0 is never handed out
//!
//! ```text
//! open A,B,C  → 1,2,3      close 1,2,3  → free = [1,2,3]
//! open x3     → 3,2,1      open x3      → 4,5,6
//! ```

mod record;
mod table;

pub use record::{HandleKind, HandleRecord};
pub use table::HandleTable;

/// Caller-visible handle id
pub type Handle = i32;
