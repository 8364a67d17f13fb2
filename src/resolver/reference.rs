//! Resource references
//!
//! The four-tuple every key and file call is addressed with.

use std::fmt;

/// Logical database id of the application-local database
pub const LDBID_LOCAL: u16 = 0xFF;

/// Logical database id of the public database shared by all applications
pub const LDBID_PUBLIC: u16 = 0x00;

/// A raw reference to a key or file resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceReference {
    /// Logical database id (access scope selector)
    pub ldbid: u16,

    /// Key name or relative file path
    pub name: String,

    /// User number (0 = no specific user)
    pub user: u32,

    /// Seat number (0 = no specific seat)
    pub seat: u32,
}

impl ResourceReference {
    pub fn new(ldbid: u16, name: impl Into<String>, user: u32, seat: u32) -> Self {
        Self {
            ldbid,
            name: name.into(),
            user,
            seat,
        }
    }

    /// Reference into the application-local database
    pub fn local(name: impl Into<String>, user: u32, seat: u32) -> Self {
        Self::new(LDBID_LOCAL, name, user, seat)
    }

    /// True if this reference addresses a shared group database
    pub fn is_group(&self) -> bool {
        self.ldbid != LDBID_LOCAL && self.ldbid != LDBID_PUBLIC
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#04x}:{} (user {}, seat {})",
            self.ldbid, self.name, self.user, self.seat
        )
    }
}
