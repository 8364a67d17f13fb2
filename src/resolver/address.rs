//! Address resolution
//!
//! Turns a `ResourceReference` into a `ResolvedResource`: policy, scope,
//! database, backend key and (for files) physical paths.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PclError, Result};

use super::reference::{ResourceReference, LDBID_LOCAL, LDBID_PUBLIC};
use super::table::{Policy, ResourceConfigEntry, ResourceTable, ScopeKind};

/// Who can see a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessScope {
    /// One value for every user and seat
    Public,

    /// Private to one (user, seat) pair
    UserSeat { user: u32, seat: u32 },

    /// Shared by everyone addressing the group database
    Group(u16),
}

/// Which database a value lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Database {
    /// Application-local database
    Local(String),

    /// Public database shared by all applications
    Public,

    /// Shared group database
    Group(u16),
}

impl Database {
    /// Directory name below a mount point
    pub fn dir_name(&self) -> String {
        match self {
            Database::Local(app_id) => app_id.clone(),
            Database::Public => "Shared/Public".to_string(),
            Database::Group(id) => format!("Shared/Group/{:x}", id),
        }
    }
}

/// Backend-facing key: database plus scoped key path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub database: String,
    pub key: String,
}

impl StorageKey {
    pub fn new(database: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.database, self.key)
    }
}

/// Outcome of resolving a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub reference: ResourceReference,
    pub policy: Policy,
    pub scope: AccessScope,
    pub database: Database,

    /// Scoped key, e.g. `/user/1/seat/2/media/db` or `/node/pos`
    pub key: String,

    pub has_default: bool,
    pub has_configurable_default: bool,

    /// False when no table entry matched and the fallback entry was used
    pub explicit: bool,
}

impl ResolvedResource {
    pub fn storage_key(&self) -> StorageKey {
        StorageKey::new(self.database.dir_name(), self.key.clone())
    }

    /// Path of the resource relative to a mount point
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.database.dir_name()).join(self.key.trim_start_matches('/'))
    }
}

/// Resolves references against the resource configuration table
#[derive(Debug)]
pub struct AddressResolver {
    root: PathBuf,
    app_id: String,
    table: ResourceTable,
    fallback_policy: Policy,
}

impl AddressResolver {
    // =========================================================================
    // Mount Points
    // =========================================================================
    pub const CACHE_MOUNT: &'static str = "mnt-c";
    pub const WRITE_THROUGH_MOUNT: &'static str = "mnt-wt";
    pub const BACKUP_MOUNT: &'static str = "mnt-backup";

    pub fn new(
        root: impl Into<PathBuf>,
        app_id: impl Into<String>,
        table: ResourceTable,
        fallback_policy: Policy,
    ) -> Self {
        Self {
            root: root.into(),
            app_id: app_id.into(),
            table,
            fallback_policy,
        }
    }

    /// Resolve a reference
    ///
    /// Steps:
    /// 1. Normalize and validate the name
    /// 2. Look up the entry (or build the fallback entry)
    /// 3. Derive scope and database
    /// 4. Build the scoped key
    pub fn resolve(&self, reference: &ResourceReference) -> Result<ResolvedResource> {
        let name = normalize_name(&reference.name)?;

        let (entry, explicit) = match self.table.lookup(name) {
            Some(entry) => (entry.clone(), true),
            None => {
                tracing::trace!(resource = %reference, "No config entry, using fallback policy");
                (ResourceConfigEntry::fallback(name, self.fallback_policy), false)
            }
        };

        let scope = self.scope_for(reference, &entry)?;
        let database = match reference.ldbid {
            LDBID_LOCAL => Database::Local(self.app_id.clone()),
            LDBID_PUBLIC => Database::Public,
            id => Database::Group(id),
        };

        let key = match scope {
            AccessScope::Public | AccessScope::Group(_) => format!("/node/{}", name),
            AccessScope::UserSeat { user, seat } => {
                format!("/user/{}/seat/{}/{}", user, seat, name)
            }
        };

        Ok(ResolvedResource {
            reference: reference.clone(),
            policy: entry.policy,
            scope,
            database,
            key,
            has_default: entry.has_default,
            has_configurable_default: entry.has_configurable_default,
            explicit,
        })
    }

    /// Physical path of a file resource
    pub fn primary_path(&self, resolved: &ResolvedResource) -> Result<PathBuf> {
        let mount = match resolved.policy {
            Policy::Cached => Self::CACHE_MOUNT,
            Policy::WriteThrough => Self::WRITE_THROUGH_MOUNT,
            Policy::Plugin(id) => {
                return Err(PclError::invalid(format!(
                    "Plugin storage ({}) does not serve file resources",
                    id
                )))
            }
        };
        Ok(self.root.join(mount).join(resolved.relative_path()))
    }

    /// Backup path of a file resource (`<rel>~` on the backup mount)
    pub fn backup_path(&self, resolved: &ResolvedResource) -> PathBuf {
        let mut rel = resolved.relative_path().into_os_string();
        rel.push("~");
        self.root.join(Self::BACKUP_MOUNT).join(rel)
    }

    /// Directory of a database below a mount point
    pub fn database_dir(&self, mount: &str, database: &str) -> PathBuf {
        self.root.join(mount).join(database)
    }

    /// Directory holding the application's table and default-data files
    pub fn app_config_dir(&self) -> PathBuf {
        self.database_dir(Self::CACHE_MOUNT, &self.app_id)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn table(&self) -> &ResourceTable {
        &self.table
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn scope_for(
        &self,
        reference: &ResourceReference,
        entry: &ResourceConfigEntry,
    ) -> Result<AccessScope> {
        let user_seat = AccessScope::UserSeat {
            user: reference.user,
            seat: reference.seat,
        };

        match entry.scope {
            Some(ScopeKind::Public) => Ok(AccessScope::Public),
            Some(ScopeKind::UserSeat) => Ok(user_seat),
            Some(ScopeKind::Group) if reference.is_group() => {
                Ok(AccessScope::Group(reference.ldbid))
            }
            Some(ScopeKind::Group) => Err(PclError::invalid(format!(
                "{} is configured as group resource but {:#04x} is not a group database",
                entry.name, reference.ldbid
            ))),
            None if reference.is_group() => Ok(AccessScope::Group(reference.ldbid)),
            None if reference.ldbid == LDBID_PUBLIC => Ok(AccessScope::Public),
            None if reference.user == 0 && reference.seat == 0 => Ok(AccessScope::Public),
            None => Ok(user_seat),
        }
    }
}

/// Strip leading slashes and reject names that are empty or escape the tree
fn normalize_name(name: &str) -> Result<&str> {
    let trimmed = name.trim_start_matches('/');

    if trimmed.is_empty() {
        return Err(PclError::invalid("Empty resource name"));
    }
    if trimmed.contains('\0') {
        return Err(PclError::invalid("Resource name contains NUL"));
    }
    if trimmed
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(PclError::invalid(format!("Malformed resource name: {}", name)));
    }

    Ok(trimmed)
}
