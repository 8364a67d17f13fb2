//! Resource configuration table
//!
//! Read-only table that tells the resolver which storage policy and scope a
//! resource uses. Loaded once at initialization from code-supplied entries
//! and an optional JSON file.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PclError, Result};

/// Externally registered storage providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginId {
    Secure,
    Early,
    Emergency,
    #[serde(rename = "hwinfo")]
    HwInfo,
    Custom1,
    Custom2,
    Custom3,
}

impl PluginId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginId::Secure => "secure",
            PluginId::Early => "early",
            PluginId::Emergency => "emergency",
            PluginId::HwInfo => "hwinfo",
            PluginId::Custom1 => "custom1",
            PluginId::Custom2 => "custom2",
            PluginId::Custom3 => "custom3",
        }
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage policy of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// In-memory, process lifetime only
    Cached,

    /// Persisted synchronously on every write
    WriteThrough,

    /// Served by an externally registered provider
    Plugin(PluginId),
}

/// Scope override carried by a configuration entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Public,
    UserSeat,
    Group,
}

/// One row of the resource configuration table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfigEntry {
    /// Exact resource name, or a prefix pattern ending in '*'
    pub name: String,

    pub policy: Policy,

    /// Scope override; derived from the reference when absent
    #[serde(default)]
    pub scope: Option<ScopeKind>,

    #[serde(default)]
    pub has_default: bool,

    #[serde(default)]
    pub has_configurable_default: bool,
}

impl ResourceConfigEntry {
    pub fn new(name: impl Into<String>, policy: Policy) -> Self {
        Self {
            name: name.into(),
            policy,
            scope: None,
            has_default: false,
            has_configurable_default: false,
        }
    }

    pub fn with_scope(mut self, scope: ScopeKind) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn with_configurable_default(mut self) -> Self {
        self.has_configurable_default = true;
        self
    }

    /// Entry used for resources the table does not know about
    pub fn fallback(name: &str, policy: Policy) -> Self {
        Self {
            name: name.to_string(),
            policy,
            scope: None,
            has_default: true,
            has_configurable_default: true,
        }
    }

    fn prefix(&self) -> Option<&str> {
        self.name.strip_suffix('*')
    }
}

/// Lookup structure over all configuration entries
#[derive(Debug, Default)]
pub struct ResourceTable {
    /// Exact names → entry
    exact: HashMap<String, ResourceConfigEntry>,

    /// Prefix patterns, longest prefix first
    patterns: Vec<ResourceConfigEntry>,
}

impl ResourceTable {
    /// Build the table, rejecting names that appear twice
    pub fn from_entries(entries: impl IntoIterator<Item = ResourceConfigEntry>) -> Result<Self> {
        let mut table = Self::default();

        for entry in entries {
            if entry.prefix().is_some() {
                if table.patterns.iter().any(|p| p.name == entry.name) {
                    return Err(PclError::Config(format!(
                        "Duplicate resource pattern: {}",
                        entry.name
                    )));
                }
                table.patterns.push(entry);
            } else {
                if table.exact.contains_key(&entry.name) {
                    return Err(PclError::Config(format!(
                        "Duplicate resource entry: {}",
                        entry.name
                    )));
                }
                table.exact.insert(entry.name.clone(), entry);
            }
        }

        table
            .patterns
            .sort_by(|a, b| b.name.len().cmp(&a.name.len()));

        Ok(table)
    }

    /// Parse entries from a JSON array file
    pub fn load_json(path: &Path) -> Result<Vec<ResourceConfigEntry>> {
        let data = fs::read(path)?;
        let entries: Vec<ResourceConfigEntry> = serde_json::from_slice(&data).map_err(|e| {
            PclError::Config(format!("Invalid resource table {}: {}", path.display(), e))
        })?;
        Ok(entries)
    }

    /// Find the entry for a resource name
    ///
    /// Exact names win over patterns; among patterns the longest prefix wins.
    pub fn lookup(&self, name: &str) -> Option<&ResourceConfigEntry> {
        if let Some(entry) = self.exact.get(name) {
            return Some(entry);
        }

        self.patterns
            .iter()
            .find(|p| p.prefix().is_some_and(|prefix| name.starts_with(prefix)))
    }

    /// Number of entries (exact + patterns)
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
