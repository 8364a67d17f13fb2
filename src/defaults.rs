//! Default values
//!
//! Supplies fallback values for keys that have no stored value. Two sources
//! are consulted in order:
//! 1. Configurable defaults (external override table)
//! 2. Built-in defaults
//!
//! Default data is kept per database. Each database directory below the
//! cache mount may hold a JSON file per source (`{"name": "value", ...}`).
//! Values supplied in code through `Config` belong to the resource name and
//! apply in whatever database the resource resolves into; a database file
//! overrides them.
//!
//! The application's own files are read at init. Public and group files
//! are read on first lookup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{PclError, Result};
use crate::resolver::ResolvedResource;

/// Where a default value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultSource {
    Configurable,
    BuiltIn,
}

/// Default tables of one database
#[derive(Debug, Default)]
struct DatabaseDefaults {
    builtin: HashMap<String, Vec<u8>>,
    configurable: HashMap<String, Vec<u8>>,
}

/// Fallback value lookup for key reads
#[derive(Debug, Default)]
pub struct DefaultValueProvider {
    /// Cache mount; database files live in `{mount}/{db}/`
    mount: PathBuf,

    /// Values supplied in code, keyed by resource name
    builtin: HashMap<String, Vec<u8>>,
    configurable: HashMap<String, Vec<u8>>,

    /// Database directory name → values from that database's files
    databases: RwLock<HashMap<String, Arc<DatabaseDefaults>>>,
}

impl DefaultValueProvider {
    pub const BUILTIN_FILE: &'static str = "default-data.json";
    pub const CONFIGURABLE_FILE: &'static str = "configurable-default-data.json";

    pub fn new(builtin: HashMap<String, Vec<u8>>, configurable: HashMap<String, Vec<u8>>) -> Self {
        Self {
            builtin,
            configurable,
            ..Self::default()
        }
    }

    /// Build from the config plus the local database's default files
    ///
    /// A malformed local file fails init with `Config`.
    pub fn load(config: &Config, mount: &Path, local_db: &str) -> Result<Self> {
        let mut provider = Self::new(
            config.builtin_defaults.clone(),
            config.configurable_defaults.clone(),
        );
        provider.mount = mount.to_path_buf();

        let local = Self::load_database(&mount.join(local_db))?;
        tracing::debug!(
            builtin = provider.builtin.len() + local.builtin.len(),
            configurable = provider.configurable.len() + local.configurable.len(),
            "Default values loaded"
        );
        provider
            .databases
            .write()
            .insert(local_db.to_string(), Arc::new(local));

        Ok(provider)
    }

    /// Find the default for a resolved resource
    pub fn lookup(&self, resolved: &ResolvedResource) -> Option<(DefaultSource, Vec<u8>)> {
        let name = resolved.reference.name.trim_start_matches('/');
        let database = self.database(&resolved.database.dir_name());

        if resolved.has_configurable_default {
            if let Some(value) = database
                .configurable
                .get(name)
                .or_else(|| self.configurable.get(name))
            {
                return Some((DefaultSource::Configurable, value.clone()));
            }
        }

        if resolved.has_default {
            if let Some(value) = database.builtin.get(name).or_else(|| self.builtin.get(name)) {
                return Some((DefaultSource::BuiltIn, value.clone()));
            }
        }

        None
    }

    fn database(&self, dir_name: &str) -> Arc<DatabaseDefaults> {
        if let Some(loaded) = self.databases.read().get(dir_name) {
            return loaded.clone();
        }

        let loaded = match Self::load_database(&self.mount.join(dir_name)) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(database = dir_name, "Ignoring default data: {}", e);
                DatabaseDefaults::default()
            }
        };

        self.databases
            .write()
            .entry(dir_name.to_string())
            .or_insert_with(|| Arc::new(loaded))
            .clone()
    }

    fn load_database(dir: &Path) -> Result<DatabaseDefaults> {
        Ok(DatabaseDefaults {
            builtin: Self::load_file(&dir.join(Self::BUILTIN_FILE))?,
            configurable: Self::load_file(&dir.join(Self::CONFIGURABLE_FILE))?,
        })
    }

    fn load_file(path: &Path) -> Result<HashMap<String, Vec<u8>>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let data = fs::read(path)?;
        let values: HashMap<String, String> = serde_json::from_slice(&data).map_err(|e| {
            PclError::Config(format!("Invalid default file {}: {}", path.display(), e))
        })?;

        Ok(values
            .into_iter()
            .map(|(name, value)| (name, value.into_bytes()))
            .collect())
    }
}
