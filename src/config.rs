use crate::core::{Result, SessionError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Deployment mode a session connects under. Only `Dev` ships with a
/// populated data source; the other modes are provisioned per installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnMode {
    Dev,
    Deploy,
    Production,
}

/// Connection profile: the connection-string analog for a single-vendor
/// (SQLite) deployment. The data source is a directory, the catalog names
/// the database file inside it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectionProfile {
    /// Directory holding the catalog's database file. Empty means the mode
    /// is not provisioned; opening fails before any driver call.
    #[serde(default)]
    pub data_source: String,
    #[serde(default = "default_catalog")]
    pub catalog: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    #[serde(default = "default_true")]
    pub wal: bool,
}

fn default_catalog() -> String {
    "project".to_string()
}

fn default_true() -> bool {
    true
}

impl ConnectionProfile {
    /// Returns the built-in profile for a deployment mode.
    pub fn for_mode(mode: ConnMode) -> Self {
        let data_source = match mode {
            ConnMode::Dev => "./data".to_string(),
            ConnMode::Deploy | ConnMode::Production => String::new(),
        };

        ConnectionProfile {
            data_source,
            catalog: default_catalog(),
            read_only: false,
            foreign_keys: true,
            wal: true,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.data_source.is_empty()
    }

    /// Path of the database file this profile addresses.
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_source).join(format!("{}.db", self.catalog))
    }
}

/// Top-level configuration structure parsed from a TOML file. Each section
/// overrides the built-in profile for that deployment mode.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub dev: Option<ConnectionProfile>,
    pub deploy: Option<ConnectionProfile>,
    pub production: Option<ConnectionProfile>,
}

impl Config {
    /// Resolves the profile for a mode, falling back to the built-in one
    /// when the file has no section for it.
    pub fn profile(&self, mode: ConnMode) -> ConnectionProfile {
        let section = match mode {
            ConnMode::Dev => &self.dev,
            ConnMode::Deploy => &self.deploy,
            ConnMode::Production => &self.production,
        };

        section
            .clone()
            .unwrap_or_else(|| ConnectionProfile::for_mode(mode))
    }
}

/// Loads connection profiles from a TOML file at the given path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| SessionError::Config(format!("invalid profile file: {}", e)))
}
