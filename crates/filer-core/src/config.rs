//! Configuration loading
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a layered resolution:
//! 1. An explicit path (`--config`), if given and present
//! 2. Override in data dir (~/.local/share/filer/config/filer.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/filer.toml");

/// Where documents are filed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory acting as the file store root
    pub root_dir: PathBuf,
    /// `/`-separated folder path under the root that holds the year folders
    pub base_path: String,
    /// Folder path looked up before falling back to the store root
    pub alternate_root: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("drive"),
            base_path: "financial/hsa-receipts".to_string(),
            alternate_root: Some("Computers/My Computers".to_string()),
        }
    }
}

/// Where records are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    /// Directory of `<sheet>.csv` files
    pub workbook_dir: PathBuf,
    /// Sheets that never hold records (e.g. "Totals")
    pub excluded_sheets: Vec<String>,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            workbook_dir: PathBuf::from("workbook"),
            excluded_sheets: vec!["Totals".to_string()],
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Full filer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub store: StoreConfig,
    pub sheets: SheetsConfig,
    pub server: ServerSettings,
}

impl Config {
    /// Load configuration (explicit path, then override, then default)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if path.exists() {
                return Self::from_file(path);
            }
            tracing::warn!("Config file {} not found, using defaults", path.display());
        } else if let Some(default_path) = default_config_path() {
            if default_path.exists() {
                return Self::from_file(&default_path);
            }
        }

        Self::parse(DEFAULT_CONFIG)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse TOML content on top of the built-in defaults
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Config::default();

        if let Some(store) = raw.store {
            if let Some(root_dir) = store.root_dir {
                config.store.root_dir = root_dir;
            }
            if let Some(base_path) = store.base_path {
                config.store.base_path = base_path;
            }
            // An empty string disables the alternate root
            if let Some(alternate_root) = store.alternate_root {
                config.store.alternate_root = Some(alternate_root).filter(|s| !s.trim().is_empty());
            }
        }

        if let Some(sheets) = raw.sheets {
            if let Some(workbook_dir) = sheets.workbook_dir {
                config.sheets.workbook_dir = workbook_dir;
            }
            if let Some(excluded) = sheets.excluded_sheets {
                config.sheets.excluded_sheets = excluded;
            }
        }

        if let Some(server) = raw.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
            if let Some(limit) = server.max_upload_bytes {
                config.server.max_upload_bytes = limit;
            }
        }

        Ok(config)
    }
}

/// Get the default override config path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("filer").join("config").join("filer.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    store: Option<RawStore>,
    sheets: Option<RawSheets>,
    server: Option<RawServer>,
}

#[derive(Debug, Deserialize)]
struct RawStore {
    root_dir: Option<PathBuf>,
    base_path: Option<String>,
    alternate_root: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSheets {
    workbook_dir: Option<PathBuf>,
    excluded_sheets: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    max_upload_bytes: Option<usize>,
}
