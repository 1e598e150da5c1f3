//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SONGTRACKER_ROOT_FOLDER` environment variable
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: defaults are used and
//! a warning is logged.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SONGTRACKER_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "songtracker.db";

/// Backup directory name inside the root folder
pub const BACKUP_DIR: &str = "backups";

/// Compiled-in defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
    pub bind: String,
    pub session_ttl_hours: u64,
    pub backup_interval_hours: u64,
    pub backup_max_age_days: u64,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            port: 3000,
            bind: "127.0.0.1".to_string(),
            session_ttl_hours: 24,
            backup_interval_hours: 24,
            backup_max_age_days: 7,
        }
    }
}

/// Contents of `config.toml`
///
/// Every field is optional; unset fields fall back to [`CompiledDefaults`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub session_ttl_hours: Option<u64>,
    pub secure_cookies: Option<bool>,
    pub backup_interval_hours: Option<u64>,
    pub backup_max_age_days: Option<u64>,
}

impl TomlConfig {
    /// Parse a config file at `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the platform config file, or defaults if absent or invalid
    pub fn load() -> Self {
        match config_file_path() {
            Some(path) => match Self::from_path(&path) {
                Ok(config) => {
                    debug!("Loaded config file: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            None => {
                debug!("No config file found, using compiled defaults");
                Self::default()
            }
        }
    }
}

/// Fully resolved service settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub bind: String,
    pub session_ttl_hours: u64,
    pub secure_cookies: bool,
    pub backup_interval_hours: u64,
    pub backup_max_age_days: u64,
}

impl ServiceConfig {
    /// Merge a TOML config over compiled defaults
    ///
    /// `root_folder` is resolved separately by [`RootFolderResolver`].
    pub fn from_toml(root_folder: PathBuf, toml: &TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            root_folder,
            port: toml.port.unwrap_or(defaults.port),
            bind: toml.bind.clone().unwrap_or(defaults.bind),
            session_ttl_hours: toml.session_ttl_hours.unwrap_or(defaults.session_ttl_hours),
            secure_cookies: toml.secure_cookies.unwrap_or(false),
            backup_interval_hours: toml
                .backup_interval_hours
                .unwrap_or(defaults.backup_interval_hours),
            backup_max_age_days: toml
                .backup_max_age_days
                .unwrap_or(defaults.backup_max_age_days),
        }
    }
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml: TomlConfig,
}

impl RootFolderResolver {
    /// Resolver reading the platform config file
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml: TomlConfig::load(),
        }
    }

    /// Resolver using an already-loaded config
    pub fn with_config(toml: TomlConfig) -> Self {
        Self { cli_arg: None, toml }
    }

    /// Set the command-line override
    pub fn cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Resolve the root folder
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml.root_folder {
            return path.clone();
        }

        default_root_folder()
    }
}

impl Default for RootFolderResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the root folder layout and hands out paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and backups directory) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.backup_dir())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root_folder.join(BACKUP_DIR)
    }
}

/// Locate the platform config file, if one exists
fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("songtracker").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/songtracker/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("songtracker"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/songtracker"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("songtracker"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/songtracker"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("songtracker"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\songtracker"))
    } else {
        PathBuf::from("./songtracker_data")
    }
}
