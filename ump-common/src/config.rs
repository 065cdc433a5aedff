//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file. Everything has a built-in
//! default, so a missing file is never fatal.
//!
//! # Root folder priority
//!
//! 1. Command-line argument
//! 2. `UMP_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML file
//! 4. OS-dependent default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "UMP_ROOT_FOLDER";

/// Environment variable naming the config file
pub const CONFIG_FILE_ENV: &str = "UMP_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "ump.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database; see module docs for precedence
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    /// Where anonymous users are sent to sign in
    pub login_url: Option<String>,
    /// Google Analytics tag id; the tag is omitted when unset or blank
    pub gtag_id: Option<String>,
    pub jwplatform: JwPlatformConfig,
    pub lookup: LookupConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JwPlatformConfig {
    /// Default player used for embeds and the player library
    pub embed_player_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Lookup proxy base URL; no lookups are made when unset
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 2000,
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl TomlConfig {
    pub fn login_url(&self) -> &str {
        self.login_url.as_deref().unwrap_or("/login")
    }

    /// Analytics tag id, if set to something other than whitespace
    pub fn gtag(&self) -> Option<&str> {
        self.gtag_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Parse a TOML config string
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
}

/// Load the bootstrap configuration
///
/// An explicit path (CLI or `UMP_CONFIG`) must exist and parse. Without one,
/// the per-user then system-wide locations are tried; when neither exists
/// the built-in defaults are used.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let from_env = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);
    let explicit = explicit.map(Path::to_path_buf).or(from_env);

    if let Some(path) = explicit {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        return parse_toml_config(&content);
    }

    match default_config_file() {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            info!("Loaded configuration from {}", path.display());
            parse_toml_config(&content)
        }
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// First existing default config location
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ump").join("config.toml"));
    let system_config = PathBuf::from("/etc/ump/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|path| path.exists())
}

/// Resolve the root folder from CLI, environment, TOML, then OS default
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("ump"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/ump"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join("ump"))
            .unwrap_or_else(|| PathBuf::from("./ump_data"))
    }
}

/// Prepares the root folder for use
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}
