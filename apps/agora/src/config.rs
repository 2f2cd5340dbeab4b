//! # Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables, then CLI flags (applied by the caller).
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! body_limit_bytes = 2097152
//!
//! [storage]
//! backend = "redb"          # redb | file | memory
//! database = "agora.db"
//! media_dir = "media"
//! media_base_url = "/media"
//! upload_dir = "uploads"      # media paths in requests must resolve inside
//!
//! [security]
//! api_key = "secret"
//! cors_origins = ["https://app.example.com"]
//! ```
//!
//! ## Environment Variables
//!
//! - `AGORA_API_KEY`: Bearer key required on every route except `/health`
//! - `AGORA_CORS_ORIGINS`: Comma-separated allowed origins, or "*" for all
//! - `AGORA_MEDIA_DIR`: Directory for uploaded media
//! - `AGORA_UPLOAD_DIR`: Directory request media paths are read from

use agora_core::AgoraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default request body limit (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Largest configuration file accepted.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// BACKEND KIND
// =============================================================================

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// redb embedded database (ACID).
    #[default]
    Redb,
    /// Snapshot file loaded into memory and written back after mutations.
    File,
    /// Volatile in-memory store.
    Memory,
}

impl BackendKind {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Some(Self::Redb),
            "file" => Some(Self::File),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub database: PathBuf,
    pub media_dir: PathBuf,
    pub media_base_url: String,
    /// Local media named in requests must live under this directory.
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            database: PathBuf::from("agora.db"),
            media_dir: PathBuf::from("media"),
            media_base_url: "/media".to_string(),
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Bearer key. `None` or empty disables authentication.
    pub api_key: Option<String>,
    /// Allowed CORS origins. Empty means localhost only; `["*"]` allows all.
    pub cors_origins: Vec<String>,
}

impl SecurityConfig {
    /// The API key, if one is set and non-empty.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

// =============================================================================
// AGORA CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgoraConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
}

impl AgoraConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, AgoraError> {
        toml::from_str(text)
            .map_err(|e| AgoraError::InvalidInput(format!("Invalid configuration: {}", e)))
    }

    /// Read a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, AgoraError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            AgoraError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(AgoraError::InvalidInput(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            AgoraError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults or the given file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AgoraError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("AGORA_API_KEY") {
            self.security.api_key = Some(key);
        }
        if let Some(origins) = lookup("AGORA_CORS_ORIGINS") {
            self.security.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(dir) = lookup("AGORA_MEDIA_DIR").filter(|d| !d.is_empty()) {
            self.storage.media_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("AGORA_UPLOAD_DIR").filter(|d| !d.is_empty()) {
            self.storage.upload_dir = PathBuf::from(dir);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
