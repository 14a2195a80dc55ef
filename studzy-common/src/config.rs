//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Every key has a built-in
//! default so a missing file (or a file containing only some sections) never
//! prevents startup. A malformed file is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "STUDZY_ROOT_FOLDER";

/// Environment variable overriding `[llm] api_key`
pub const LLM_API_KEY_ENV: &str = "STUDZY_LLM_API_KEY";

/// Environment variable overriding `[llm] base_url`
pub const LLM_BASE_URL_ENV: &str = "STUDZY_LLM_BASE_URL";

/// Full bootstrap configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudzyConfig {
    /// Data root (database + object storage); see [`RootFolderResolver`]
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub cbt: CbtConfig,
    pub presence: PresenceConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted resource upload
    pub max_upload_bytes: usize,
    /// Broadcast capacity of the event bus
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
            max_upload_bytes: 100 * 1024 * 1024,
            event_capacity: 256,
        }
    }
}

/// Hosted chat-completion / embedding provider (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

/// Retrieval parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Target chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Minimum cosine similarity for a chunk to be used as context
    pub match_threshold: f32,
    /// Maximum number of chunks used as context
    pub match_count: usize,
    /// Upper bound on the assembled context block
    pub max_context_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            match_threshold: 0.5,
            match_count: 5,
            max_context_chars: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CbtConfig {
    pub default_question_count: usize,
    pub max_question_count: usize,
}

impl Default for CbtConfig {
    fn default() -> Self {
        Self {
            default_question_count: 20,
            max_question_count: 100,
        }
    }
}

/// One day
pub const MAX_STALE_AFTER_SECS: i64 = 24 * 60 * 60;
/// One year
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// A user is shown as online while their last heartbeat is younger than this
    pub stale_after_secs: i64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { stale_after_secs: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { token_ttl_hours: 24 * 7 }
    }
}

impl StudzyConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields defaults (with a warning). A file that exists but
    /// cannot be parsed is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides for secrets and endpoints
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(LLM_API_KEY_ENV) {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var(LLM_BASE_URL_ENV) {
            if !url.is_empty() {
                self.llm.base_url = url;
            }
        }
    }

    /// Reject values that would make retrieval or chunking misbehave
    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(Error::Config("rag.chunk_size must be positive".to_string()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(Error::Config(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if !(-1.0..=1.0).contains(&self.rag.match_threshold) {
            return Err(Error::Config(
                "rag.match_threshold must be within [-1, 1]".to_string(),
            ));
        }
        if self.cbt.max_question_count == 0 {
            return Err(Error::Config("cbt.max_question_count must be positive".to_string()));
        }
        if self.server.event_capacity == 0 {
            return Err(Error::Config("server.event_capacity must be positive".to_string()));
        }
        if !(1..=MAX_STALE_AFTER_SECS).contains(&self.presence.stale_after_secs) {
            return Err(Error::Config(format!(
                "presence.stale_after_secs must be within 1..={}",
                MAX_STALE_AFTER_SECS
            )));
        }
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.auth.token_ttl_hours) {
            return Err(Error::Config(format!(
                "auth.token_ttl_hours must be within 1..={}",
                MAX_TOKEN_TTL_HOURS
            )));
        }
        Ok(())
    }
}

/// Default configuration file location
///
/// `~/.config/studzy/config.toml` (or the platform equivalent).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("studzy").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("studzy.toml"))
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub struct RootFolderResolver<'a> {
    config: &'a StudzyConfig,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new(config: &'a StudzyConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.config.root_folder {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default data folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("studzy"))
        .unwrap_or_else(|| PathBuf::from("./studzy_data"))
}

/// Creates the data root layout and names the paths inside it
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder and the object storage folder
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.storage_path())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("studzy.db")
    }

    pub fn storage_path(&self) -> PathBuf {
        self.root.join("storage")
    }
}
