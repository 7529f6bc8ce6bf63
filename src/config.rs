use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReplyError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_base: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub dry_run: bool,
}

/// Largest page the provider returns from a single list call
pub const MAX_PAGE_SIZE: u32 = 500;

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_max_results() -> u32 {
    10
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReplyError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ReplyError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ReplyError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ReplyError::Config(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| ReplyError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.mailbox.max_results == 0 {
            return Err(ReplyError::Config(
                "mailbox.max_results must be at least 1".to_string(),
            ));
        }
        if self.mailbox.max_results > MAX_PAGE_SIZE {
            return Err(ReplyError::Config(format!(
                "mailbox.max_results cannot exceed {} (provider page size limit)",
                MAX_PAGE_SIZE
            )));
        }

        if self.mailbox.user_id.trim().is_empty() {
            return Err(ReplyError::Config(
                "mailbox.user_id cannot be empty".to_string(),
            ));
        }

        if self.completion.model.trim().is_empty() {
            return Err(ReplyError::Config(
                "completion.model cannot be empty".to_string(),
            ));
        }
        if self.completion.api_key_env.trim().is_empty() {
            return Err(ReplyError::Config(
                "completion.api_key_env cannot be empty".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

/// Everything the reply generator needs, resolved once at startup
#[derive(Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    pub model: String,
    pub api_base: Option<String>,
}

impl std::fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CompletionSettings {
    /// Resolve settings from config and the process environment
    ///
    /// A `.env` file in the working directory is loaded first when present;
    /// variables already set in the environment win over it.
    pub fn from_env(config: &CompletionConfig) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment definitions from {:?}", path);
        }

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ReplyError::Config(format!("{} not set", config.api_key_env))
            })?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.clone(),
        })
    }
}
