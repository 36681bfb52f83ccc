use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::ai_gateway::{DEFAULT_CHAT_MODEL, DEFAULT_QUIZ_MODEL};
use crate::llm_providers::{LLMProvider, LLMProviderFactory, LLMProviderType};
use crate::logging::DEFAULT_LOG_FILTER;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LLMConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Completion service configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    /// `None` means the service runs fully offline.
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    pub chat_model: String,
    pub quiz_model: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Include diagnostic detail in 500 responses.
    pub debug: bool,
}

/// Event log location
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Used as given: a relative `DATA_DIR` (including the default `data`)
    /// resolves against the process working directory.
    pub data_dir: PathBuf,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            llm: LLMConfig::from_lookup(&lookup),
            server: ServerConfig::from_lookup(&lookup)?,
            storage: StorageConfig::from_lookup(&lookup),
            logging: LoggingConfig::from_lookup(&lookup),
        })
    }

    /// Log a summary of loaded configuration (without sensitive data)
    pub fn log_configuration_summary(&self) {
        log_system_event!(config, "Configuration loaded successfully");
        info!(
            llm_provider = ?self.llm.provider,
            llm_api_key_masked = %self.llm.api_key.as_deref().map(mask_sensitive_data).unwrap_or_else(|| "<unset>".to_string()),
            chat_model = %self.llm.chat_model,
            quiz_model = %self.llm.quiz_model,
            server_address = %self.server.address(),
            debug = self.server.debug,
            data_dir = %self.storage.data_dir.display(),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.llm.api_key.is_none() {
            warn!("No OPENAI_API_KEY or LLM_API_KEY configured - AI responses will use offline placeholders");
        }

        if EnvFilter::try_new(&self.logging.level).is_err() {
            warn!("Invalid log filter '{}', using '{}' as fallback", self.logging.level, DEFAULT_LOG_FILTER);
        }

        if self.server.debug {
            warn!("DEBUG is enabled - internal error responses will include diagnostic detail");
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl LLMConfig {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        let api_key = lookup("OPENAI_API_KEY")
            .or_else(|| lookup("LLM_API_KEY"))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let base_url = lookup("LLM_BASE_URL").filter(|url| !url.trim().is_empty());

        let provider_str = lookup("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string());
        let provider = LLMProviderType::from_name(&provider_str);

        let chat_model = lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let quiz_model = lookup("LLM_QUIZ_MODEL").unwrap_or_else(|| DEFAULT_QUIZ_MODEL.to_string());

        LLMConfig {
            api_key,
            base_url,
            provider,
            chat_model,
            quiz_model,
        }
    }

    /// Build the configured provider client, or `None` without a credential.
    pub fn build_provider(&self) -> Option<LLMProvider> {
        let api_key = self.api_key.clone()?;
        Some(LLMProviderFactory::create_provider(
            self.provider,
            api_key,
            self.base_url.clone(),
        ))
    }
}

impl ServerConfig {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        let port_str = lookup("PORT").unwrap_or_else(|| "5000".to_string());

        let port = port_str.trim().parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let debug = parse_flag(lookup("DEBUG"), false);

        Ok(ServerConfig { port, host, debug })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        let data_dir = lookup("DATA_DIR").unwrap_or_else(|| "data".to_string());
        StorageConfig {
            data_dir: PathBuf::from(data_dir),
        }
    }
}

impl LoggingConfig {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        let level = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let file_enabled = parse_flag(lookup("LOG_FILE_ENABLED"), true);
        let console_enabled = parse_flag(lookup("LOG_CONSOLE_ENABLED"), true);
        let log_directory = lookup("LOG_DIRECTORY").unwrap_or_else(|| "logs".to_string());

        LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        }
    }
}

/// Boolean toggles accept true/false, 1/0, yes/no and on/off in any case.
/// Anything else keeps the default.
fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
        _ => default,
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
