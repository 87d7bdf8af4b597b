//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults. The provider client and directory paths are built
//! from this config at startup and passed into the orchestrator explicitly.

use anyhow::anyhow;
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// OpenAI provider configuration
    pub provider: ProviderConfig,
    /// Local storage configuration
    pub storage: StorageConfig,
    /// Run polling configuration
    pub poll: PollConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API key for the Assistants API
    pub api_key: String,
    /// Base URL of the provider API (overridable for tests)
    pub base_url: String,
    /// Model used when lazily creating an assistant
    pub model: String,
}

/// Local storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for temporary uploaded files
    pub upload_dir: String,
    /// Directory served as static assets
    pub public_dir: String,
}

/// Run polling configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval between run status checks (in milliseconds)
    pub interval_ms: u64,
    /// Optional cap on poll attempts; unset means poll indefinitely
    pub max_attempts: Option<u32>,
    /// Treat failed/cancelled/expired runs as errors instead of "still running"
    pub fail_on_terminal: bool,
}

/// Default provider endpoint
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model pinned for lazily created assistants
const DEFAULT_MODEL: &str = "gpt-4-1106-preview";

impl Config {
    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    /// Returns an error if `OPENAI_API_KEY` is not set.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key =
            env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OPENAI_API_KEY must be set"))?;

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(3000),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            provider: ProviderConfig {
                api_key,
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
                model: env::var("ASSISTANT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
                public_dir: env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".to_string()),
            },
            poll: PollConfig {
                interval_ms: env::var("POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
                max_attempts: env::var("POLL_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
                fail_on_terminal: env::var("POLL_FAIL_ON_TERMINAL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(false),
            },
        })
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
