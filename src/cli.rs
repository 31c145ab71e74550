use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::retry::RetryPolicy;

/// Model and retry settings shared by every entry point that talks to Gemini
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    /// Gemini API base URL
    #[arg(long, env = "GEMINI_API_BASE")]
    pub gemini_api_base: Option<String>,

    /// Gemini model identifier
    #[arg(long, env = "GEMINI_MODEL")]
    pub gemini_model: Option<String>,

    /// TOML secrets file consulted when no API key is given directly
    #[arg(
        long,
        env = "INCUBATE_SECRETS",
        default_value = ".streamlit/secrets.toml"
    )]
    pub secrets_file: PathBuf,

    /// Attempts per model call, including the first
    #[arg(long, default_value_t = 3)]
    pub retry_max_attempts: u32,

    /// Delay before the first retry
    #[arg(long, default_value_t = 500)]
    pub retry_initial_backoff_ms: u64,

    /// Upper bound on the delay between retries
    #[arg(long, default_value_t = 8000)]
    pub retry_max_backoff_ms: u64,
}

impl CommonArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts.max(1),
            initial_backoff: Duration::from_millis(
                self.retry_initial_backoff_ms,
            ),
            max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
        }
    }

    /// The key from the flag or environment, else from the secrets file.
    /// A missing secrets file is not an error; an unreadable one is.
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        if let Some(key) = non_empty(self.gemini_api_key.as_deref()) {
            return Ok(Some(key));
        }
        if !self.secrets_file.exists() {
            debug!("No secrets file at {}", self.secrets_file.display());
            return Ok(None);
        }
        let key = read_secrets_file(&self.secrets_file)?;
        if key.is_some() {
            info!("Using Gemini API key from {}", self.secrets_file.display());
        }
        Ok(key)
    }
}

#[derive(Debug, Default, Deserialize)]
struct Secrets {
    #[serde(default)]
    gemini_api_key: Option<GeminiSecrets>,
}

#[derive(Debug, Default, Deserialize)]
#[allow(non_snake_case)]
struct GeminiSecrets {
    GEMINI_API_KEY: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads `[gemini_api_key] GEMINI_API_KEY = "..."` from a TOML file.
pub fn read_secrets_file(path: &Path) -> Result<Option<String>> {
    let raw = std::fs::read_to_string(path).with_context(|| {
        format!("Failed to read secrets file {}", path.display())
    })?;
    let secrets: Secrets = toml::from_str(&raw).with_context(|| {
        format!("Failed to parse secrets file {}", path.display())
    })?;
    Ok(secrets
        .gemini_api_key
        .and_then(|section| non_empty(section.GEMINI_API_KEY.as_deref())))
}
