use crate::gemini::{real::maybe_create_gemini_client, GeminiClientTrait};
use crate::retry::RetryPolicy;
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod app;
pub mod chat;
pub mod cli;
pub mod conversation;
pub mod error;
pub mod forms;
pub mod gemini;
pub mod infection;
pub mod parser;
pub mod presenter;
pub mod prompts;
pub mod retry;
pub mod session;
pub mod translation;
pub mod umbilical;

pub mod test_utils;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// Shared by every request handler
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    // None when no API key is configured; model pages then refuse to run.
    pub gemini_client: Option<Arc<dyn GeminiClientTrait>>,
    pub retry_policy: RetryPolicy,
    pub session_gc_interval: Duration,
    pub shutdown_token: CancellationToken,
}

impl AppState {
    pub fn new_for_testing() -> Self {
        Self::new_for_testing_with_client(None)
    }

    // Create a new AppState for testing with a fake or missing model client
    pub fn new_for_testing_with_client(
        gemini_client: Option<Arc<dyn GeminiClientTrait>>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new(DEFAULT_SESSION_TTL)),
            gemini_client,
            retry_policy: RetryPolicy::no_retry(),
            session_gc_interval: Duration::from_secs(300),
            shutdown_token: CancellationToken::new(),
        }
    }
}

// Create a config struct to hold AppState configuration
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: Option<String>,
    pub gemini_model: Option<String>,
    pub retry_policy: RetryPolicy,
    pub session_ttl: Duration,
    pub session_gc_interval: Duration,
}

// Function to create AppState from parameters
pub fn create_app_state(config: AppConfig) -> Arc<AppState> {
    let gemini_client = match maybe_create_gemini_client(
        config.gemini_api_key,
        config.gemini_api_base,
        config.gemini_model,
    ) {
        Ok(client) => {
            info!("Using Gemini model {}", client.model());
            Some(client)
        }
        Err(e) => {
            warn!("Failed to create Gemini client: {}", e);
            None
        }
    };

    Arc::new(AppState {
        sessions: Arc::new(SessionStore::new(config.session_ttl)),
        gemini_client,
        retry_policy: config.retry_policy,
        session_gc_interval: config.session_gc_interval,
        shutdown_token: CancellationToken::new(),
    })
}
