use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::DashboardError;
use crate::gemini::{GeminiClientTrait, GenerateRequest};

/// Bounded retry with exponential backoff for model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// One attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts the
    /// attempts already made (starting at 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff.saturating_mul(1u32 << exponent);
        delay.min(self.max_backoff)
    }
}

/// Calls the model, retrying transient failures as the policy allows.
#[instrument(skip(client, request, policy), fields(model = client.model()))]
pub async fn generate_with_retry(
    client: &dyn GeminiClientTrait,
    request: GenerateRequest,
    policy: &RetryPolicy,
) -> Result<String, DashboardError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.generate(request.clone()).await {
            Ok(text) => {
                if attempt > 1 {
                    info!("Gemini call succeeded on attempt {}", attempt);
                }
                return Ok(text);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    "Gemini call failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt, max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!("Gemini call failed after {} attempts: {}", attempt, e);
                return Err(DashboardError::RemoteCallFailure {
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}
