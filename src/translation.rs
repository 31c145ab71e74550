use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::error::DashboardError;
use crate::gemini::{GeminiClientTrait, GenerateRequest};
use crate::prompts::TRANSLATION_PROMPT;
use crate::retry::{generate_with_retry, RetryPolicy};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum Language {
    #[default]
    English,
    Hindi,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Hindi];

    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Language::default()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|language| language.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                DashboardError::invalid_input(format!(
                    "Unsupported language: {}",
                    s
                ))
            })
    }
}

/// Rewrites an already generated reply into `target`.
///
/// The default language is returned unchanged without calling the model.
/// Nothing checks that the model kept the section markers; if it drops
/// one the reply is shown as raw text.
#[instrument(skip(client, text, policy), fields(chars = text.len()))]
pub async fn translate(
    client: &dyn GeminiClientTrait,
    text: &str,
    target: Language,
    policy: &RetryPolicy,
) -> Result<String, DashboardError> {
    if target.is_default() {
        return Ok(text.to_string());
    }

    info!("Translating reply to {}", target);
    let prompt = TRANSLATION_PROMPT
        .replace("{language}", target.name())
        .replace("{text}", text);
    generate_with_retry(client, GenerateRequest::new(prompt), policy).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::fake::FakeGeminiClient;
    use crate::gemini::GeminiError;

    #[tokio::test]
    async fn default_language_is_identity_without_remote_calls() {
        let client = FakeGeminiClient::new().with_response("should not be used");
        let text = "[START_RESOURCES]\n- WHO\n[END_RESOURCES]";

        let translated =
            translate(&client, text, Language::English, &RetryPolicy::no_retry())
                .await
                .unwrap();

        assert_eq!(translated, text);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn other_languages_make_one_call_naming_the_target() {
        let client = FakeGeminiClient::new().with_response("अनुवादित");

        let translated =
            translate(&client, "hello", Language::Hindi, &RetryPolicy::no_retry())
                .await
                .unwrap();

        assert_eq!(translated, "अनुवादित");
        assert_eq!(client.request_count(), 1);
        let request = client.last_request().unwrap();
        assert!(request.prompt.contains("Translate the following text to Hindi"));
        assert!(request.prompt.ends_with("hello"));
        assert!(request.history.is_empty());
    }

    #[tokio::test]
    async fn translation_failure_is_reported() {
        let client = FakeGeminiClient::new().with_failure(GeminiError::Status {
            status: 400,
            body: "bad".into(),
        });
        let result =
            translate(&client, "hello", Language::Hindi, &RetryPolicy::no_retry())
                .await;
        assert!(matches!(
            result,
            Err(DashboardError::RemoteCallFailure { .. })
        ));
    }

    #[test]
    fn parses_language_names() {
        assert_eq!("Hindi".parse::<Language>().unwrap(), Language::Hindi);
        assert_eq!(" english ".parse::<Language>().unwrap(), Language::English);
        assert!("Klingon".parse::<Language>().is_err());
        assert!(Language::default().is_default());
    }
}
