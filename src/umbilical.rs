//! Umbilical cord check: one uploaded image plus reported symptoms.

use tracing::{info, instrument};

use crate::error::DashboardError;
use crate::forms::UmbilicalForm;
use crate::gemini::{GeminiClientTrait, GenerateRequest, InlineImage};
use crate::prompts::UMBILICAL_SYSTEM_PROMPT;
use crate::retry::{generate_with_retry, RetryPolicy};

pub const MISSING_IMAGE_MESSAGE: &str = "Please upload an image for analysis.";

#[derive(Debug, Clone, Default)]
pub struct UmbilicalState {
    pub image: Option<InlineImage>,
    pub form: UmbilicalForm,
    pub last_analysis: Option<String>,
}

impl UmbilicalState {
    /// The analyze action is only offered once a non-empty image exists.
    pub fn can_analyze(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(|image| !image.data.is_empty())
    }
}

#[instrument(skip_all)]
pub async fn analyze(
    state: &mut UmbilicalState,
    client: &dyn GeminiClientTrait,
    policy: &RetryPolicy,
) -> Result<String, DashboardError> {
    let image = match &state.image {
        Some(image) if !image.data.is_empty() => image.clone(),
        _ => return Err(DashboardError::empty_input(MISSING_IMAGE_MESSAGE)),
    };

    let request = GenerateRequest::new(state.form.to_prompt())
        .with_system_instruction(UMBILICAL_SYSTEM_PROMPT)
        .with_images(vec![image]);

    info!(
        "Requesting umbilical assessment with {} reported symptoms",
        state.form.reported_symptoms().len()
    );
    let reply = generate_with_retry(client, request, policy).await?;
    state.last_analysis = Some(reply.clone());
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::fake::FakeGeminiClient;

    #[tokio::test]
    async fn no_image_means_no_remote_call() {
        let client = FakeGeminiClient::new();
        let mut state = UmbilicalState {
            form: UmbilicalForm {
                odor: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!state.can_analyze());

        let err = analyze(&mut state, &client, &RetryPolicy::no_retry())
            .await
            .unwrap_err();

        assert!(matches!(err, DashboardError::EmptyRequiredInput(_)));
        assert_eq!(err.to_string(), MISSING_IMAGE_MESSAGE);
        assert_eq!(client.request_count(), 0);
        assert!(state.last_analysis.is_none());
    }

    #[tokio::test]
    async fn empty_image_is_not_enough() {
        let client = FakeGeminiClient::new();
        let mut state = UmbilicalState {
            image: Some(InlineImage::new("image/png", vec![])),
            ..Default::default()
        };
        assert!(!state.can_analyze());
        assert!(analyze(&mut state, &client, &RetryPolicy::no_retry())
            .await
            .is_err());
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn image_and_symptoms_are_sent_together() {
        let client =
            FakeGeminiClient::new().with_response("### Umbilical Cord Health Assessment");
        let mut state = UmbilicalState {
            image: Some(InlineImage::new("image/jpeg", vec![0xff, 0xd8])),
            form: UmbilicalForm {
                swelling: true,
                other_observations: "Slight bleeding".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(state.can_analyze());

        analyze(&mut state, &client, &RetryPolicy::no_retry())
            .await
            .unwrap();

        let request = client.last_request().unwrap();
        assert_eq!(request.images.len(), 1);
        assert!(request.prompt.contains("Swelling/Puffiness"));
        assert!(request.prompt.contains("Slight bleeding"));
        assert_eq!(
            state.last_analysis.as_deref(),
            Some("### Umbilical Cord Health Assessment")
        );
    }
}
