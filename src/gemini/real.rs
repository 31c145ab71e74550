use crate::gemini::{
    wire_role, GeminiClientTrait, GeminiError, GenerateRequest,
    WIRE_ROLE_USER,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn build_body(request: GenerateRequest) -> GenerateContentBody {
    let system_instruction = request.system_instruction.map(|text| Content {
        role: None,
        parts: vec![Part::Text { text }],
    });

    let mut contents: Vec<Content> = request
        .history
        .into_iter()
        .map(|message| Content {
            role: Some(wire_role(message.role)),
            parts: vec![Part::Text {
                text: message.content,
            }],
        })
        .collect();

    let mut parts = vec![Part::Text {
        text: request.prompt,
    }];
    for image in request.images {
        parts.push(Part::Image {
            inline_data: InlineData {
                mime_type: image.mime_type,
                data: base64::engine::general_purpose::STANDARD
                    .encode(&image.data),
            },
        });
    }
    contents.push(Content {
        role: Some(WIRE_ROLE_USER),
        parts,
    });

    GenerateContentBody {
        system_instruction,
        contents,
        generation_config: GenerationConfig {
            temperature: 0.4,
            max_output_tokens: 8192,
        },
    }
}

fn extract_text(
    response: GenerateContentResponse,
) -> Result<String, GeminiError> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(GeminiError::EmptyResponse {
            reason: block_reason,
        });
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GeminiError::EmptyResponse {
            reason: candidate.finish_reason.or(block_reason),
        });
    }
    Ok(text)
}

// Calls the hosted Gemini `generateContent` endpoint
pub struct RealGeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl RealGeminiClient {
    pub fn new(
        api_key: String,
        api_base: Option<String>,
        model: Option<String>,
    ) -> Result<Self, GeminiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GeminiError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            api_base: api_base
                .unwrap_or_else(|| super::DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| super::DEFAULT_MODEL.to_string()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl GeminiClientTrait for RealGeminiClient {
    #[instrument(skip(self, request), fields(model = %self.model, history = request.history.len(), images = request.images.len()))]
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<String, GeminiError> {
        let body = build_body(request);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeminiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini request failed with {}: {}", status, body);
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::Decode(e.to_string()))?;
        debug!("Gemini returned {} candidates", payload.candidates.len());

        extract_text(payload)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Builds the client when a key is available; without one the pages that
/// need the model report the missing configuration.
pub fn maybe_create_gemini_client(
    api_key: Option<String>,
    api_base: Option<String>,
    model: Option<String>,
) -> Result<Arc<dyn GeminiClientTrait>, anyhow::Error> {
    let api_key = api_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Gemini API key not configured"))?;
    let client = RealGeminiClient::new(api_key, api_base, model)?;
    Ok(Arc::new(client))
}
