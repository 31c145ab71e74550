pub mod fake;
pub mod real;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::{Message, Role};
use crate::error::DashboardError;

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";
pub const DEFAULT_API_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta";

/// Wire names for message roles in a `generateContent` request
pub const WIRE_ROLE_USER: &str = "user";
pub const WIRE_ROLE_MODEL: &str = "model";

pub fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => WIRE_ROLE_USER,
        Role::Assistant => WIRE_ROLE_MODEL,
    }
}

/// An image sent inline with the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Accepts an uploaded JPEG or PNG, going by the file extension.
    pub fn from_upload(
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Self, DashboardError> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let mime_type = match extension.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            _ => {
                return Err(DashboardError::invalid_input(format!(
                    "Unsupported image type for {}. Please upload a JPG, JPEG or PNG file.",
                    file_name
                )))
            }
        };
        if data.is_empty() {
            return Err(DashboardError::empty_input(
                "Please upload an image for analysis.",
            ));
        }
        Ok(Self::new(mime_type, data))
    }

    /// `data:` URI so uploaded images can be shown back on the page.
    pub fn data_uri(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// One call to the model: optional system instruction, prior turns, the new
/// prompt and any images attached to it.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub history: Vec<Message>,
    pub prompt: String,
    pub images: Vec<InlineImage>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: &str) -> Self {
        self.system_instruction = Some(instruction.to_string());
        self
    }

    pub fn with_history(mut self, history: &[Message]) -> Self {
        self.history = history.to_vec();
        self
    }

    pub fn with_images(mut self, images: Vec<InlineImage>) -> Self {
        self.images = images;
        self
    }
}

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("request to Gemini failed: {0}")]
    Transport(String),
    #[error("Gemini returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Gemini returned no text{}", reason_suffix(.reason))]
    EmptyResponse { reason: Option<String> },
    #[error("could not decode Gemini response: {0}")]
    Decode(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

impl GeminiError {
    /// Transport errors, rate limiting and server errors may succeed on a
    /// later attempt; everything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            GeminiError::Transport(_) => true,
            GeminiError::Status { status, .. } => {
                *status == 429 || *status >= 500
            }
            GeminiError::EmptyResponse { .. } | GeminiError::Decode(_) => {
                false
            }
        }
    }
}

/// Abstracts the hosted model so pages can be exercised against a fake.
#[async_trait]
pub trait GeminiClientTrait: Send + Sync {
    /// Sends one request and returns the model's markdown reply.
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<String, GeminiError>;

    /// Model identifier the client talks to
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(GeminiError::Transport("reset".into()).is_transient());
        assert!(GeminiError::Status {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(GeminiError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!GeminiError::Status {
            status: 403,
            body: String::new()
        }
        .is_transient());
        assert!(!GeminiError::EmptyResponse { reason: None }.is_transient());
    }

    #[test]
    fn empty_response_mentions_block_reason() {
        let err = GeminiError::EmptyResponse {
            reason: Some("SAFETY".to_string()),
        };
        assert_eq!(err.to_string(), "Gemini returned no text (SAFETY)");
    }

    #[test]
    fn data_uri_is_base64() {
        let image = InlineImage::new("image/png", vec![1, 2, 3]);
        assert_eq!(image.data_uri(), "data:image/png;base64,AQID");
    }

    #[test]
    fn uploads_are_typed_by_extension() {
        let jpeg = InlineImage::from_upload("cord.JPG", vec![0xff, 0xd8]).unwrap();
        assert_eq!(jpeg.mime_type, "image/jpeg");
        let png = InlineImage::from_upload("xray.png", vec![0x89]).unwrap();
        assert_eq!(png.mime_type, "image/png");

        assert!(matches!(
            InlineImage::from_upload("scan.gif", vec![1]),
            Err(DashboardError::InvalidInput(_))
        ));
        assert!(matches!(
            InlineImage::from_upload("cord.png", vec![]),
            Err(DashboardError::EmptyRequiredInput(_))
        ));
    }

    #[test]
    fn assistant_maps_to_model_role() {
        assert_eq!(wire_role(Role::Assistant), "model");
        assert_eq!(wire_role(Role::User), "user");
    }
}
