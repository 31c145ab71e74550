use crate::gemini::GeminiError;
use thiserror::Error;

/// Errors surfaced to the caregiver as page notices.
///
/// A response that does not follow the expected delimiter layout is not an
/// error; it is the `Unparsed` outcome of [`crate::parser::parse`].
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The Gemini API key is not configured. Pages that need the model
    /// cannot be used until the deployment provides one.
    #[error("Gemini API key not found. Please set GEMINI_API_KEY or add it to the secrets file.")]
    ConfigurationMissing,

    /// The remote call failed after every permitted attempt.
    #[error("An error occurred: {source}. This might be due to API rate limits or configuration issues.")]
    RemoteCallFailure {
        attempts: u32,
        #[source]
        source: GeminiError,
    },

    /// An action needs input the caregiver has not provided yet.
    #[error("{0}")]
    EmptyRequiredInput(String),

    /// A submitted value is outside what the form allows.
    #[error("{0}")]
    InvalidInput(String),
}

impl DashboardError {
    pub fn empty_input(message: impl Into<String>) -> Self {
        DashboardError::EmptyRequiredInput(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        DashboardError::InvalidInput(message.into())
    }
}
