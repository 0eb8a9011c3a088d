use thiserror::Error;

/// Failures surfaced by a chat turn or a conversation lookup.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is required")]
    Validation,

    #[error("Conversation not found")]
    NotFound,

    #[error("{0}")]
    ModelService(String),
}

impl From<ModelError> for ChatError {
    fn from(err: ModelError) -> Self {
        ChatError::ModelService(err.to_string())
    }
}

/// Failures talking to the hosted model API.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model client configuration error: {0}")]
    Config(String),

    #[error("Model API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model API returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },

    #[error("No content in model API response")]
    EmptyResponse,

    #[error("Invalid image payload: {0}")]
    InvalidImage(String),
}
