mod auth;
mod client;
mod sse;
pub mod types;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use auth::{Credentials, ServiceAccountAuth, ServiceAccountKey};
pub use client::CxSessionsClient;
pub use types::DetectIntentResponse;

/// Result type for Dialogflow operations
pub type DialogflowResult<T> = Result<T, DialogflowError>;

/// Errors that can occur while talking to Dialogflow
#[derive(Debug, thiserror::Error)]
pub enum DialogflowError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dialogflow API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Response parsing failed: {0}")]
    Parse(String),
}

/// One streaming detect-intent call for a single user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectIntentRequest {
    /// Session id scoping the conversation (not the full session path)
    pub session_id: String,
    /// The user's text
    pub text: String,
    pub language_code: String,
    /// Ask the agent to emit partial responses before the final one
    pub enable_partial_response: bool,
}

/// Streamed responses for one exchange. The stream ends when the agent is done.
pub type ResponseStream = BoxStream<'static, DialogflowResult<DetectIntentResponse>>;

/// Anything that can run a streaming detect-intent exchange
#[async_trait]
pub trait IntentDetector: Send + Sync {
    /// Open one exchange. Errors before the first response are returned
    /// directly, later failures are yielded as stream items.
    async fn streaming_detect_intent(
        &self,
        request: DetectIntentRequest,
    ) -> DialogflowResult<ResponseStream>;

    /// Get the name of this detector
    fn name(&self) -> &str;
}
