use serde::{Deserialize, Serialize};

/// Sent to the client when an exchange fails
pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Frame sent by the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub text: String,
}

/// Frame sent back to the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub text: String,
}

impl ServerMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn apology() -> Self {
        Self::new(APOLOGY_TEXT)
    }
}

/// Errors decoding an inbound frame
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Binary frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Binary frames are accepted when they carry UTF-8 JSON
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::parse(std::str::from_utf8(bytes)?)
    }
}
