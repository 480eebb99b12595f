//! Wire types for the Dialogflow CX v3 REST API.
//!
//! Only the fields the bridge reads are modelled; everything else in the
//! response (intents, parameters, diagnostics) is ignored on deserialization.

use serde::{Deserialize, Serialize};

use super::DetectIntentRequest;

/// Body of `sessions:serverStreamingDetectIntent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingDetectIntentBody {
    pub query_input: QueryInput,
    pub enable_partial_response: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInput {
    pub text: TextInput,
    pub language_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextInput {
    pub text: String,
}

impl From<&DetectIntentRequest> for StreamingDetectIntentBody {
    fn from(request: &DetectIntentRequest) -> Self {
        Self {
            query_input: QueryInput {
                text: TextInput {
                    text: request.text.clone(),
                },
                language_code: request.language_code.clone(),
            },
            enable_partial_response: request.enable_partial_response,
        }
    }
}

/// One streamed detect-intent response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentResponse {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub query_result: Option<QueryResult>,
    /// "PARTIAL" or "FINAL" when partial responses are enabled
    #[serde(default)]
    pub response_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub response_messages: Vec<ResponseMessage>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// A response message. Non-text payloads (custom payloads, handoffs, ...)
/// deserialize with `text: None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub text: Option<MessageText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageText {
    #[serde(default)]
    pub text: Vec<String>,
}

impl DetectIntentResponse {
    /// Text of every response message, parts joined by a space.
    /// Messages without a text payload yield an empty string.
    pub fn fragments(&self) -> Vec<String> {
        self.query_result
            .as_ref()
            .map(|result| {
                result
                    .response_messages
                    .iter()
                    .map(|message| {
                        message
                            .text
                            .as_ref()
                            .map(|t| t.text.join(" "))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fragments flattened into the single string shown to the user
    pub fn display_text(&self) -> String {
        self.fragments().join("\n").trim().to_string()
    }
}

/// Parse one streamed payload. Accepts both a bare `DetectIntentResponse`
/// and the `{ "detectIntentResponse": ... }` envelope used by the
/// bidirectional streaming API.
pub fn parse_response(data: &str) -> Result<DetectIntentResponse, serde_json::Error> {
    let mut value: serde_json::Value = serde_json::from_str(data)?;
    if let Some(inner) = value.get_mut("detectIntentResponse") {
        return serde_json::from_value(inner.take());
    }
    serde_json::from_value(value)
}
