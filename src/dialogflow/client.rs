use super::*;
use crate::config::DialogflowConfig;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::time::Duration;

use super::types::StreamingDetectIntentBody;
use super::{sse, types};

/// Dialogflow CX sessions client over the v3 REST API
pub struct CxSessionsClient {
    client: reqwest::Client,
    /// REST base URL, no trailing slash
    endpoint: String,
    /// `projects/{p}/locations/{l}/agents/{a}`
    agent_path: String,
    credentials: Credentials,
}

impl CxSessionsClient {
    /// Build a client from configuration, loading credentials eagerly
    pub fn new(config: &DialogflowConfig) -> DialogflowResult<Self> {
        let agent_path = config.agent_path()?;
        let credentials = config.credentials()?;
        Self::with_credentials(config.endpoint(), agent_path, credentials)
    }

    pub fn with_credentials(
        endpoint: String,
        agent_path: String,
        credentials: Credentials,
    ) -> DialogflowResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        tracing::info!("Dialogflow client for {} via {}", agent_path, endpoint);

        Ok(Self {
            client,
            endpoint,
            agent_path,
            credentials,
        })
    }

    /// Full resource name of a session
    pub fn session_path(&self, session_id: &str) -> String {
        format!("{}/sessions/{}", self.agent_path, session_id)
    }

    fn stream_url(&self, session_id: &str) -> String {
        format!(
            "{}/v3/{}:serverStreamingDetectIntent?alt=sse",
            self.endpoint,
            self.session_path(session_id)
        )
    }
}

#[async_trait]
impl IntentDetector for CxSessionsClient {
    async fn streaming_detect_intent(
        &self,
        request: DetectIntentRequest,
    ) -> DialogflowResult<ResponseStream> {
        let token = self.credentials.bearer_token(&self.client).await?;
        let url = self.stream_url(&request.session_id);
        let body = StreamingDetectIntentBody::from(&request);

        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DialogflowError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let stream = sse::data_lines(Box::pin(response.bytes_stream())).map(|item| match item {
            Ok(data) => types::parse_response(&data).map_err(|e| {
                tracing::warn!("Unparseable Dialogflow payload: {}", data);
                DialogflowError::Parse(e.to_string())
            }),
            Err(e) => Err(DialogflowError::Http(e)),
        });

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "dialogflow-cx"
    }
}

/// Pull `error.message` out of a Google API error body, falling back to the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STREAM_PATH: &str =
        "/v3/projects/p/locations/global/agents/a/sessions/s1:serverStreamingDetectIntent";

    fn client_for(server: &MockServer) -> CxSessionsClient {
        CxSessionsClient::with_credentials(
            server.uri(),
            "projects/p/locations/global/agents/a".to_string(),
            Credentials::Static("test-token".to_string()),
        )
        .unwrap()
    }

    fn request(text: &str) -> DetectIntentRequest {
        DetectIntentRequest {
            session_id: "s1".to_string(),
            text: text.to_string(),
            language_code: "en".to_string(),
            enable_partial_response: true,
        }
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"code":404,"message":"Agent not found","status":"NOT_FOUND"}}"#;
        assert_eq!(api_error_message(body), "Agent not found");
        assert_eq!(api_error_message("  plain failure \n"), "plain failure");
    }

    #[test]
    fn test_session_path() {
        let client = CxSessionsClient::with_credentials(
            "https://global-dialogflow.googleapis.com".to_string(),
            "projects/p/locations/global/agents/a".to_string(),
            Credentials::Static("t".to_string()),
        )
        .unwrap();
        assert_eq!(
            client.session_path("abc"),
            "projects/p/locations/global/agents/a/sessions/abc"
        );
        assert_eq!(
            client.stream_url("abc"),
            "https://global-dialogflow.googleapis.com/v3/projects/p/locations/global/agents/a/sessions/abc:serverStreamingDetectIntent?alt=sse"
        );
    }

    #[tokio::test]
    async fn test_streams_responses() {
        let server = MockServer::start().await;
        let sse_body = concat!(
            "data: {\"queryResult\":{\"responseMessages\":[{\"text\":{\"text\":[\"Hi\"]}}]},\"responseType\":\"PARTIAL\"}\n\n",
            "data: {\"queryResult\":{\"responseMessages\":[{\"text\":{\"text\":[\"Hi\"]}},{\"text\":{\"text\":[\"there\"]}}]},\"responseType\":\"FINAL\"}\n\n",
        );

        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .and(query_param("alt", "sse"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({
                "queryInput": { "text": { "text": "hello" }, "languageCode": "en" },
                "enablePartialResponse": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let responses: Vec<_> = client
            .streaming_detect_intent(request("hello"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].as_ref().unwrap().display_text(), "Hi");
        assert_eq!(responses[1].as_ref().unwrap().display_text(), "Hi\nthere");
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": { "code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED" }
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .streaming_detect_intent(request("hello"))
            .await;

        match result {
            Err(DialogflowError::Api { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Permission denied");
            }
            Err(other) => panic!("Expected Api error, got {}", other),
            Ok(_) => panic!("Expected Api error, got a stream"),
        }
    }

    #[tokio::test]
    async fn test_garbage_payload_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: {oops\n\n"))
            .mount(&server)
            .await;

        let responses: Vec<_> = client_for(&server)
            .streaming_detect_intent(request("hello"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0], Err(DialogflowError::Parse(_))));
    }
}
