//! Per-message exchange with the conversational agent.
//!
//! Every valid inbound frame becomes one independent task that opens a
//! streaming detect-intent call, flattens each streamed response into display
//! text and pushes it onto the connection's outbound channel. Tasks share no
//! state, so replies go out in whatever order the agent finishes them.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dialogflow::{DetectIntentRequest, IntentDetector};
use crate::protocol::{ClientMessage, ProtocolError, ServerMessage};
use crate::session::SessionId;
use crate::state::AppState;

/// Frames waiting to be written to one socket
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// What a finished exchange did, mostly for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeOutcome {
    /// Non-empty response frames delivered to the socket
    pub frames_sent: usize,
    /// Whether the exchange ended in an error (an apology was sent)
    pub failed: bool,
}

/// Handle one text frame. Returns the spawned exchange, or `None` when the
/// frame was malformed and dropped.
pub fn dispatch_text(
    raw: &str,
    session: &SessionId,
    state: &Arc<AppState>,
    outbound: &Outbound,
) -> Option<JoinHandle<ExchangeOutcome>> {
    dispatch(ClientMessage::parse(raw), session, state, outbound)
}

/// Handle one binary frame carrying UTF-8 JSON
pub fn dispatch_bytes(
    raw: &[u8],
    session: &SessionId,
    state: &Arc<AppState>,
    outbound: &Outbound,
) -> Option<JoinHandle<ExchangeOutcome>> {
    dispatch(ClientMessage::parse_bytes(raw), session, state, outbound)
}

fn dispatch(
    parsed: Result<ClientMessage, ProtocolError>,
    session: &SessionId,
    state: &Arc<AppState>,
    outbound: &Outbound,
) -> Option<JoinHandle<ExchangeOutcome>> {
    let message = match parsed {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(session_id = %session, "Error processing message: {}", e);
            return None;
        }
    };

    tracing::info!(session_id = %session, "Received from frontend: {:?}", message.text);

    let request = DetectIntentRequest {
        session_id: session.to_string(),
        text: message.text,
        language_code: state.language_code.clone(),
        enable_partial_response: state.enable_partial_response,
    };

    Some(tokio::spawn(run_exchange(
        state.detector.clone(),
        request,
        outbound.clone(),
    )))
}

/// Drive one exchange to completion.
///
/// Any failure, whether opening the stream or mid-stream, sends exactly one
/// apology and stops. Nothing is retried.
pub async fn run_exchange(
    detector: Arc<dyn IntentDetector>,
    request: DetectIntentRequest,
    outbound: Outbound,
) -> ExchangeOutcome {
    let session_id = request.session_id.clone();
    let mut outcome = ExchangeOutcome::default();

    let mut stream = match detector.streaming_detect_intent(request).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(session_id = %session_id, "{} stream error: {}", detector.name(), e);
            send_apology(&outbound);
            outcome.failed = true;
            return outcome;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(response) => {
                let text = response.display_text();
                if text.is_empty() {
                    continue;
                }

                tracing::info!(session_id = %session_id, "Sending to frontend: {:?}", text);
                if outbound.send(ServerMessage::new(text)).is_err() {
                    tracing::debug!(session_id = %session_id, "Socket gone, dropping exchange");
                    return outcome;
                }
                outcome.frames_sent += 1;
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, "{} stream error: {}", detector.name(), e);
                send_apology(&outbound);
                outcome.failed = true;
                return outcome;
            }
        }
    }

    tracing::info!(session_id = %session_id, "{} stream ended", detector.name());
    outcome
}

fn send_apology(outbound: &Outbound) {
    // Best effort: the socket may already be closed
    let _ = outbound.send(ServerMessage::apology());
}
