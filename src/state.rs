use std::path::PathBuf;
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::dialogflow::IntentDetector;

/// Shared, read-only state handed to every connection
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn IntentDetector>,
    /// Language code sent with every query
    pub language_code: String,
    pub enable_partial_response: bool,
    /// Directory the browser client is served from
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(detector: Arc<dyn IntentDetector>, config: &BridgeConfig) -> Self {
        Self {
            detector,
            language_code: config.dialogflow.language_code.clone(),
            enable_partial_response: config.dialogflow.enable_partial_response,
            static_dir: config.static_dir.clone(),
        }
    }
}
