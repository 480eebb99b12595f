//! Deployment configuration loaded from environment variables

use std::path::PathBuf;

use crate::dialogflow::{Credentials, DialogflowError, DialogflowResult};

const DEFAULT_LOCATION: &str = "global";
const DEFAULT_LANGUAGE_CODE: &str = "en";
const DEFAULT_KEY_FILE: &str = "dialogflow-key.json";
const DEFAULT_STATIC_DIR: &str = "public";
const DEFAULT_PORT: u16 = 3000;

/// Read an env var, treating blank values as unset
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_flag(key: &str, default: bool) -> bool {
    env_non_empty(key)
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(default)
}

/// Dialogflow CX agent coordinates and credentials
#[derive(Debug, Clone)]
pub struct DialogflowConfig {
    /// Google Cloud project id
    pub project_id: Option<String>,
    /// Agent region, e.g. "global" or "us-central1"
    pub location: String,
    /// Agent id (UUID from the CX console)
    pub agent_id: Option<String>,
    /// Language code sent with every query
    pub language_code: String,
    /// REST base URL override (defaults to the regional endpoint)
    pub api_endpoint: Option<String>,
    /// Whether to request partial responses from the agent
    pub enable_partial_response: bool,
    /// Path to a service-account JSON key
    pub key_file: PathBuf,
    /// Pre-issued bearer token; takes precedence over `key_file`
    pub access_token: Option<String>,
}

impl Default for DialogflowConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: DEFAULT_LOCATION.to_string(),
            agent_id: None,
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            api_endpoint: None,
            enable_partial_response: true,
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            access_token: None,
        }
    }
}

impl DialogflowConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            project_id: env_non_empty("DIALOGFLOW_PROJECT_ID"),
            location: env_non_empty("DIALOGFLOW_LOCATION")
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            agent_id: env_non_empty("DIALOGFLOW_AGENT_ID"),
            language_code: env_non_empty("DIALOGFLOW_LANGUAGE_CODE")
                .unwrap_or_else(|| DEFAULT_LANGUAGE_CODE.to_string()),
            api_endpoint: env_non_empty("DIALOGFLOW_API_ENDPOINT"),
            enable_partial_response: env_flag("DIALOGFLOW_PARTIAL_RESPONSE", true),
            key_file: env_non_empty("GOOGLE_APPLICATION_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_FILE)),
            access_token: env_non_empty("DIALOGFLOW_ACCESS_TOKEN"),
        }
    }

    /// Regional REST endpoint unless overridden
    pub fn endpoint(&self) -> String {
        match &self.api_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-dialogflow.googleapis.com", self.location),
        }
    }

    /// `projects/{p}/locations/{l}/agents/{a}` prefix for session paths
    pub fn agent_path(&self) -> DialogflowResult<String> {
        let project_id = self.project_id.as_deref().ok_or_else(|| {
            DialogflowError::Config("DIALOGFLOW_PROJECT_ID is not set".to_string())
        })?;
        let agent_id = self.agent_id.as_deref().ok_or_else(|| {
            DialogflowError::Config("DIALOGFLOW_AGENT_ID is not set".to_string())
        })?;

        Ok(format!(
            "projects/{}/locations/{}/agents/{}",
            project_id, self.location, agent_id
        ))
    }

    /// Pick the credential source; a static token wins over the key file
    pub fn credentials(&self) -> DialogflowResult<Credentials> {
        match &self.access_token {
            Some(token) => Ok(Credentials::Static(token.clone())),
            None => Credentials::service_account_from_file(&self.key_file),
        }
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Port the HTTP/WebSocket listener binds to
    pub port: u16,
    /// Directory holding the browser client
    pub static_dir: PathBuf,
    pub dialogflow: DialogflowConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            dialogflow: DialogflowConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = match env_non_empty("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid PORT value {:?}, using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Self {
            port,
            static_dir: env_non_empty("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            dialogflow: DialogflowConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DIALOGFLOW_PROJECT_ID",
        "DIALOGFLOW_LOCATION",
        "DIALOGFLOW_AGENT_ID",
        "DIALOGFLOW_LANGUAGE_CODE",
        "DIALOGFLOW_API_ENDPOINT",
        "DIALOGFLOW_PARTIAL_RESPONSE",
        "GOOGLE_APPLICATION_CREDENTIALS",
        "DIALOGFLOW_ACCESS_TOKEN",
        "PORT",
        "STATIC_DIR",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.dialogflow.location, "global");
        assert_eq!(config.dialogflow.language_code, "en");
        assert!(config.dialogflow.enable_partial_response);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_values() {
        clear_env();
        std::env::set_var("DIALOGFLOW_PROJECT_ID", "demo-project");
        std::env::set_var("DIALOGFLOW_LOCATION", "us-central1");
        std::env::set_var("DIALOGFLOW_AGENT_ID", "agent-123");
        std::env::set_var("DIALOGFLOW_LANGUAGE_CODE", "de");
        std::env::set_var("DIALOGFLOW_PARTIAL_RESPONSE", "false");
        std::env::set_var("PORT", "8080");
        std::env::set_var("STATIC_DIR", "web");

        let config = BridgeConfig::from_env();
        clear_env();

        assert_eq!(config.port, 8080);
        assert_eq!(config.static_dir, PathBuf::from("web"));
        assert_eq!(config.dialogflow.project_id.as_deref(), Some("demo-project"));
        assert_eq!(config.dialogflow.location, "us-central1");
        assert_eq!(config.dialogflow.language_code, "de");
        assert!(!config.dialogflow.enable_partial_response);
        assert_eq!(
            config.dialogflow.endpoint(),
            "https://us-central1-dialogflow.googleapis.com"
        );
    }

    #[test]
    #[serial]
    fn test_blank_values_fall_back_to_defaults() {
        clear_env();
        std::env::set_var("DIALOGFLOW_LOCATION", "   ");
        std::env::set_var("PORT", "not-a-port");

        let config = BridgeConfig::from_env();
        clear_env();

        assert_eq!(config.port, 3000);
        assert_eq!(config.dialogflow.location, "global");
        assert!(config.dialogflow.project_id.is_none());
    }

    #[test]
    fn test_agent_path_requires_project_and_agent() {
        let mut config = DialogflowConfig::default();
        assert!(matches!(
            config.agent_path(),
            Err(DialogflowError::Config(_))
        ));

        config.project_id = Some("p".to_string());
        assert!(config.agent_path().is_err());

        config.agent_id = Some("a".to_string());
        assert_eq!(
            config.agent_path().unwrap(),
            "projects/p/locations/global/agents/a"
        );
    }

    #[test]
    fn test_endpoint_override_strips_trailing_slash() {
        let config = DialogflowConfig {
            api_endpoint: Some("http://127.0.0.1:9000/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_static_token_wins_over_key_file() {
        let config = DialogflowConfig {
            access_token: Some("ya29.token".to_string()),
            key_file: PathBuf::from("/does/not/exist.json"),
            ..Default::default()
        };
        assert!(matches!(
            config.credentials(),
            Ok(Credentials::Static(token)) if token == "ya29.token"
        ));
    }
}
