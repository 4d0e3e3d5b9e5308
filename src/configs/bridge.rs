use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BridgeConfig {
    /// Websocket address of the desktop client.
    #[serde(default = "default_desktop_url")]
    pub desktop_url: String,
    /// Player control endpoint that receives "play" notifications.
    #[serde(default = "default_control_url")]
    pub control_url: String,
    /// Label announced to the desktop client in every connect message.
    #[serde(default = "default_session_label")]
    pub session_label: String,
    /// Pairing code used instead of prompting the operator.
    #[serde(default)]
    pub pairing_code: Option<String>,
    #[serde(default = "default_request_connect_on_open")]
    pub request_connect_on_open: bool,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            desktop_url: default_desktop_url(),
            control_url: default_control_url(),
            session_label: default_session_label(),
            pairing_code: None,
            request_connect_on_open: default_request_connect_on_open(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_desktop_url() -> String {
    "ws://localhost:5672".to_string()
}

fn default_control_url() -> String {
    "http://127.0.0.1:8080/".to_string()
}

fn default_session_label() -> String {
    "deckbridge".to_string()
}

fn default_request_connect_on_open() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1_000
}
