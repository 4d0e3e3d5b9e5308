use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::tracks::TrackRef;

/// Payload the desktop client sends on the connect channel when it wants a pairing code.
pub const CODE_REQUIRED: &str = "CODE_REQUIRED";

pub const CONNECT_NAMESPACE: &str = "connect";
pub const CONNECT_METHOD: &str = "connect";

#[derive(Debug, Deserialize)]
struct Envelope {
    channel: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectPayload {
    CodeRequired,
    /// Opaque auth token to read back to the client.
    Token(String),
}

/// A decoded message from the desktop client's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DesktopEvent {
    Connect(ConnectPayload),
    /// Current track changed. `None` when the client reports no track.
    Track(Option<TrackRef>),
    PlayState(bool),
    /// Full snapshot of the client's queue.
    Queue(Vec<TrackRef>),
    /// A channel we do not mirror (lyrics, shuffle, ...).
    Ignored(String),
}

impl DesktopEvent {
    /// Decodes one text frame. Returns `Ok(None)` for frames without a channel.
    pub fn decode(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let Some(channel) = envelope.channel else {
            return Ok(None);
        };

        let event = match channel.as_str() {
            "connect" => {
                let payload: String = serde_json::from_value(envelope.payload)?;
                if payload == CODE_REQUIRED {
                    Self::Connect(ConnectPayload::CodeRequired)
                } else {
                    Self::Connect(ConnectPayload::Token(payload))
                }
            }
            "track" => Self::Track(serde_json::from_value(envelope.payload)?),
            "playState" => Self::PlayState(serde_json::from_value(envelope.payload)?),
            "queue" => Self::Queue(decode_queue(envelope.payload)?),
            _ => Self::Ignored(channel),
        };
        Ok(Some(event))
    }
}

/// Queue snapshots arrive either as a bare array or wrapped as `{"items": [...]}`.
fn decode_queue(payload: Value) -> Result<Vec<TrackRef>, serde_json::Error> {
    match payload {
        Value::Object(mut map) if map.contains_key("items") => {
            serde_json::from_value(map.remove("items").unwrap_or(Value::Null))
        }
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other),
    }
}

/// Message written to the desktop client during the connect handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectMessage {
    pub namespace: &'static str,
    pub method: &'static str,
    pub arguments: Vec<String>,
}

impl ConnectMessage {
    pub fn new(label: &str, extra: Option<&str>) -> Self {
        let mut arguments = vec![label.to_string()];
        if let Some(extra) = extra {
            arguments.push(extra.to_string());
        }
        Self {
            namespace: CONNECT_NAMESPACE,
            method: CONNECT_METHOD,
            arguments,
        }
    }
}
