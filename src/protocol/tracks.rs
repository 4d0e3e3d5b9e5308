use serde::{Deserialize, Deserializer, Serialize};

/// Metadata of one playable track.
///
/// The same shape is used for the desktop client's track objects (which carry
/// `id` and `duration` keys, plus fields we ignore) and for tracks produced by
/// the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(rename = "id", default)]
    pub stream_id: String,
    #[serde(
        rename = "duration",
        default,
        deserialize_with = "deserialize_millis"
    )]
    pub duration_ms: u64,
}

impl TrackRef {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        stream_id: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            stream_id: stream_id.into(),
            duration_ms,
        }
    }

    /// `title - artist`, or just the title when the artist is unknown.
    pub fn display_name(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

/// Accepts a duration in milliseconds as a JSON number or a numeric string.
pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: serde_json::Value = Deserialize::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(0),
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| serde::de::Error::custom("duration must be non-negative")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid duration '{}'", s))),
        _ => Err(serde::de::Error::custom("expected number or string duration")),
    }
}
