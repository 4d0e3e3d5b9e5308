use serde::{Deserialize, Serialize};

use crate::protocol::tracks::{TrackRef, deserialize_millis};

pub const PLAY_ACTION: &str = "play";

fn default_action() -> String {
    PLAY_ACTION.to_string()
}

/// Body of `POST /` on the player's control endpoint.
///
/// The bridge always sends `action = "play"`. The player accepts bodies without
/// the field, since the only supported action is "play this track now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayNotification {
    pub id: String,
    #[serde(default = "default_action")]
    pub action: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, deserialize_with = "deserialize_millis")]
    pub duration: u64,
}

impl PlayNotification {
    pub fn play(track: &TrackRef) -> Self {
        Self {
            id: track.stream_id.clone(),
            action: default_action(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            duration: track.duration_ms,
        }
    }

    pub fn is_play(&self) -> bool {
        self.action == PLAY_ACTION
    }

    pub fn track(&self) -> TrackRef {
        TrackRef::new(&self.title, &self.artist, &self.id, self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_notification_wire_shape() {
        let notification = PlayNotification::play(&TrackRef::new("A", "X", "1", 1000));
        let value = serde_json::to_value(&notification).expect("serialize");

        assert_eq!(
            value,
            serde_json::json!({
                "id": "1",
                "action": "play",
                "title": "A",
                "artist": "X",
                "duration": 1000
            })
        );
    }

    #[test]
    fn test_body_without_action_defaults_to_play() {
        let notification: PlayNotification =
            serde_json::from_str(r#"{"id":"1","title":"A","artist":"X","duration":1000}"#)
                .expect("parse");

        assert!(notification.is_play());
        assert_eq!(notification.track(), TrackRef::new("A", "X", "1", 1000));
    }
}
