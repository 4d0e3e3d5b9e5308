use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// Volume fraction applied when a playback starts.
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Session that bridge notifications play into before anyone registers.
    #[serde(default)]
    pub follow_session: Option<String>,
    #[serde(default)]
    pub follow_channel: Option<u64>,
    /// Attach the timed sink to sessions on creation.
    #[serde(default = "default_simulate_playback")]
    pub simulate_playback: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            follow_session: None,
            follow_channel: None,
            simulate_playback: default_simulate_playback(),
        }
    }
}

fn default_volume() -> f32 {
    0.6
}

fn default_simulate_playback() -> bool {
    true
}
