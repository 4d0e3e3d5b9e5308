use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    common::types::{ChannelId, UserId},
    protocol::TrackRef,
};

/// Who asked for an entry; the name is only used for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
}

impl Requester {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            name: name.into(),
        }
    }
}

/// What a sink needs to start playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSource {
    pub stream_url: String,
    pub duration_ms: u64,
}

/// One queued unit of playback.
#[derive(Debug, Clone)]
pub struct VoiceEntry {
    pub requester: Requester,
    pub reply_channel: ChannelId,
    pub track: TrackRef,
    pub source: PlaybackSource,
}

impl VoiceEntry {
    pub fn new(
        requester: Requester,
        reply_channel: ChannelId,
        track: TrackRef,
        stream_url: impl Into<String>,
    ) -> Self {
        let source = PlaybackSource {
            stream_url: stream_url.into(),
            duration_ms: track.duration_ms,
        };
        Self {
            requester,
            reply_channel,
            track,
            source,
        }
    }

    pub fn title(&self) -> String {
        self.track.display_name()
    }
}

impl fmt::Display for VoiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*{}* requested by {}", self.title(), self.requester.name)?;
        if self.source.duration_ms > 0 {
            let secs = self.source.duration_ms / 1000;
            write!(f, " [length: {}m {}s]", secs / 60, secs % 60)?;
        }
        Ok(())
    }
}
