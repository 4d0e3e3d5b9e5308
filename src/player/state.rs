use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    common::types::{ChannelId, SessionId, UserId},
    player::{
        CompletionSignal, PlayerError, VoiceEntry, VoiceSink,
        sink::LoopWake,
    },
};

/// A line of text for a session's chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub channel: ChannelId,
    pub text: String,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub session_id: SessionId,
    /// Display of the current entry, or `"nothing"`.
    pub now_playing: String,
    pub playing: bool,
    pub skip_votes: usize,
    pub volume: f32,
    pub queued: Vec<String>,
    pub connected: bool,
}

impl StatusSnapshot {
    /// Status of a session that has no state yet.
    pub fn idle(session_id: SessionId, volume: f32) -> Self {
        Self {
            session_id,
            now_playing: "nothing".to_string(),
            playing: false,
            skip_votes: 0,
            volume,
            queued: Vec::new(),
            connected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipOutcome {
    pub votes: usize,
}

struct VoiceInner {
    current: Option<Arc<VoiceEntry>>,
    queue: VecDeque<Arc<VoiceEntry>>,
    skip_votes: HashSet<UserId>,
    sink: Option<Arc<dyn VoiceSink>>,
    volume: f32,
    /// Id of the latest started playback; completions for older ones are stale.
    playback: u64,
}

impl VoiceInner {
    fn is_playing(&self) -> bool {
        self.current.is_some() && self.sink.as_ref().is_some_and(|s| !s.is_finished())
    }

    fn playing_sink(&self) -> Option<&Arc<dyn VoiceSink>> {
        if self.is_playing() {
            self.sink.as_ref()
        } else {
            None
        }
    }
}

/// Playback state of one voice session.
///
/// A dedicated loop task owns starting entries: it is woken by enqueues, sink
/// attachment and completion signals, and is the only writer of the current entry.
pub struct GuildVoiceState {
    session_id: SessionId,
    default_volume: f32,
    inner: Mutex<VoiceInner>,
    wake_tx: mpsc::UnboundedSender<LoopWake>,
    announcements: flume::Sender<Announcement>,
    cancel_token: CancellationToken,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl GuildVoiceState {
    /// Creates the state and spawns its playback loop. Must be called inside a runtime.
    pub fn spawn(
        session_id: SessionId,
        default_volume: f32,
        announcements: flume::Sender<Announcement>,
    ) -> Arc<Self> {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let state = Arc::new(Self {
            session_id,
            default_volume,
            inner: Mutex::new(VoiceInner {
                current: None,
                queue: VecDeque::new(),
                skip_votes: HashSet::new(),
                sink: None,
                volume: default_volume,
                playback: 0,
            }),
            wake_tx,
            announcements,
            cancel_token: cancel_token.clone(),
            loop_task: Mutex::new(None),
        });

        let task = tokio::spawn(playback_loop(
            Arc::downgrade(&state),
            wake_rx,
            cancel_token,
        ));
        *state.loop_task.lock() = Some(task);
        state
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn has_sink(&self) -> bool {
        self.inner.lock().sink.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().is_playing()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Connects a sink. Replacing a sink restarts the current entry on the new one.
    pub fn attach(&self, sink: Arc<dyn VoiceSink>) {
        let previous = {
            let mut inner = self.inner.lock();
            if self.cancel_token.is_cancelled() {
                drop(inner);
                debug!("Session {} is stopped, closing new sink", self.session_id);
                sink.close();
                return;
            }
            if inner.is_playing() {
                if let Some(current) = inner.current.clone() {
                    inner.queue.push_front(current);
                }
            }
            inner.sink.replace(sink)
        };
        if let Some(previous) = previous {
            debug!("Replacing voice sink of session {}", self.session_id);
            previous.stop();
            previous.close();
        }
        let _ = self.wake_tx.send(LoopWake::SinkAttached);
    }

    /// Appends an entry and returns its 1-based position in the queue.
    ///
    /// Fails with [`PlayerError::SessionStopped`] once [`Self::stop`] has run.
    pub fn enqueue(&self, entry: VoiceEntry) -> Result<usize, PlayerError> {
        let position = {
            let mut inner = self.inner.lock();
            if self.cancel_token.is_cancelled() {
                return Err(PlayerError::SessionStopped);
            }
            inner.queue.push_back(Arc::new(entry));
            inner.queue.len()
        };
        let _ = self.wake_tx.send(LoopWake::QueueChanged);
        Ok(position)
    }

    /// Puts an entry at the head of the queue and ends the current one, so the
    /// loop starts it next.
    pub fn play_now(&self, entry: VoiceEntry) -> Result<(), PlayerError> {
        {
            let mut inner = self.inner.lock();
            if self.cancel_token.is_cancelled() {
                return Err(PlayerError::SessionStopped);
            }
            inner.queue.push_front(Arc::new(entry));
            if let Some(sink) = inner.playing_sink() {
                sink.stop();
            }
        }
        let _ = self.wake_tx.send(LoopWake::QueueChanged);
        Ok(())
    }

    /// Records the vote and ends the current entry. A single vote is enough.
    pub fn skip(&self, requester: UserId) -> Result<SkipOutcome, PlayerError> {
        let mut inner = self.inner.lock();
        let Some(sink) = inner.playing_sink().cloned() else {
            return Err(PlayerError::NothingPlaying);
        };

        inner.skip_votes.insert(requester);
        let votes = inner.skip_votes.len();
        inner.skip_votes.clear();
        sink.stop();
        info!(
            "Session {}: skip by {} ({} vote(s))",
            self.session_id, requester, votes
        );
        Ok(SkipOutcome { votes })
    }

    pub fn pause(&self) {
        if let Some(sink) = self.inner.lock().playing_sink() {
            sink.pause();
        }
    }

    pub fn resume(&self) {
        if let Some(sink) = self.inner.lock().playing_sink() {
            sink.resume();
        }
    }

    /// `percent` is taken at face value: 50 becomes 0.5, nothing is clamped.
    pub fn set_volume(&self, percent: i32) -> Result<f32, PlayerError> {
        let mut inner = self.inner.lock();
        let Some(sink) = inner.playing_sink().cloned() else {
            return Err(PlayerError::NothingPlaying);
        };
        let fraction = percent as f32 / 100.0;
        sink.set_volume(fraction);
        inner.volume = fraction;
        Ok(fraction)
    }

    pub fn status(&self) -> StatusSnapshot {
        let inner = self.inner.lock();
        let playing = inner.is_playing();
        StatusSnapshot {
            session_id: self.session_id.clone(),
            now_playing: inner
                .current
                .as_ref()
                .filter(|_| playing)
                .map(|entry| entry.to_string())
                .unwrap_or_else(|| "nothing".to_string()),
            playing,
            skip_votes: inner.skip_votes.len(),
            volume: inner.volume,
            queued: inner.queue.iter().map(|e| e.title()).collect(),
            connected: inner.sink.is_some(),
        }
    }

    /// Tears the session down. Failures are ignored.
    pub fn stop(&self) {
        let (sink, was_playing) = {
            let mut inner = self.inner.lock();
            // Cancelled under the lock, so a concurrent enqueue either lands
            // before the clear below or is refused.
            self.cancel_token.cancel();
            inner.queue.clear();
            inner.skip_votes.clear();
            let was_playing = inner.current.take().is_some();
            (inner.sink.take(), was_playing)
        };
        if let Some(sink) = sink {
            if was_playing {
                sink.stop();
            }
            sink.close();
        }
        if let Some(task) = self.loop_task.lock().take() {
            task.abort();
        }
        debug!("Session {} stopped", self.session_id);
    }

    fn announce(&self, channel: ChannelId, text: String) {
        if self
            .announcements
            .send(Announcement { channel, text })
            .is_err()
        {
            debug!("No announcement listener for session {}", self.session_id);
        }
    }

    /// One loop step: retire a finished playback and start the next entry if idle.
    fn advance(&self, wake: LoopWake) {
        let mut inner = self.inner.lock();

        if let LoopWake::Finished(playback) = wake {
            if playback != inner.playback {
                debug!(
                    "Session {}: ignoring completion of stale playback {}",
                    self.session_id, playback
                );
                return;
            }
            inner.current = None;
            inner.skip_votes.clear();
        }

        if inner.current.is_some() {
            return;
        }
        let Some(sink) = inner.sink.clone() else {
            return;
        };

        while let Some(entry) = inner.queue.pop_front() {
            inner.playback += 1;
            inner.skip_votes.clear();
            inner.volume = self.default_volume;
            sink.set_volume(self.default_volume);

            let signal = CompletionSignal::new(inner.playback, self.wake_tx.clone());
            match sink.start(&entry.source, signal) {
                Ok(()) => {
                    info!("Session {}: now playing {}", self.session_id, entry.title());
                    self.announce(entry.reply_channel, format!("Now playing {}", entry));
                    inner.current = Some(entry);
                    return;
                }
                Err(e) => {
                    warn!(
                        "Session {}: could not start {}: {}",
                        self.session_id,
                        entry.title(),
                        e
                    );
                    self.announce(
                        entry.reply_channel,
                        format!("Could not play {}: {}", entry, e),
                    );
                }
            }
        }
    }
}

async fn playback_loop(
    state: Weak<GuildVoiceState>,
    mut wake_rx: mpsc::UnboundedReceiver<LoopWake>,
    cancel_token: CancellationToken,
) {
    loop {
        let wake = tokio::select! {
            _ = cancel_token.cancelled() => break,
            wake = wake_rx.recv() => match wake {
                Some(wake) => wake,
                None => break,
            },
        };
        let Some(state) = state.upgrade() else { break };
        state.advance(wake);
    }
}
