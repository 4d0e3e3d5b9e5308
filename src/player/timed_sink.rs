use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    common::types::SessionId,
    player::{CompletionSignal, PlaybackSource, PlayerError, VoiceConnector, VoiceSink},
};

const TICK_MS: u64 = 250;

struct TimedPlayback {
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

/// A sink without audio: a playback lasts as long as the track's duration, paused
/// time not counted. Tracks of unknown length play until stopped.
pub struct TimedSink {
    tick: Duration,
    playback: Mutex<Option<TimedPlayback>>,
    volume: AtomicU32, // f32 bits
    closed: AtomicBool,
}

impl TimedSink {
    pub fn new() -> Self {
        Self::with_tick(Duration::from_millis(TICK_MS))
    }

    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            playback: Mutex::new(None),
            volume: AtomicU32::new(1.0f32.to_bits()),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for TimedSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceSink for TimedSink {
    fn start(&self, source: &PlaybackSource, done: CompletionSignal) -> Result<(), PlayerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PlayerError::Sink("sink is closed".into()));
        }

        let cancel = CancellationToken::new();
        let paused = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        if let Some(previous) = self.playback.lock().replace(TimedPlayback {
            cancel: cancel.clone(),
            paused: paused.clone(),
            finished: finished.clone(),
        }) {
            previous.cancel.cancel();
        }

        let tick = self.tick;
        let length = source.duration_ms;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            let mut elapsed_ms: u64 = 0;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if !paused.load(Ordering::Acquire) {
                            elapsed_ms += tick.as_millis() as u64;
                        }
                        if length > 0 && elapsed_ms >= length {
                            break;
                        }
                    }
                }
            }
            finished.store(true, Ordering::Release);
            done.finish();
        });

        debug!("Timed playback started ({} ms)", length);
        Ok(())
    }

    fn stop(&self) {
        if let Some(playback) = self.playback.lock().as_ref() {
            playback.cancel.cancel();
        }
    }

    fn pause(&self) {
        if let Some(playback) = self.playback.lock().as_ref() {
            playback.paused.store(true, Ordering::Release);
        }
    }

    fn resume(&self) {
        if let Some(playback) = self.playback.lock().as_ref() {
            playback.paused.store(false, Ordering::Release);
        }
    }

    fn is_finished(&self) -> bool {
        self.playback
            .lock()
            .as_ref()
            .is_none_or(|p| p.finished.load(Ordering::Acquire))
    }

    fn set_volume(&self, fraction: f32) {
        self.volume.store(fraction.to_bits(), Ordering::Release);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Acquire))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.stop();
    }
}

/// Hands every session a fresh [`TimedSink`].
pub struct TimedConnector;

impl VoiceConnector for TimedConnector {
    fn connect(&self, session: &SessionId) -> Result<Arc<dyn VoiceSink>, PlayerError> {
        debug!("Attaching timed sink to session {}", session);
        Ok(Arc::new(TimedSink::new()))
    }
}
