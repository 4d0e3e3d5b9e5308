use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::mpsc;

use crate::{
    common::types::SessionId,
    player::{PlaybackSource, PlayerError},
};

/// Wake-ups consumed by a session's playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopWake {
    /// Playback `n` ended, naturally or by being stopped.
    Finished(u64),
    QueueChanged,
    SinkAttached,
}

/// Handed to a sink with every `start`. Firing it tells the session's playback
/// loop that this playback is over; only the first call has any effect.
#[derive(Clone)]
pub struct CompletionSignal {
    playback: u64,
    fired: Arc<AtomicBool>,
    wake_tx: mpsc::UnboundedSender<LoopWake>,
}

impl CompletionSignal {
    pub(crate) fn new(playback: u64, wake_tx: mpsc::UnboundedSender<LoopWake>) -> Self {
        Self {
            playback,
            fired: Arc::new(AtomicBool::new(false)),
            wake_tx,
        }
    }

    pub fn playback(&self) -> u64 {
        self.playback
    }

    pub fn finish(&self) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            let _ = self.wake_tx.send(LoopWake::Finished(self.playback));
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// The audio output of one session.
///
/// `start` must not block and must eventually fire the signal exactly once, when
/// playback ends or when `stop` is called.
pub trait VoiceSink: Send + Sync {
    fn start(&self, source: &PlaybackSource, done: CompletionSignal) -> Result<(), PlayerError>;
    fn stop(&self);
    fn pause(&self);
    fn resume(&self);
    fn is_finished(&self) -> bool;
    fn set_volume(&self, fraction: f32);
    fn volume(&self) -> f32;
    /// Leaves the voice channel. The sink is not reused afterwards.
    fn close(&self);
}

/// Joins a session's voice channel on demand.
pub trait VoiceConnector: Send + Sync {
    fn connect(&self, session: &SessionId) -> Result<Arc<dyn VoiceSink>, PlayerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let signal = CompletionSignal::new(3, tx);
        let copy = signal.clone();

        signal.finish();
        copy.finish();

        assert!(copy.has_fired());
        assert_eq!(rx.try_recv(), Ok(LoopWake::Finished(3)));
        assert!(rx.try_recv().is_err());
    }
}
