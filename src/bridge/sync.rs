use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    bridge::{
        BridgeError, ConnectionPhase, ControlNotifier, HandshakeInstruction, Operator,
        TrackCatalog,
    },
    protocol::{ConnectPayload, DesktopEvent, PlayNotification, TrackRef},
};

/// What a play-state evaluation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The desktop client is not playing.
    NotPlaying,
    /// Playing, but no current track is known yet.
    NoCurrentTrack,
    /// The resolved track was already forwarded.
    AlreadySent(String),
    /// A play notification for this id was delivered.
    Sent(String),
}

struct MirrorState {
    catalog: TrackCatalog,
    current: Option<TrackRef>,
    playing: bool,
}

/// Mirrors the desktop client's queue, current track and play state, and forwards
/// each newly playing track to the player exactly once.
pub struct SyncBridge {
    label: String,
    /// Catalog, current track and play state are read together under this one lock.
    mirror: Mutex<MirrorState>,
    phase: Mutex<ConnectionPhase>,
    /// Id of the last delivered track. Held for the whole decide/send/commit step so
    /// evaluations never overlap; the mirror lock is released before sending.
    last_sent: tokio::sync::Mutex<Option<String>>,
    notifier: Arc<dyn ControlNotifier>,
    operator: Arc<dyn Operator>,
}

impl SyncBridge {
    pub fn new(
        label: impl Into<String>,
        notifier: Arc<dyn ControlNotifier>,
        operator: Arc<dyn Operator>,
    ) -> Self {
        Self {
            label: label.into(),
            mirror: Mutex::new(MirrorState {
                catalog: TrackCatalog::new(),
                current: None,
                playing: false,
            }),
            phase: Mutex::new(ConnectionPhase::AwaitingConnect),
            last_sent: tokio::sync::Mutex::new(None),
            notifier,
            operator,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.lock()
    }

    /// Called for every new connection; the handshake starts over.
    pub fn reset_connection(&self) {
        let mut phase = self.phase.lock();
        if *phase != ConnectionPhase::AwaitingConnect {
            debug!("Handshake reset from {:?}", *phase);
        }
        *phase = ConnectionPhase::AwaitingConnect;
    }

    pub fn catalog_titles(&self) -> Vec<String> {
        self.mirror.lock().catalog.titles()
    }

    pub fn current_track(&self) -> Option<TrackRef> {
        self.mirror.lock().current.clone()
    }

    pub async fn last_sent(&self) -> Option<String> {
        self.last_sent.lock().await.clone()
    }

    /// Decodes and applies one text frame from the desktop client.
    pub async fn handle_text(
        &self,
        text: &str,
        outbound: &flume::Sender<HandshakeInstruction>,
    ) -> Result<(), BridgeError> {
        match DesktopEvent::decode(text)? {
            Some(event) => self.handle_event(event, outbound).await,
            None => {
                debug!("Desktop message without channel: {}", text);
                Ok(())
            }
        }
    }

    pub async fn handle_event(
        &self,
        event: DesktopEvent,
        outbound: &flume::Sender<HandshakeInstruction>,
    ) -> Result<(), BridgeError> {
        match event {
            DesktopEvent::Connect(payload) => self.on_connect(payload, outbound).await,
            DesktopEvent::Queue(snapshot) => {
                self.replace_catalog(snapshot);
                Ok(())
            }
            DesktopEvent::Track(track) => {
                if self.set_current_track(track) {
                    self.sync().await.map(|_| ())
                } else {
                    Ok(())
                }
            }
            DesktopEvent::PlayState(playing) => self.on_play_state(playing).await.map(|_| ()),
            DesktopEvent::Ignored(channel) => {
                debug!("Ignoring desktop channel '{}'", channel);
                Ok(())
            }
        }
    }

    async fn on_connect(
        &self,
        payload: ConnectPayload,
        outbound: &flume::Sender<HandshakeInstruction>,
    ) -> Result<(), BridgeError> {
        let instruction = match payload {
            ConnectPayload::CodeRequired => {
                *self.phase.lock() = ConnectionPhase::CodeRequired;
                info!("Desktop client requires a pairing code");
                let code = self.operator.request_code().await?;
                HandshakeInstruction::SendCode(code)
            }
            ConnectPayload::Token(token) => {
                *self.phase.lock() = ConnectionPhase::Authenticated;
                info!("Desktop client authenticated the bridge");
                HandshakeInstruction::AuthReadback(token)
            }
        };

        if outbound.send(instruction).is_err() {
            debug!("Connection closed before the handshake reply was queued");
        }
        Ok(())
    }

    pub fn replace_catalog(&self, snapshot: Vec<TrackRef>) {
        let mut mirror = self.mirror.lock();
        mirror.catalog.replace(snapshot);
        debug!("Track catalog replaced ({} titles)", mirror.catalog.len());
    }

    /// Returns whether the desktop client is currently playing, in which case the
    /// new track should be forwarded right away.
    pub fn set_current_track(&self, track: Option<TrackRef>) -> bool {
        let mut mirror = self.mirror.lock();
        debug!(
            "Current track set: {}",
            track.as_ref().map(|t| t.title.as_str()).unwrap_or("<none>")
        );
        mirror.current = track;
        mirror.playing
    }

    pub async fn on_play_state(&self, playing: bool) -> Result<SyncOutcome, BridgeError> {
        debug!("Desktop play state: {}", playing);
        self.mirror.lock().playing = playing;

        if playing {
            self.sync().await
        } else {
            self.notifier.stopped().await?;
            Ok(SyncOutcome::NotPlaying)
        }
    }

    async fn sync(&self) -> Result<SyncOutcome, BridgeError> {
        let mut last_sent = self.last_sent.lock().await;

        let track = {
            let mirror = self.mirror.lock();
            if !mirror.playing {
                return Ok(SyncOutcome::NotPlaying);
            }
            let Some(current) = mirror.current.as_ref() else {
                return Ok(SyncOutcome::NoCurrentTrack);
            };
            mirror
                .catalog
                .get(&current.title)
                .cloned()
                .ok_or_else(|| BridgeError::TrackNotQueued(current.title.clone()))?
        };

        if last_sent.as_deref() == Some(track.stream_id.as_str()) {
            return Ok(SyncOutcome::AlreadySent(track.stream_id));
        }

        info!("Forwarding play for '{}' ({})", track.title, track.stream_id);
        if let Err(e) = self.notifier.play(&PlayNotification::play(&track)).await {
            warn!("Play for '{}' not delivered: {}", track.stream_id, e);
            return Err(e);
        }

        *last_sent = Some(track.stream_id.clone());
        Ok(SyncOutcome::Sent(track.stream_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<PlayNotification>>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ControlNotifier for RecordingNotifier {
        async fn play(&self, notification: &PlayNotification) -> Result<(), BridgeError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(BridgeError::DeliveryFailed("connection refused".into()));
            }
            self.sent.lock().push(notification.clone());
            Ok(())
        }
    }

    struct FixedOperator(&'static str);

    #[async_trait]
    impl Operator for FixedOperator {
        async fn request_code(&self) -> Result<String, BridgeError> {
            Ok(self.0.to_string())
        }

        async fn confirm_retry(&self, _error: &BridgeError) -> bool {
            false
        }
    }

    fn bridge() -> (SyncBridge, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = SyncBridge::new("Deck", notifier.clone(), Arc::new(FixedOperator("4821")));
        (bridge, notifier)
    }

    async fn feed(bridge: &SyncBridge, frames: &[&str]) -> Vec<Result<(), BridgeError>> {
        let (tx, _rx) = flume::unbounded();
        let mut results = Vec::new();
        for frame in frames {
            results.push(bridge.handle_text(frame, &tx).await);
        }
        results
    }

    const QUEUE_A: &str =
        r#"{"channel":"queue","payload":[{"title":"A","id":"1","artist":"X","duration":1000}]}"#;
    const TRACK_A: &str = r#"{"channel":"track","payload":{"title":"A"}}"#;
    const PLAYING: &str = r#"{"channel":"playState","payload":true}"#;
    const PAUSED: &str = r#"{"channel":"playState","payload":false}"#;

    #[tokio::test]
    async fn test_scenario_sends_exactly_one_play() {
        let (bridge, notifier) = bridge();

        for result in feed(&bridge, &[QUEUE_A, TRACK_A, PLAYING, PLAYING]).await {
            assert!(result.is_ok());
        }

        let sent = notifier.sent.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            serde_json::to_value(&sent[0]).expect("serialize"),
            serde_json::json!({
                "id": "1",
                "action": "play",
                "title": "A",
                "artist": "X",
                "duration": 1000
            })
        );
        assert_eq!(bridge.last_sent().await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_repeated_play_state_is_deduplicated() {
        let (bridge, notifier) = bridge();
        feed(&bridge, &[QUEUE_A, TRACK_A]).await;

        assert_eq!(
            bridge.on_play_state(true).await.expect("sync"),
            SyncOutcome::Sent("1".into())
        );
        assert_eq!(
            bridge.on_play_state(true).await.expect("sync"),
            SyncOutcome::AlreadySent("1".into())
        );
        assert_eq!(notifier.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_title_is_track_not_queued() {
        let (bridge, notifier) = bridge();
        feed(&bridge, &[QUEUE_A, r#"{"channel":"track","payload":{"title":"B"}}"#]).await;

        let result = bridge.on_play_state(true).await;
        assert!(matches!(result, Err(BridgeError::TrackNotQueued(ref t)) if t == "B"));
        assert!(notifier.sent.lock().is_empty());
        assert_eq!(bridge.last_sent().await, None);
    }

    #[tokio::test]
    async fn test_no_current_track_is_a_no_op() {
        let (bridge, notifier) = bridge();
        feed(&bridge, &[QUEUE_A]).await;

        assert_eq!(
            bridge.on_play_state(true).await.expect("sync"),
            SyncOutcome::NoCurrentTrack
        );
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried_on_next_play_state() {
        let (bridge, notifier) = bridge();
        feed(&bridge, &[QUEUE_A, TRACK_A]).await;

        notifier.failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            bridge.on_play_state(true).await,
            Err(BridgeError::DeliveryFailed(_))
        ));
        assert_eq!(bridge.last_sent().await, None);

        notifier.failing.store(false, Ordering::SeqCst);
        assert_eq!(
            bridge.on_play_state(true).await.expect("sync"),
            SyncOutcome::Sent("1".into())
        );
        assert_eq!(notifier.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_track_change_while_playing_forwards_new_track() {
        let (bridge, notifier) = bridge();
        let queue = r#"{"channel":"queue","payload":[
            {"title":"A","id":"1","artist":"X","duration":1000},
            {"title":"B","id":"2","artist":"Y","duration":2000}]}"#;
        let track_b = r#"{"channel":"track","payload":{"title":"B"}}"#;

        feed(&bridge, &[queue, TRACK_A, PLAYING, track_b, PLAYING, TRACK_A]).await;

        let ids: Vec<String> = notifier.sent.lock().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec!["1", "2", "1"]);
    }

    #[tokio::test]
    async fn test_pause_leaves_last_sent_untouched() {
        let (bridge, notifier) = bridge();
        feed(&bridge, &[QUEUE_A, TRACK_A, PLAYING, PAUSED]).await;

        assert_eq!(bridge.last_sent().await.as_deref(), Some("1"));
        assert_eq!(
            bridge.on_play_state(false).await.expect("pause"),
            SyncOutcome::NotPlaying
        );

        // Resuming the same track does not resend it.
        feed(&bridge, &[PLAYING]).await;
        assert_eq!(notifier.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_track_event_while_paused_sends_nothing() {
        let (bridge, notifier) = bridge();
        feed(&bridge, &[QUEUE_A, TRACK_A]).await;

        assert_eq!(bridge.current_track().map(|t| t.title), Some("A".to_string()));
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_handshake_replies_in_order() {
        let (bridge, _notifier) = bridge();
        let (tx, rx) = flume::unbounded();

        assert_eq!(bridge.phase(), ConnectionPhase::AwaitingConnect);
        bridge
            .handle_text(r#"{"channel":"connect","payload":"CODE_REQUIRED"}"#, &tx)
            .await
            .expect("code");
        assert_eq!(bridge.phase(), ConnectionPhase::CodeRequired);

        bridge
            .handle_text(r#"{"channel":"connect","payload":"tok-9"}"#, &tx)
            .await
            .expect("token");
        assert_eq!(bridge.phase(), ConnectionPhase::Authenticated);

        let queued: Vec<HandshakeInstruction> = rx.drain().collect();
        assert_eq!(
            queued,
            vec![
                HandshakeInstruction::SendCode("4821".into()),
                HandshakeInstruction::AuthReadback("tok-9".into()),
            ]
        );

        bridge.reset_connection();
        assert_eq!(bridge.phase(), ConnectionPhase::AwaitingConnect);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_reported() {
        let (bridge, _notifier) = bridge();
        let results = feed(&bridge, &["{", r#"{"channel":"playState","payload":3}"#]).await;

        assert!(results.iter().all(|r| matches!(r, Err(BridgeError::Decode(_)))));
        assert!(bridge.catalog_titles().is_empty());
    }
}
