use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    common::types::{ChannelId, SessionId, UserId},
    configs::PlayerConfig,
    player::{
        Announcement, GuildVoiceState, PlayerError, Requester, SkipOutcome, StatusSnapshot,
        TrackResolver, VoiceConnector, VoiceEntry, VoiceSink,
    },
    protocol::PlayNotification,
};

const STOPPED_SESSION_RETRIES: usize = 2;

/// Session that bridge notifications play into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowTarget {
    pub session_id: SessionId,
    pub requester: Requester,
    pub channel: ChannelId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enqueued {
    pub entry: String,
    pub position: usize,
}

/// Routes every player operation to the right session.
pub struct PlayerService {
    sessions: DashMap<SessionId, Arc<GuildVoiceState>>,
    resolver: Arc<dyn TrackResolver>,
    connector: Option<Arc<dyn VoiceConnector>>,
    announcements: flume::Sender<Announcement>,
    follow: Mutex<Option<FollowTarget>>,
    default_volume: f32,
}

impl PlayerService {
    pub fn new(
        config: &PlayerConfig,
        resolver: Arc<dyn TrackResolver>,
        connector: Option<Arc<dyn VoiceConnector>>,
        announcements: flume::Sender<Announcement>,
    ) -> Self {
        let follow = config.follow_session.as_ref().map(|session| FollowTarget {
            session_id: SessionId::from(session.as_str()),
            requester: Requester::new(0, "desktop"),
            channel: ChannelId(config.follow_channel.unwrap_or_default()),
        });
        if let Some(target) = &follow {
            info!("Following desktop playback into session {}", target.session_id);
        }

        Self {
            sessions: DashMap::new(),
            resolver,
            connector,
            announcements,
            follow: Mutex::new(follow),
            default_volume: config.default_volume,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn find(&self, session_id: &SessionId) -> Option<Arc<GuildVoiceState>> {
        self.sessions
            .get(session_id)
            .map(|state| state.value().clone())
    }

    /// Returns the session's state, creating it on first use.
    pub fn session(&self, session_id: &SessionId) -> Arc<GuildVoiceState> {
        self.sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                debug!("Creating voice state for session {}", session_id);
                GuildVoiceState::spawn(
                    session_id.clone(),
                    self.default_volume,
                    self.announcements.clone(),
                )
            })
            .value()
            .clone()
    }

    /// Like [`Self::session`], and joins voice through the connector if needed.
    pub fn summon(&self, session_id: &SessionId) -> Result<Arc<GuildVoiceState>, PlayerError> {
        let state = self.session(session_id);
        if !state.has_sink() {
            if let Some(connector) = &self.connector {
                state.attach(connector.connect(session_id)?);
            }
        }
        Ok(state)
    }

    pub fn attach_sink(&self, session_id: &SessionId, sink: Arc<dyn VoiceSink>) {
        self.session(session_id).attach(sink);
    }

    pub fn register(
        &self,
        session_id: &SessionId,
        requester: Requester,
        channel: ChannelId,
    ) -> Result<FollowTarget, PlayerError> {
        self.summon(session_id)?;
        let target = FollowTarget {
            session_id: session_id.clone(),
            requester,
            channel,
        };
        info!(
            "Session {} now follows desktop playback for {}",
            session_id, target.requester.name
        );
        *self.follow.lock() = Some(target.clone());
        Ok(target)
    }

    pub fn follow_target(&self) -> Option<FollowTarget> {
        self.follow.lock().clone()
    }

    pub async fn enqueue(
        &self,
        session_id: &SessionId,
        requester: Requester,
        channel: ChannelId,
        query: &str,
    ) -> Result<Enqueued, PlayerError> {
        let resolved = match self.resolver.resolve_query(query).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Session {}: could not resolve '{}': {}", session_id, query, e);
                self.announce(
                    channel,
                    format!("An error occurred while processing this request: {}", e),
                );
                return Err(e.into());
            }
        };

        let entry = VoiceEntry::new(requester, channel, resolved.track, resolved.stream_url);
        let entry_text = entry.to_string();
        let position = self.with_live_session(session_id, |state| state.enqueue(entry.clone()))?;
        self.announce(channel, format!("Enqueued {}", entry_text));

        Ok(Enqueued {
            entry: entry_text,
            position,
        })
    }

    /// Plays a track the bridge reported, ahead of anything queued.
    pub async fn play_notification(
        &self,
        notification: &PlayNotification,
    ) -> Result<String, PlayerError> {
        let Some(target) = self.follow_target() else {
            return Err(PlayerError::NotFollowing);
        };

        let resolved = match self.resolver.resolve_id(&notification.track()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.announce(target.channel, format!("Could not play {}: {}", notification.title, e));
                return Err(e.into());
            }
        };

        let entry = VoiceEntry::new(
            target.requester,
            target.channel,
            resolved.track,
            resolved.stream_url,
        );
        let entry_text = entry.to_string();
        self.with_live_session(&target.session_id, |state| state.play_now(entry.clone()))?;
        info!("Session {}: desktop switched to {}", target.session_id, entry_text);
        Ok(entry_text)
    }

    /// Runs `op` on the session, recreating it when the state it got was
    /// stopped in between.
    fn with_live_session<T>(
        &self,
        session_id: &SessionId,
        op: impl Fn(&GuildVoiceState) -> Result<T, PlayerError>,
    ) -> Result<T, PlayerError> {
        let mut attempt = 0;
        loop {
            let state = self.summon(session_id)?;
            match op(state.as_ref()) {
                Err(PlayerError::SessionStopped) if attempt < STOPPED_SESSION_RETRIES => {
                    debug!("Session {} was stopped underneath a request, recreating", session_id);
                    self.sessions
                        .remove_if(session_id, |_, current| Arc::ptr_eq(current, &state));
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub fn skip(&self, session_id: &SessionId, requester: UserId) -> Result<SkipOutcome, PlayerError> {
        match self.find(session_id) {
            Some(state) => state.skip(requester),
            None => Err(PlayerError::NothingPlaying),
        }
    }

    pub fn pause(&self, session_id: &SessionId) {
        if let Some(state) = self.find(session_id) {
            state.pause();
        }
    }

    pub fn resume(&self, session_id: &SessionId) {
        if let Some(state) = self.find(session_id) {
            state.resume();
        }
    }

    pub fn set_volume(&self, session_id: &SessionId, percent: i32) -> Result<f32, PlayerError> {
        match self.find(session_id) {
            Some(state) => state.set_volume(percent),
            None => Err(PlayerError::NothingPlaying),
        }
    }

    pub fn status(&self, session_id: &SessionId) -> StatusSnapshot {
        match self.find(session_id) {
            Some(state) => state.status(),
            None => StatusSnapshot::idle(session_id.clone(), self.default_volume),
        }
    }

    /// Removes and tears down the session. Returns whether it existed.
    pub fn stop(&self, session_id: &SessionId) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, state)) => {
                state.stop();
                info!("Stopped session {}", session_id);
                true
            }
            None => false,
        }
    }

    pub fn shutdown(&self) {
        let ids: Vec<SessionId> = self.sessions.iter().map(|s| s.key().clone()).collect();
        for id in ids {
            self.stop(&id);
        }
    }

    fn announce(&self, channel: ChannelId, text: String) {
        let _ = self.announcements.send(Announcement { channel, text });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        player::{ResolveError, ResolvedTrack, TimedConnector},
        protocol::TrackRef,
    };

    struct StaticResolver;

    #[async_trait]
    impl TrackResolver for StaticResolver {
        async fn resolve_query(&self, query: &str) -> Result<ResolvedTrack, ResolveError> {
            match query {
                "song" => Ok(ResolvedTrack {
                    track: TrackRef::new("Song", "X", "s1", 0),
                    stream_url: "https://cdn/s1".into(),
                }),
                other => Err(ResolveError::NotFound(other.to_string())),
            }
        }

        async fn resolve_id(&self, track: &TrackRef) -> Result<ResolvedTrack, ResolveError> {
            if track.stream_id == "missing" {
                return Err(ResolveError::failed("missing", "gone"));
            }
            Ok(ResolvedTrack {
                track: track.clone(),
                stream_url: format!("https://cdn/{}", track.stream_id),
            })
        }
    }

    fn service(config: PlayerConfig) -> (PlayerService, flume::Receiver<Announcement>) {
        let (tx, rx) = flume::unbounded();
        let service = PlayerService::new(
            &config,
            Arc::new(StaticResolver),
            Some(Arc::new(TimedConnector)),
            tx,
        );
        (service, rx)
    }

    async fn wait_playing(service: &PlayerService, session: &SessionId) -> StatusSnapshot {
        for _ in 0..100 {
            let status = service.status(session);
            if status.playing {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {} never started playing", session);
    }

    #[tokio::test]
    async fn test_enqueue_resolves_and_plays() {
        let (service, announcements) = service(PlayerConfig::default());
        let session = SessionId::from("guild");

        let enqueued = service
            .enqueue(&session, Requester::new(1, "Bob"), ChannelId(9), "song")
            .await
            .expect("enqueued");
        assert_eq!(enqueued.entry, "*Song - X* requested by Bob");
        assert_eq!(enqueued.position, 1);

        let status = wait_playing(&service, &session).await;
        assert_eq!(status.now_playing, "*Song - X* requested by Bob");
        assert!(
            announcements
                .drain()
                .any(|a| a.channel == ChannelId(9) && a.text.starts_with("Enqueued"))
        );
    }

    #[tokio::test]
    async fn test_unknown_query_is_reported() {
        let (service, announcements) = service(PlayerConfig::default());
        let session = SessionId::from("guild");

        let result = service
            .enqueue(&session, Requester::new(1, "Bob"), ChannelId(9), "nope")
            .await;
        assert_eq!(
            result.map(|_| ()),
            Err(PlayerError::Resolution(ResolveError::NotFound("nope".into())))
        );
        assert_eq!(service.session_count(), 0);
        let text = announcements.try_recv().expect("announcement").text;
        assert!(text.starts_with("An error occurred while processing this request"));
    }

    #[tokio::test]
    async fn test_controls_on_unknown_session() {
        let (service, _announcements) = service(PlayerConfig::default());
        let session = SessionId::from("empty");

        assert_eq!(service.skip(&session, UserId(1)), Err(PlayerError::NothingPlaying));
        assert_eq!(service.set_volume(&session, 50), Err(PlayerError::NothingPlaying));
        service.pause(&session);
        service.resume(&session);

        let status = service.status(&session);
        assert_eq!(status.now_playing, "nothing");
        assert_eq!(status.volume, 0.6);
        assert!(!service.stop(&session));
        assert_eq!(service.session_count(), 0);
    }

    #[tokio::test]
    async fn test_volume_then_status() {
        let (service, _announcements) = service(PlayerConfig::default());
        let session = SessionId::from("guild");
        service
            .enqueue(&session, Requester::new(1, "Bob"), ChannelId(9), "song")
            .await
            .expect("enqueued");
        wait_playing(&service, &session).await;

        assert_eq!(service.set_volume(&session, 50), Ok(0.5));
        assert_eq!(service.status(&session).volume, 0.5);
    }

    #[tokio::test]
    async fn test_stop_removes_session_and_next_use_recreates_it() {
        let (service, _announcements) = service(PlayerConfig::default());
        let session = SessionId::from("guild");
        service
            .enqueue(&session, Requester::new(1, "Bob"), ChannelId(9), "song")
            .await
            .expect("enqueued");
        let first = service.find(&session).expect("state");

        assert!(service.stop(&session));
        assert!(first.is_stopped());
        assert!(service.find(&session).is_none());
        assert_eq!(service.status(&session).now_playing, "nothing");

        service
            .enqueue(&session, Requester::new(1, "Bob"), ChannelId(9), "song")
            .await
            .expect("enqueued again");
        let second = service.find(&session).expect("fresh state");
        assert!(!Arc::ptr_eq(&first, &second));
        wait_playing(&service, &session).await;
    }

    #[tokio::test]
    async fn test_notification_without_follow_target() {
        let (service, _announcements) = service(PlayerConfig::default());
        let notification = PlayNotification::play(&TrackRef::new("A", "X", "1", 1000));

        assert_eq!(
            service.play_notification(&notification).await,
            Err(PlayerError::NotFollowing)
        );
        assert_eq!(service.session_count(), 0);
    }

    #[tokio::test]
    async fn test_notification_plays_in_registered_session() {
        let (service, _announcements) = service(PlayerConfig::default());
        let session = SessionId::from("guild");
        service
            .register(&session, Requester::new(3, "Ann"), ChannelId(4))
            .expect("registered");

        let notification = PlayNotification::play(&TrackRef::new("A", "X", "1", 60_000));
        let entry_text = service
            .play_notification(&notification)
            .await
            .expect("played");
        assert_eq!(entry_text, "*A - X* requested by Ann [length: 1m 0s]");

        let status = wait_playing(&service, &session).await;
        assert_eq!(status.now_playing, entry_text);
    }

    #[tokio::test]
    async fn test_follow_target_from_config() {
        let config = PlayerConfig {
            follow_session: Some("lounge".into()),
            follow_channel: Some(77),
            ..PlayerConfig::default()
        };
        let (service, _announcements) = service(config);

        let target = service.follow_target().expect("pre-registered");
        assert_eq!(target.session_id, SessionId::from("lounge"));
        assert_eq!(target.channel, ChannelId(77));

        let missing = PlayNotification::play(&TrackRef::new("Gone", "X", "missing", 0));
        assert!(matches!(
            service.play_notification(&missing).await,
            Err(PlayerError::Resolution(ResolveError::ResolutionFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_every_session() {
        let (service, _announcements) = service(PlayerConfig::default());
        let a = service.session(&SessionId::from("a"));
        let b = service.session(&SessionId::from("b"));

        service.shutdown();

        assert_eq!(service.session_count(), 0);
        assert!(a.is_stopped() && b.is_stopped());
    }

    #[tokio::test]
    async fn test_stopped_state_left_in_registry_is_replaced() {
        let (service, _announcements) = service(PlayerConfig::default());
        let session = SessionId::from("guild");
        let stale = service.session(&session);
        stale.stop();

        let enqueued = service
            .enqueue(&session, Requester::new(1, "Bob"), ChannelId(9), "song")
            .await
            .expect("enqueued into a fresh state");
        assert_eq!(enqueued.position, 1);

        let fresh = service.find(&session).expect("fresh state");
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert!(!fresh.is_stopped());
        assert!(stale.status().queued.is_empty());
        wait_playing(&service, &session).await;
    }

    #[tokio::test]
    async fn test_notification_survives_stopped_follow_session() {
        let (service, _announcements) = service(PlayerConfig::default());
        let session = SessionId::from("guild");
        service
            .register(&session, Requester::new(3, "Ann"), ChannelId(4))
            .expect("registered");
        let stale = service.find(&session).expect("state");
        stale.stop();

        let notification = PlayNotification::play(&TrackRef::new("A", "X", "1", 60_000));
        service
            .play_notification(&notification)
            .await
            .expect("played");

        let status = wait_playing(&service, &session).await;
        assert!(status.now_playing.starts_with("*A - X*"));
        assert!(!Arc::ptr_eq(&stale, &service.find(&session).expect("fresh state")));
    }
}
