use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    server::AppState,
    transport::{
        middleware::add_response_headers,
        routes::{control, sessions},
    },
};

/// The player's HTTP surface. `POST /` is the bridge's control endpoint and is
/// not authenticated.
pub fn router(state: Arc<AppState>) -> Router {
    let session_routes = Router::new()
        .route(
            "/{session_id}",
            get(sessions::get_status).delete(sessions::stop),
        )
        .route("/{session_id}/queue", post(sessions::enqueue))
        .route("/{session_id}/skip", post(sessions::skip))
        .route("/{session_id}/pause", post(sessions::pause))
        .route("/{session_id}/resume", post(sessions::resume))
        .route("/{session_id}/volume", patch(sessions::set_volume))
        .route("/{session_id}/register", post(sessions::register));

    Router::new()
        .route("/", post(control::play))
        .nest("/sessions", session_routes)
        .layer(middleware::from_fn(add_response_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        common::types::{ChannelId, SessionId},
        configs::Config,
        player::{
            PlayerService, Requester, ResolveError, ResolvedTrack, TimedConnector, TrackResolver,
        },
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
                return Err(ResolveError::failed("missing", "catalog unavailable"));
            }
            Ok(ResolvedTrack {
                track: track.clone(),
                stream_url: format!("https://cdn/{}", track.stream_id),
            })
        }
    }

    fn app() -> (Router, Arc<PlayerService>) {
        let config = Config::default();
        let (tx, _rx) = flume::unbounded();
        let player = Arc::new(PlayerService::new(
            &config.player,
            Arc::new(StaticResolver),
            Some(Arc::new(TimedConnector)),
            tx,
        ));
        let state = Arc::new(AppState::new(player.clone(), config));
        (router(state), player)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn wait_playing(player: &PlayerService, session: &SessionId) {
        for _ in 0..100 {
            if player.status(session).playing {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {} never started playing", session);
    }

    #[tokio::test]
    async fn test_control_endpoint_plays_in_followed_session() {
        let (app, player) = app();
        let session = SessionId::from("guild");
        player
            .register(&session, Requester::new(1, "Ann"), ChannelId(2))
            .expect("registered");

        // No content type, as sent by minimal clients.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .body(Body::from(
                        r#"{"id":"1","action":"play","title":"A","artist":"X","duration":60000}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Deckbridge-Api-Version").and_then(|v| v.to_str().ok()),
            Some("1")
        );

        wait_playing(&player, &session).await;
        assert!(player.status(&session).now_playing.starts_with("*A - X*"));
    }

    #[tokio::test]
    async fn test_control_endpoint_without_follower_is_accepted() {
        let (app, player) = app();
        let (status, _) = send(
            &app,
            "POST",
            "/",
            Some(json!({"id": "1", "action": "play", "title": "A", "artist": "X", "duration": 1000})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(player.session_count(), 0);
    }

    #[tokio::test]
    async fn test_control_endpoint_rejects_bad_bodies() {
        let (app, _player) = app();

        let (status, body) = send(&app, "POST", "/", Some(json!({"title": "A"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert_eq!(body["path"], "/");

        let (status, _) = send(
            &app,
            "POST",
            "/",
            Some(json!({"id": "1", "action": "pause", "title": "A"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_control_endpoint_reports_resolution_failure() {
        let (app, player) = app();
        player
            .register(&SessionId::from("guild"), Requester::new(1, "Ann"), ChannelId(2))
            .expect("registered");

        let (status, body) = send(
            &app,
            "POST",
            "/",
            Some(json!({"id": "missing", "title": "Gone", "artist": "X", "duration": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"].as_str().unwrap_or_default().contains("missing"));
    }

    #[tokio::test]
    async fn test_session_routes() {
        let (app, player) = app();
        let session = SessionId::from("guild");

        let (status, body) = send(&app, "GET", "/sessions/guild", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nowPlaying"], "nothing");

        let (status, _) = send(&app, "POST", "/sessions/guild/skip", Some(json!({"userId": 1}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            "POST",
            "/sessions/guild/queue",
            Some(json!({"query": "song", "requester": {"id": 1, "name": "Bob"}, "channel": 9})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entry"], "*Song - X* requested by Bob");
        wait_playing(&player, &session).await;

        let (status, body) = send(&app, "PATCH", "/sessions/guild/volume", Some(json!({"volume": 50}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["volume"], 0.5);

        let (status, _) = send(&app, "POST", "/sessions/guild/pause", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, "POST", "/sessions/guild/skip", Some(json!({"userId": 1}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["votes"], 1);

        let (status, _) = send(&app, "DELETE", "/sessions/guild", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", "/sessions/guild", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_query_is_not_found() {
        let (app, _player) = app();
        let (status, body) = send(
            &app,
            "POST",
            "/sessions/guild/queue",
            Some(json!({"query": "nope", "requester": {"id": 1, "name": "Bob"}, "channel": 9})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "no results for 'nope'");
    }
}
