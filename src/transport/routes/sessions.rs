use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    common::{
        errors::ApiError,
        types::{ChannelId, SessionId, UserId},
    },
    player::{PlayerError, Requester, ResolveError},
    server::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    pub query: String,
    pub requester: Requester,
    pub channel: ChannelId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipRequest {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub requester: Requester,
    pub channel: ChannelId,
}

fn player_error(error: PlayerError, path: String) -> Response {
    match error {
        PlayerError::NothingPlaying | PlayerError::NotFollowing | PlayerError::SessionStopped => {
            ApiError::conflict(error.to_string(), path).into_response()
        }
        PlayerError::Resolution(ResolveError::NotFound(_)) => {
            ApiError::not_found(error.to_string(), path).into_response()
        }
        PlayerError::Resolution(_) => ApiError::bad_gateway(error.to_string(), path).into_response(),
        PlayerError::Sink(_) => ApiError::internal(error.to_string(), path).into_response(),
    }
}

/// GET /sessions/{session_id}
pub async fn get_status(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
) -> Response {
    Json(state.player.status(&session_id)).into_response()
}

/// POST /sessions/{session_id}/queue
pub async fn enqueue(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueueRequest>,
) -> Response {
    match state
        .player
        .enqueue(&session_id, body.requester, body.channel, &body.query)
        .await
    {
        Ok(enqueued) => Json(enqueued).into_response(),
        Err(e) => player_error(e, format!("/sessions/{}/queue", session_id)),
    }
}

/// POST /sessions/{session_id}/skip
pub async fn skip(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SkipRequest>,
) -> Response {
    match state.player.skip(&session_id, body.user_id) {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => player_error(e, format!("/sessions/{}/skip", session_id)),
    }
}

/// POST /sessions/{session_id}/pause
pub async fn pause(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    state.player.pause(&session_id);
    StatusCode::NO_CONTENT
}

/// POST /sessions/{session_id}/resume
pub async fn resume(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    state.player.resume(&session_id);
    StatusCode::NO_CONTENT
}

/// PATCH /sessions/{session_id}/volume
pub async fn set_volume(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<VolumeRequest>,
) -> Response {
    match state.player.set_volume(&session_id, body.volume) {
        Ok(fraction) => Json(json!({ "volume": fraction })).into_response(),
        Err(e) => player_error(e, format!("/sessions/{}/volume", session_id)),
    }
}

/// POST /sessions/{session_id}/register
pub async fn register(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    match state
        .player
        .register(&session_id, body.requester, body.channel)
    {
        Ok(target) => Json(target).into_response(),
        Err(e) => player_error(e, format!("/sessions/{}/register", session_id)),
    }
}

/// DELETE /sessions/{session_id}
pub async fn stop(
    Path(session_id): Path<SessionId>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("DELETE /sessions/{}", session_id);
    if state.player.stop(&session_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        ApiError::not_found("Session not found", format!("/sessions/{}", session_id))
            .into_response()
    }
}
