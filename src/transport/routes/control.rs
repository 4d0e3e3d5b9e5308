use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use crate::{
    common::errors::ApiError,
    player::PlayerError,
    protocol::PlayNotification,
    server::AppState,
};

/// POST /
///
/// Play notifications from the bridge. The body is parsed as JSON whatever the
/// declared content type.
pub async fn play(State(state): State<Arc<AppState>>, body: String) -> Response {
    let notification: PlayNotification = match serde_json::from_str(&body) {
        Ok(notification) => notification,
        Err(e) => {
            warn!("Rejected control request: {}", e);
            return ApiError::bad_request(format!("Invalid play notification: {}", e), "/")
                .into_response();
        }
    };
    debug!("POST / {:?}", notification);

    if !notification.is_play() {
        return ApiError::bad_request(
            format!("Unsupported action '{}'", notification.action),
            "/",
        )
        .into_response();
    }

    match state.player.play_notification(&notification).await {
        Ok(entry_text) => {
            info!("Desktop playback forwarded: {}", entry_text);
            StatusCode::OK.into_response()
        }
        Err(PlayerError::NotFollowing) => {
            warn!(
                "Ignoring play of '{}': no session follows the desktop client",
                notification.title
            );
            StatusCode::OK.into_response()
        }
        Err(PlayerError::Resolution(e)) => ApiError::bad_gateway(e.to_string(), "/").into_response(),
        Err(e) => ApiError::internal(e.to_string(), "/").into_response(),
    }
}
