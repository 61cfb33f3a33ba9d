//! `POST /session/restart` - 由运维显式重新触发会话初始化
//!
//! 断线和认证失败不会自动重连，这是唯一的进程内恢复途径。

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{error, info};

use crate::server::ErrorResponse;
use crate::state::AppState;

pub async fn restart(State(state): State<AppState>) -> Response {
    match state.session.start().await {
        Ok(()) => {
            info!("Session restart requested");
            (StatusCode::ACCEPTED, Json(json!({ "started": true }))).into_response()
        }
        Err(e) if e.is_guard_rejection() => {
            ErrorResponse::new(e.to_string()).with_status(StatusCode::CONFLICT)
        }
        Err(e) => {
            error!("Session restart failed: {}", e);
            ErrorResponse::new(e.to_string()).with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
