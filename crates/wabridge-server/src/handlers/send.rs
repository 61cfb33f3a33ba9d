//! `POST /send` - 出站消息

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use wabridge_session::normalize_chat_id;

use crate::server::ErrorResponse;
use crate::state::AppState;

/// 发送请求
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub message: String,
}

/// 先检查连接：未连接时直接返回 503，请求体的校验在此之后，也不会调用发送
pub async fn send(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    if !state.store.is_connected() {
        return ErrorResponse::new("not connected").with_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ErrorResponse::new(rejection.body_text()).with_status(StatusCode::BAD_REQUEST)
        }
    };

    if request.phone.trim().is_empty() || request.message.is_empty() {
        return ErrorResponse::new("phone and message are required")
            .with_status(StatusCode::BAD_REQUEST);
    }

    let chat_id = normalize_chat_id(&request.phone);
    match state.session.send_message(&chat_id, &request.message).await {
        Ok(()) => {
            info!(chat_id = %chat_id, "Message sent");
            (StatusCode::OK, Json(json!({ "success": true }))).into_response()
        }
        Err(e) => {
            error!(chat_id = %chat_id, "Send failed: {}", e);
            ErrorResponse::new(e.to_string()).with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
