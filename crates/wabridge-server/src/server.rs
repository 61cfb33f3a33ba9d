//! HTTP Server - 路由与通用响应类型

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// 错误响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// 带状态码的 JSON 响应
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// 创建路由
pub fn create_router(state: AppState, cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::status::health))
        .route("/", get(handlers::status::root))
        .route("/status", get(handlers::status::status))
        .route("/qr", get(handlers::status::qr))
        .route("/send", post(handlers::send::send))
        .route("/session/restart", post(handlers::session::restart))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
