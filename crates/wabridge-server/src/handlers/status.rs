//! 只读端点：健康检查、连接状态、配对二维码

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health` - 与会话状态无关
pub async fn health() -> &'static str {
    "OK"
}

/// `GET /`
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "connected": state.store.is_connected(),
    }))
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.store.snapshot();
    Json(json!({
        "connected": snapshot.connected,
        "phoneNumber": snapshot.identifier,
    }))
}

/// `GET /qr`
///
/// 三种结果都返回 200，区别只在响应体。
pub async fn qr(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.store.snapshot();
    if snapshot.connected {
        return Json(json!({ "error": "already connected" }));
    }

    match snapshot.pairing_image {
        Some(image) => Json(json!({ "qr": image })),
        None => Json(json!({ "error": "not available" })),
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::TestApp;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wabridge_session::SessionEvent;

    #[tokio::test]
    async fn test_health_is_plain_ok() {
        let app = TestApp::new();
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_root_and_status_before_connection() {
        let app = TestApp::new();

        let (status, body) = app.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "connected": false }));

        let (status, body) = app.get("/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "connected": false, "phoneNumber": null }));
    }

    #[tokio::test]
    async fn test_status_after_ready_until_disconnect() {
        let app = TestApp::new();
        app.connect("5511999999999").await;

        let (_, body) = app.get("/status").await;
        assert_eq!(
            body,
            json!({ "connected": true, "phoneNumber": "5511999999999" })
        );

        app.state.session.handle_event(SessionEvent::Disconnected {
            reason: Some("NAVIGATION".to_string()),
        });
        let (_, body) = app.get("/status").await;
        assert_eq!(body, json!({ "connected": false, "phoneNumber": null }));
    }

    #[tokio::test]
    async fn test_qr_outcomes() {
        let app = TestApp::new();

        let (status, body) = app.get("/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": "not available" }));

        app.state.session.handle_event(SessionEvent::Qr {
            code: "2@abc,def,ghi".to_string(),
        });
        let stored = app.state.store.snapshot().pairing_image.unwrap();
        let (status, body) = app.get("/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["qr"], Value::String(stored));

        app.connect("5511999999999").await;
        let (status, body) = app.get("/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": "already connected" }));
    }
}
