//! handler 测试用的假会话客户端

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use wabridge_session::{
    EventSender, SessionClient, SessionError, SessionEvent, SessionFactory, SessionManager,
    SessionResult, SessionStore,
};

use crate::server::create_router;
use crate::state::AppState;

/// 记录下来的发送调用
#[derive(Default)]
pub struct Recorded {
    pub sends: Mutex<Vec<(String, String)>>,
}

/// 记录所有发送调用的假客户端
pub struct FakeClient {
    pub recorded: Arc<Recorded>,
    pub send_error: Option<String>,
}

#[async_trait]
impl SessionClient for FakeClient {
    async fn initialize(&self) -> SessionResult<()> {
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, body: &str) -> SessionResult<()> {
        self.recorded
            .sends
            .lock()
            .unwrap()
            .push((chat_id.to_string(), body.to_string()));
        match &self.send_error {
            Some(message) => Err(SessionError::remote(message.clone())),
            None => Ok(()),
        }
    }

    async fn destroy(&self) -> SessionResult<()> {
        Ok(())
    }
}

pub struct FakeFactory {
    pub recorded: Arc<Recorded>,
    pub send_error: Option<String>,
}

impl SessionFactory for FakeFactory {
    fn create(&self, _events: EventSender) -> SessionResult<Arc<dyn SessionClient>> {
        Ok(Arc::new(FakeClient {
            recorded: Arc::clone(&self.recorded),
            send_error: self.send_error.clone(),
        }))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub recorded: Arc<Recorded>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_send_error(None)
    }

    pub fn with_send_error(send_error: Option<&str>) -> Self {
        let recorded = Arc::new(Recorded::default());
        let factory = Arc::new(FakeFactory {
            recorded: Arc::clone(&recorded),
            send_error: send_error.map(str::to_string),
        });
        let manager = Arc::new(SessionManager::new(Arc::new(SessionStore::new()), factory));
        let state = AppState::new(manager);

        Self {
            router: create_router(state.clone(), true),
            state,
            recorded,
        }
    }

    /// 构造客户端并推进到 ready
    pub async fn connect(&self, identifier: &str) {
        self.state.session.start().await.unwrap();
        self.state.session.handle_event(SessionEvent::Ready {
            identifier: identifier.to_string(),
        });
    }

    pub fn sends(&self) -> Vec<(String, String)> {
        self.recorded.sends.lock().unwrap().clone()
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.call(request).await
    }

    pub async fn post_json(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.call(request).await
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}
