//! # Session Manager
//!
//! 会话生命周期管理：
//! - 初始化守卫（同一时间只允许一次构造）
//! - 持有当前的会话客户端
//! - 事件泵：把客户端推送的事件映射到 [`SessionStore`]
//! - 入站消息回调
//! - 关闭时销毁客户端
//!
//! 断线或认证失败后不会自动重连，需要外部显式调用 [`SessionManager::start`]。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{SessionClient, SessionFactory};
use crate::error::{SessionError, SessionResult};
use crate::event::{EventReceiver, InboundMessage, SessionEvent};
use crate::pairing;
use crate::state::SessionStore;

/// 入站消息处理器类型
type MessageHandler = Arc<RwLock<Option<Box<dyn Fn(InboundMessage) + Send + Sync>>>>;

/// 默认销毁超时
const DEFAULT_DESTROY_TIMEOUT: Duration = Duration::from_secs(10);

/// 会话管理器
pub struct SessionManager {
    store: Arc<SessionStore>,
    factory: Arc<dyn SessionFactory>,
    client: Mutex<Option<Arc<dyn SessionClient>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    message_handler: MessageHandler,
    destroy_timeout: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.store.snapshot())
            .field("has_client", &self.has_client())
            .field("message_handler", &"<callback>")
            .field("destroy_timeout", &self.destroy_timeout)
            .finish()
    }
}

impl SessionManager {
    pub fn new(store: Arc<SessionStore>, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            store,
            factory,
            client: Mutex::new(None),
            pump: Mutex::new(None),
            message_handler: Arc::new(RwLock::new(None)),
            destroy_timeout: DEFAULT_DESTROY_TIMEOUT,
        }
    }

    /// 设置销毁客户端时的最长等待时间
    pub fn with_destroy_timeout(mut self, timeout: Duration) -> Self {
        self.destroy_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// 是否已经构造过客户端（且尚未销毁）
    pub fn has_client(&self) -> bool {
        self.client.lock().is_some()
    }

    /// 设置入站消息处理器
    ///
    /// 事件泵收到 `Message` 事件时调用，处理器不应阻塞。
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        *self.message_handler.write() = Some(Box::new(handler));
    }

    /// 构造并初始化会话客户端
    ///
    /// 守卫拒绝时返回 [`SessionError::AlreadyInitializing`] /
    /// [`SessionError::AlreadyConnected`]，不会构造新的客户端。
    /// `initialize()` 在后台执行，其失败只会反映到状态存储中。
    ///
    /// 事件泵和初始化任务都绑定到本轮的轮次，旧客户端（包括被销毁时
    /// 才失败的 `initialize()`）不会改动新一轮的状态。
    pub async fn start(&self) -> SessionResult<()> {
        let generation = self.store.begin_initialization()?;

        // 旧事件泵此后送来的事件已过期，停掉只是为了释放资源
        self.stop_pump();
        let previous = self.client.lock().take();
        if let Some(previous) = previous {
            info!("Destroying previous session client before restart");
            self.destroy_client(previous).await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let client = match self.factory.create(tx) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to construct session client: {}", e);
                self.store.on_initialize_failed(generation);
                return Err(e);
            }
        };

        *self.client.lock() = Some(Arc::clone(&client));
        self.spawn_pump(rx, generation);

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            info!(generation = generation, "Initializing session client");
            if let Err(e) = client.initialize().await {
                if store.on_initialize_failed(generation) {
                    error!("Session initialization failed: {}", e);
                } else {
                    debug!("Initialization of a replaced session client ended: {}", e);
                }
            }
        });

        Ok(())
    }

    /// 通过当前客户端发送消息
    pub async fn send_message(&self, chat_id: &str, body: &str) -> SessionResult<()> {
        let client = self.client.lock().clone().ok_or(SessionError::NotStarted)?;
        debug!(chat_id = %chat_id, "Sending message");
        client.send_message(chat_id, body).await
    }

    /// 以当前轮次处理一个生命周期事件
    pub fn handle_event(&self, event: SessionEvent) {
        apply_event(
            &self.store,
            &self.message_handler,
            self.store.generation(),
            event,
        );
    }

    /// 关闭：销毁客户端（如果构造过），停止事件泵
    pub async fn shutdown(&self) {
        self.stop_pump();

        let client = self.client.lock().take();
        match client {
            Some(client) => {
                info!("Destroying session client");
                self.destroy_client(client).await;
            }
            None => debug!("No session client was constructed, nothing to destroy"),
        }

        self.store.close();
    }

    fn spawn_pump(&self, mut rx: EventReceiver, generation: u64) {
        let store = Arc::clone(&self.store);
        let handler = Arc::clone(&self.message_handler);

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                apply_event(&store, &handler, generation, event);
            }
            debug!("Session event stream closed");
        });

        *self.pump.lock() = Some(handle);
    }

    fn stop_pump(&self) {
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
        }
    }

    async fn destroy_client(&self, client: Arc<dyn SessionClient>) {
        match tokio::time::timeout(self.destroy_timeout, client.destroy()).await {
            Ok(Ok(())) => info!("Session client destroyed"),
            Ok(Err(e)) => warn!("Session client destroy failed: {}", e),
            Err(_) => warn!(
                "Session client destroy timed out after {:?}",
                self.destroy_timeout
            ),
        }
    }
}

/// 把事件映射到状态存储；每个分支只做一次同步写入
fn apply_event(
    store: &SessionStore,
    handler: &MessageHandler,
    generation: u64,
    event: SessionEvent,
) {
    debug!(event = event.kind(), generation = generation, "Session event");
    match event {
        SessionEvent::Qr { code } => match pairing::render_data_uri(&code) {
            Ok(image) => {
                store.on_pairing_code(generation, image);
            }
            Err(e) => error!("Failed to render pairing code: {}", e),
        },
        SessionEvent::Authenticated => {
            store.on_authenticated(generation);
        }
        SessionEvent::AuthFailure { message } => {
            if let Some(message) = message {
                warn!("Authentication failure: {}", message);
            }
            store.on_auth_failure(generation);
        }
        SessionEvent::Ready { identifier } => {
            store.on_ready(generation, identifier);
        }
        SessionEvent::Disconnected { reason } => {
            info!(
                "Session disconnected: {}",
                reason.as_deref().unwrap_or("unknown reason")
            );
            store.on_disconnected(generation);
        }
        SessionEvent::Message(message) => {
            if store.generation() != generation {
                debug!("Dropping message from a replaced session client");
                return;
            }
            let handler = handler.read();
            if let Some(ref h) = *handler {
                h(message);
            }
        }
    }
}
