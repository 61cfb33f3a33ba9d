//! # Lifecycle
//!
//! 启动顺序与关闭：
//! 1. 先绑定监听（`ListenerUp`），`/health` 立即可用
//! 2. 开始服务后，延迟一段时间再构造会话客户端
//! 3. 收到关闭信号：停止接收新连接，等待进行中的请求完成，
//!    取消尚未触发的延迟启动，最后销毁会话客户端

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use wabridge_config::ServerConfig;
use wabridge_session::SessionManager;

use crate::server::create_router;
use crate::state::AppState;

/// 进程生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    ListenerDown,
    ListenerUp,
    /// 延迟结束，正在构造会话客户端
    SessionStarting,
    /// 客户端已构造，初始化在后台进行（不代表已连接）
    SessionActive,
}

/// 服务器错误类型
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// 尚未绑定监听的服务器
pub struct Lifecycle {
    state: AppState,
    server: ServerConfig,
    startup_delay: Duration,
    phase: watch::Sender<LifecyclePhase>,
}

impl Lifecycle {
    pub fn new(state: AppState, server: ServerConfig, startup_delay: Duration) -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::ListenerDown);
        Self {
            state,
            server,
            startup_delay,
            phase,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    /// 绑定监听地址
    ///
    /// 会话的构造永远发生在这之后。
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self.server.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        self.phase.send_replace(LifecyclePhase::ListenerUp);
        info!("Listening on http://{}", local_addr);

        Ok(BoundServer {
            listener,
            local_addr,
            state: self.state,
            cors: self.server.cors,
            startup_delay: self.startup_delay,
            phase: self.phase,
        })
    }
}

/// 已绑定监听、可以开始服务的服务器
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: AppState,
    cors: bool,
    startup_delay: Duration,
    phase: watch::Sender<LifecyclePhase>,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    /// 服务直到 `shutdown` 被取消，然后排空请求并销毁会话
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let router = create_router(self.state.clone(), self.cors);
        let starter = spawn_delayed_start(
            Arc::clone(&self.state.session),
            self.startup_delay,
            shutdown.child_token(),
            self.phase.clone(),
        );

        let signal = shutdown.clone();
        let served = axum::serve(self.listener, router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await;

        if let Err(ref e) = served {
            error!("HTTP server error: {}", e);
        }
        info!("HTTP server stopped, shutting down session");

        // 服务异常退出时同样取消延迟启动
        shutdown.cancel();
        if let Err(e) = starter.await {
            error!("Session start task failed: {}", e);
        }

        self.state.session.shutdown().await;
        self.phase.send_replace(LifecyclePhase::ListenerDown);
        info!("Shutdown complete");

        served.map_err(ServerError::Serve)
    }
}

fn spawn_delayed_start(
    session: Arc<SessionManager>,
    delay: Duration,
    cancel: CancellationToken,
    phase: watch::Sender<LifecyclePhase>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Shutdown before session start, skipping construction");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        phase.send_replace(LifecyclePhase::SessionStarting);
        match session.start().await {
            Ok(()) => {
                phase.send_replace(LifecyclePhase::SessionActive);
            }
            Err(e) => error!("Failed to start session: {}", e),
        }
    })
}
