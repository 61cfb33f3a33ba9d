//! # wabridge server
//!
//! 单会话消息桥的 HTTP 控制面：
//! - 健康检查、连接状态、配对二维码
//! - 出站消息发送
//! - 入站消息通过 webhook 转发
//! - 监听优先的启动顺序与优雅关闭

pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod server;
pub mod state;
pub mod webhook;

pub use lifecycle::{BoundServer, Lifecycle, LifecyclePhase, ServerError};
pub use logging::{init_logging, install_panic_hook};
pub use server::{create_router, ErrorResponse};
pub use state::AppState;
pub use webhook::{WebhookForwarder, WebhookPayload};
