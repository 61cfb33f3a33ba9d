//! 应用状态 - 在 main.rs 中创建并共享给所有 handler

use std::sync::Arc;

use wabridge_session::{SessionManager, SessionStore};

/// 共享给所有 handler 的状态
///
/// `store` 与 `session` 内部持有的是同一个 [`SessionStore`]。
#[derive(Debug, Clone)]
pub struct AppState {
    /// 会话状态（只读快照来源）
    pub store: Arc<SessionStore>,
    /// 会话管理器（发送、重启）
    pub session: Arc<SessionManager>,
}

impl AppState {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            store: Arc::clone(session.store()),
            session,
        }
    }
}
