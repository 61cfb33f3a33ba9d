//! # Session State Store
//!
//! 进程内唯一的会话状态记录。
//!
//! - 只由生命周期事件的转换函数写入
//! - HTTP handler 只读取快照
//! - 每次读写都是一个临界区，锁不会跨越 `.await`

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// 尚未认证，也还没有收到配对码
    #[default]
    Unauthenticated,
    /// 已下发配对码，等待扫码
    PairingIssued,
    /// 扫码成功，正在恢复会话
    Authenticating,
    /// 可用
    Ready,
    /// 认证或初始化失败，需要外部重新触发
    Failed,
    /// 连接断开，需要外部重新触发
    Disconnected,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Unauthenticated => write!(f, "unauthenticated"),
            SessionPhase::PairingIssued => write!(f, "pairing_issued"),
            SessionPhase::Authenticating => write!(f, "authenticating"),
            SessionPhase::Ready => write!(f, "ready"),
            SessionPhase::Failed => write!(f, "failed"),
            SessionPhase::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// 会话状态快照
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub connected: bool,
    /// data URI 形式的配对二维码
    pub pairing_image: Option<String>,
    /// 会话自身的地址（ready 时获得）
    pub identifier: Option<String>,
    pub initializing: bool,
    /// 初始化轮次，每次 `begin_initialization` / `close` 递增
    pub generation: u64,
}

impl SessionState {
    /// 检查状态不变式
    ///
    /// - connected 时不能有配对码
    /// - initializing 时不能是 connected
    pub fn is_consistent(&self) -> bool {
        !(self.connected && self.pairing_image.is_some())
            && !(self.initializing && self.connected)
    }
}

/// 会话状态存储
///
/// 每个转换函数都带上事件所属的轮次；轮次已过期（之后又开始了新一轮
/// 初始化，或者已经关闭）的事件被丢弃，旧客户端迟到的事件因此不会
/// 影响新一轮的状态。
#[derive(Debug, Default)]
pub struct SessionStore {
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前状态的快照
    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.read().phase
    }

    /// 当前轮次
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// 初始化守卫：检查并设置 initializing 标志，返回新一轮的轮次
    ///
    /// 已在初始化或已连接时拒绝。
    pub fn begin_initialization(&self) -> SessionResult<u64> {
        let mut state = self.state.write();
        if state.initializing {
            return Err(SessionError::AlreadyInitializing);
        }
        if state.connected {
            return Err(SessionError::AlreadyConnected);
        }
        state.generation += 1;
        state.initializing = true;
        state.phase = SessionPhase::Unauthenticated;
        debug!(generation = state.generation, "Session initialization started");
        Ok(state.generation)
    }

    /// 收到配对码
    pub fn on_pairing_code(&self, generation: u64, image: String) -> bool {
        self.transition(generation, "qr", |state| {
            state.pairing_image = Some(image);
            state.connected = false;
            state.phase = SessionPhase::PairingIssued;
            info!("Pairing code issued");
        })
    }

    /// 扫码成功；配对码保留到 ready
    pub fn on_authenticated(&self, generation: u64) -> bool {
        self.transition(generation, "authenticated", |state| {
            state.phase = SessionPhase::Authenticating;
            info!("Session authenticated");
        })
    }

    pub fn on_ready(&self, generation: u64, identifier: String) -> bool {
        self.transition(generation, "ready", |state| {
            info!(identifier = %identifier, "Session ready");
            state.connected = true;
            state.identifier = Some(identifier);
            state.pairing_image = None;
            state.initializing = false;
            state.phase = SessionPhase::Ready;
        })
    }

    pub fn on_auth_failure(&self, generation: u64) -> bool {
        self.transition(generation, "auth_failure", |state| {
            state.connected = false;
            state.pairing_image = None;
            state.initializing = false;
            state.phase = SessionPhase::Failed;
            warn!("Session authentication failed");
        })
    }

    /// initialize() 本身返回错误
    pub fn on_initialize_failed(&self, generation: u64) -> bool {
        self.transition(generation, "initialize_failed", |state| {
            state.connected = false;
            state.pairing_image = None;
            state.initializing = false;
            state.phase = SessionPhase::Failed;
            warn!("Session initialization failed");
        })
    }

    pub fn on_disconnected(&self, generation: u64) -> bool {
        self.transition(generation, "disconnected", |state| {
            Self::clear_connection(state);
            info!("Session disconnected");
        })
    }

    /// 关闭：无条件断开，并让所有进行中的轮次过期
    pub fn close(&self) {
        let mut state = self.state.write();
        state.generation += 1;
        Self::clear_connection(&mut state);
        info!("Session closed");
    }

    fn clear_connection(state: &mut SessionState) {
        state.connected = false;
        state.identifier = None;
        state.pairing_image = None;
        state.initializing = false;
        state.phase = SessionPhase::Disconnected;
    }

    /// 在一个临界区内检查轮次并应用转换
    fn transition<F>(&self, generation: u64, event: &'static str, apply: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        let mut state = self.state.write();
        if state.generation != generation {
            debug!(
                event = event,
                generation = generation,
                current = state.generation,
                "Ignoring event from a previous session attempt"
            );
            return false;
        }
        apply(&mut state);
        true
    }
}
