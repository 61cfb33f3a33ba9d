//! # Session Error Types
//!
//! 会话层相关的错误类型。

use thiserror::Error;

/// 会话错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// IO 错误（子进程管道等）
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 已经有一次初始化在进行中
    #[error("already initializing")]
    AlreadyInitializing,

    /// 会话已连接，不允许重新初始化
    #[error("already connected")]
    AlreadyConnected,

    /// 会话客户端尚未创建
    #[error("session not started")]
    NotStarted,

    /// 驱动进程返回的错误，原样透传消息
    #[error("{message}")]
    Remote { message: String },

    /// 协议错误（无法解析的消息、未知的请求 ID）
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// 请求超时
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// 驱动进程已退出或通道关闭
    #[error("session channel closed")]
    ChannelClosed,

    /// 二维码渲染失败
    #[error("Pairing render error: {message}")]
    Render { message: String },
}

impl SessionError {
    /// 创建远端错误
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// 创建协议错误
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// 创建渲染错误
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// 是否为初始化守卫拒绝（而非真正的故障）
    pub fn is_guard_rejection(&self) -> bool {
        matches!(self, Self::AlreadyInitializing | Self::AlreadyConnected)
    }
}

/// 会话结果类型
pub type SessionResult<T> = Result<T, SessionError>;
