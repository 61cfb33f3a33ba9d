//! # wabridge session
//!
//! 单个消息会话的状态机与驱动客户端。
//!
//! ## 组成
//!
//! - [`SessionStore`]：进程内唯一的会话状态，按事件转换
//! - [`SessionManager`]：初始化守卫、事件泵、客户端生命周期
//! - [`SessionClient`] / [`SessionFactory`]：外部会话的抽象
//! - [`ProcessClient`]：通过子进程 + NDJSON 管道驱动的实现
//! - [`pairing`]：把配对码渲染成 PNG data URI
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wabridge_session::{ProcessConfig, ProcessFactory, SessionManager, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SessionStore::new());
//!     let factory = Arc::new(ProcessFactory::new(ProcessConfig::default()));
//!     let manager = SessionManager::new(store.clone(), factory);
//!
//!     manager.on_message(|msg| println!("{}: {}", msg.from, msg.body));
//!     manager.start().await?;
//!
//!     println!("connected: {}", store.is_connected());
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod client;
pub mod error;
pub mod event;
pub mod manager;
pub mod pairing;
pub mod process;
pub mod state;

// 重新导出主要类型
pub use address::{is_group_address, normalize_chat_id, GROUP_MARKER, INDIVIDUAL_SUFFIX};
pub use client::{SessionClient, SessionFactory};
pub use error::{SessionError, SessionResult};
pub use event::{EventReceiver, EventSender, InboundMessage, SessionEvent};
pub use manager::SessionManager;
pub use process::{ProcessClient, ProcessConfig, ProcessFactory};
pub use state::{SessionPhase, SessionState, SessionStore};
