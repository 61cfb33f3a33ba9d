pub mod config;
pub mod manager;

pub use config::{
    Config, ConfigError, ConfigResult, LogLevel, LoggingConfig, ServerConfig, SessionConfig,
    WebhookConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 默认配置文件名（相对于工作目录）
pub const DEFAULT_CONFIG_FILE: &str = "wabridge.json";

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        Some(PathBuf::from(path))
    }
}
