use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            server: ServerConfig::default(),
            webhook: WebhookConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["server", "port"] => Some(self.server.port.to_string()),
            ["server", "host"] => Some(self.server.host.clone()),
            ["server", "cors"] => Some(self.server.cors.to_string()),
            ["webhook", "url"] => self.webhook.url.clone(),
            ["webhook", "timeout_secs"] => Some(self.webhook.timeout_secs.to_string()),
            ["session", "startup_delay_ms"] => Some(self.session.startup_delay_ms.to_string()),
            ["session", "command"] => Some(self.session.command.clone()),
            ["session", "auth_dir"] => self.session.auth_dir.clone(),
            ["session", "request_timeout_secs"] => {
                Some(self.session.request_timeout_secs.to_string())
            }
            ["session", "destroy_timeout_secs"] => {
                Some(self.session.destroy_timeout_secs.to_string())
            }
            ["logging", "level"] => Some(self.logging.level.as_str().to_string()),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            _ => None,
        }
    }

    /// 设置配置值（CLI / 环境变量覆盖时使用）
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["server", "port"] => {
                self.server.port = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid port number: {}", value))
                })?;
            }
            ["server", "host"] => {
                self.server.host = value.to_string();
            }
            ["server", "cors"] => {
                self.server.cors = parse_bool(value)?;
            }
            ["webhook", "url"] => {
                self.webhook.url = non_empty(value);
            }
            ["webhook", "timeout_secs"] => {
                self.webhook.timeout_secs = parse_number(value)?;
            }
            ["session", "startup_delay_ms"] => {
                self.session.startup_delay_ms = parse_number(value)?;
            }
            ["session", "command"] => {
                self.session.set_command_line(value)?;
            }
            ["session", "auth_dir"] => {
                self.session.auth_dir = non_empty(value);
            }
            ["session", "request_timeout_secs"] => {
                self.session.request_timeout_secs = parse_number(value)?;
            }
            ["session", "destroy_timeout_secs"] => {
                self.session.destroy_timeout_secs = parse_number(value)?;
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "json"] => {
                self.logging.json = parse_bool(value)?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> ConfigResult<bool> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid boolean: {}", value)))
}

fn parse_number(value: &str) -> ConfigResult<u64> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid number: {}", value)))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors: true,
        }
    }
}

impl ServerConfig {
    /// 监听地址 "host:port"
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Webhook 配置
///
/// `url` 为空时转发器不做任何事情。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
        }
    }
}

impl WebhookConfig {
    /// 有效的目标地址（空字符串视为未配置）
    pub fn destination(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 会话子进程配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// 监听端口绑定之后，延迟多久再启动会话（毫秒）
    pub startup_delay_ms: u64,
    /// 自动化驱动程序
    pub command: String,
    pub args: Vec<String>,
    /// 会话认证数据目录，由驱动程序自己读写
    pub auth_dir: Option<String>,
    pub request_timeout_secs: u64,
    pub destroy_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: 2000,
            command: "node".to_string(),
            args: vec!["session-driver.js".to_string()],
            auth_dir: Some(".wwebjs_auth".to_string()),
            request_timeout_secs: 60,
            destroy_timeout_secs: 10,
        }
    }
}

impl SessionConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_secs(self.destroy_timeout_secs)
    }

    /// 用一整行命令覆盖 command + args（按空白切分）
    pub fn set_command_line(&mut self, line: &str) -> ConfigResult<()> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let command = parts
            .next()
            .ok_or_else(|| ConfigError::Validation("Session command cannot be empty".to_string()))?;
        self.command = command;
        self.args = parts.collect();
        Ok(())
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 额外的 tracing 过滤指令，例如 "tower_http=debug"
    pub directives: Vec<String>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            directives: Vec::new(),
            json: false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
