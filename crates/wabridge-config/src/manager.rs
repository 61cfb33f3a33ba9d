use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 配置管理器
///
/// 负责从 JSON 文件加载配置，再叠加命令行 / 环境变量覆盖。
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// 加载配置文件；文件不存在时使用默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let content = Self::expand_env_vars(&content)?;
            serde_json::from_str(&content)?
        } else {
            info!("Config file {:?} not found, using defaults", path);
            Config::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// 创建一个新的配置管理器（用于测试）
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self { path, config }
    }

    /// 获取当前配置
    pub fn get(&self) -> &Config {
        &self.config
    }

    /// 取出配置
    pub fn into_config(self) -> Config {
        self.config
    }

    /// 依次应用覆盖项（key 使用 "section.field" 形式）
    pub fn apply_overrides<'a, I>(&mut self, overrides: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        for (key, value) in overrides {
            debug!("Config override: {} = {}", key, value);
            self.config.set_value(key, &value)?;
        }
        Ok(())
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.session.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Session command cannot be empty".to_string(),
            ));
        }

        if config.session.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Session request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if config.webhook.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Webhook timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// 展开环境变量 ${VAR} 或 ${VAR:-default}
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(format!("Invalid env pattern: {}", e)))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            // 处理 ${VAR:-default} 语法
            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    /// 获取配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("wabridge.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();

        assert_eq!(manager.get().server.port, 8080);
        assert!(!config_path.exists());
    }

    #[tokio::test]
    async fn test_load_file_with_env_expansion() {
        std::env::set_var("WABRIDGE_TEST_HOOK", "https://hooks.example.com/wa");
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("wabridge.json");
        tokio::fs::write(
            &config_path,
            r#"{
                "server": {"port": 9100},
                "webhook": {"url": "${WABRIDGE_TEST_HOOK}"},
                "session": {"auth_dir": "${WABRIDGE_TEST_UNSET_DIR:-/var/lib/wabridge}"}
            }"#,
        )
        .await
        .unwrap();

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.get();

        assert_eq!(config.server.port, 9100);
        assert_eq!(
            config.webhook.destination(),
            Some("https://hooks.example.com/wa")
        );
        assert_eq!(config.session.auth_dir.as_deref(), Some("/var/lib/wabridge"));
    }

    #[tokio::test]
    async fn test_missing_env_var_is_an_error() {
        let content = r#"{"webhook": {"url": "${WABRIDGE_TEST_DEFINITELY_UNSET}"}}"#;
        let result = ConfigManager::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound(_))));
    }

    #[test]
    fn test_apply_overrides() {
        let mut manager = ConfigManager::new(Config::default(), PathBuf::from("unused.json"));
        manager
            .apply_overrides([
                ("server.port", "8181".to_string()),
                ("session.startup_delay_ms", "0".to_string()),
            ])
            .unwrap();

        assert_eq!(manager.get().server.port, 8181);
        assert_eq!(manager.get().session.startup_delay_ms, 0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(ConfigManager::validate(&config).is_ok());

        config.session.command = String::new();
        assert!(ConfigManager::validate(&config).is_err());

        config.session.command = "node".to_string();
        config.webhook.timeout_secs = 0;
        assert!(ConfigManager::validate(&config).is_err());
    }
}
