use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wabridge_config::{ConfigManager, LogLevel, DEFAULT_CONFIG_FILE};
use wabridge_server::{init_logging, install_panic_hook, AppState, Lifecycle, WebhookForwarder};
use wabridge_session::{ProcessConfig, ProcessFactory, SessionManager, SessionStore};

#[derive(Parser, Debug, Clone)]
#[command(name = "wabridge-server")]
#[command(about = "HTTP bridge for a single messaging session")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "WABRIDGE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Listen host (overrides config)
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Listen port (overrides config)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Webhook destination for inbound messages; empty disables forwarding
    #[arg(long, env = "WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Webhook request timeout in seconds
    #[arg(long, env = "WEBHOOK_TIMEOUT_SECS")]
    webhook_timeout_secs: Option<u64>,

    /// Delay between binding the listener and starting the session
    #[arg(long, env = "SESSION_STARTUP_DELAY_MS")]
    startup_delay_ms: Option<u64>,

    /// Session driver command line, e.g. "node session-driver.js"
    #[arg(long, env = "SESSION_COMMAND")]
    session_command: Option<String>,

    /// Directory holding the session's authentication material
    #[arg(long, env = "SESSION_AUTH_DIR")]
    auth_dir: Option<String>,

    /// Log level or tracing filter (overrides config)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: Option<bool>,
}

impl Cli {
    /// 命令行 / 环境变量覆盖项
    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(ref host) = self.host {
            overrides.push(("server.host", host.clone()));
        }
        if let Some(port) = self.port {
            overrides.push(("server.port", port.to_string()));
        }
        if let Some(ref url) = self.webhook_url {
            overrides.push(("webhook.url", url.clone()));
        }
        if let Some(secs) = self.webhook_timeout_secs {
            overrides.push(("webhook.timeout_secs", secs.to_string()));
        }
        if let Some(ms) = self.startup_delay_ms {
            overrides.push(("session.startup_delay_ms", ms.to_string()));
        }
        if let Some(ref command) = self.session_command {
            overrides.push(("session.command", command.clone()));
        }
        if let Some(ref dir) = self.auth_dir {
            overrides.push(("session.auth_dir", dir.clone()));
        }
        if let Some(json) = self.log_json {
            overrides.push(("logging.json", json.to_string()));
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 展开配置文件路径
    let config_path =
        wabridge_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    // 加载配置，CLI 参数覆盖配置文件
    let mut manager = ConfigManager::load(&config_path).await?;
    let mut overrides = cli.overrides();

    // RUST_LOG 既可以是单个级别，也可以是完整的过滤指令
    let mut extra_directives = Vec::new();
    if let Some(ref filter) = cli.log_level {
        if filter.parse::<LogLevel>().is_ok() {
            overrides.push(("logging.level", filter.clone()));
        } else {
            extra_directives.extend(
                filter
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            );
        }
    }
    manager.apply_overrides(overrides)?;
    ConfigManager::validate(manager.get())?;

    let mut logging = manager.get().logging.clone();
    logging.directives.extend(extra_directives);
    init_logging(&logging)?;
    install_panic_hook();

    info!("Starting wabridge server");
    info!("  Config file: {:?}", manager.path());
    for (key, value) in config_summary(&manager) {
        info!("  {} = {}", key, value);
    }

    let config = manager.into_config();
    if config.webhook.destination().is_none() {
        warn!("Webhook not configured, inbound messages will not be forwarded");
    }

    // 会话
    let factory = Arc::new(ProcessFactory::new(ProcessConfig {
        program: config.session.command.clone(),
        args: config.session.args.clone(),
        auth_dir: config.session.auth_dir.as_ref().map(PathBuf::from),
        request_timeout: config.session.request_timeout(),
    }));
    let session = Arc::new(
        SessionManager::new(Arc::new(SessionStore::new()), factory)
            .with_destroy_timeout(config.session.destroy_timeout()),
    );

    // 入站消息 -> webhook
    let forwarder = WebhookForwarder::new(
        config.webhook.destination().map(str::to_string),
        config.webhook.timeout(),
    )?;
    session.on_message(move |msg| {
        forwarder.forward(&msg);
    });

    let lifecycle = Lifecycle::new(
        AppState::new(session),
        config.server.clone(),
        config.session.startup_delay(),
    );
    let server = lifecycle.bind().await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    server.run(shutdown).await?;
    Ok(())
}

/// 启动日志中列出的配置项
const SUMMARY_KEYS: &[&str] = &[
    "server.host",
    "server.port",
    "webhook.url",
    "webhook.timeout_secs",
    "session.startup_delay_ms",
    "session.command",
    "session.auth_dir",
    "logging.level",
    "logging.json",
];

/// 生效配置的摘要，未设置的项显示为 "-"
fn config_summary(manager: &ConfigManager) -> Vec<(&'static str, String)> {
    SUMMARY_KEYS
        .iter()
        .map(|key| {
            let value = manager
                .get()
                .get_value(key)
                .unwrap_or_else(|| "-".to_string());
            (*key, value)
        })
        .collect()
}

/// SIGTERM / Ctrl-C 触发优雅关闭
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl-C");
                } else {
                    return;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Received Ctrl-C");
    }

    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use wabridge_config::Config;

    #[test]
    fn test_cli_overrides_reach_summary() {
        let cli = Cli::try_parse_from([
            "wabridge-server",
            "--port",
            "9090",
            "--webhook-url",
            "",
            "--session-command",
            "node driver.js --headless",
        ])
        .unwrap();

        let mut manager = ConfigManager::new(Config::default(), PathBuf::from("wabridge.json"));
        manager.apply_overrides(cli.overrides()).unwrap();

        let summary = config_summary(&manager);
        let value = |key: &str| {
            summary
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(summary.len(), SUMMARY_KEYS.len());
        assert_eq!(value("server.port"), "9090");
        assert_eq!(value("webhook.url"), "-");
        assert_eq!(value("session.command"), "node");
        assert_eq!(manager.get().session.args, vec!["driver.js", "--headless"]);
    }
}
