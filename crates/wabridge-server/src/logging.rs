//! 结构化日志初始化

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wabridge_config::LoggingConfig;

/// 根据配置构建过滤器
///
/// 基础级别来自 `logging.level`，`logging.directives` 中的每一项作为额外指令追加。
pub fn build_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(config.level.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid log level: {}", e))?;

    for directive in &config.directives {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid directive '{}': {}", directive, e))?,
        );
    }

    Ok(filter)
}

/// 初始化全局 tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_line_number(true);
        registry
            .with(layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;
    } else {
        let layer = tracing_subscriber::fmt::layer().with_target(true);
        registry
            .with(layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;
    }

    tracing::info!("Logging initialized with level: {}", config.level.as_str());
    Ok(())
}

/// 把 panic 记录到日志
///
/// 后台任务里的 panic 只会结束该任务，监听器继续服务。
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());

        tracing::error!(location = %location, "Panic: {}", payload);
        previous(info);
    }));
}
