//! Mailpilot 网关服务器
//!
//! 运行方式：
//! ```bash
//! cargo run --features browser
//! ```
//! 可选参数：配置文件路径（默认查找 config/default.toml）。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use mailpilot::browser::ChromeLauncher;
use mailpilot::config::load_config;
use mailpilot::core::{SessionConfig, ShutdownManager};
use mailpilot::gateway::{Hub, HubConfig};
use mailpilot::llm::TextGenerator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mailpilot::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;

    let hub = Hub::new(
        HubConfig::from(&cfg.gateway),
        TextGenerator::from_config(&cfg.llm),
        Arc::new(ChromeLauncher),
        SessionConfig::from(&cfg),
    );

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    tracing::info!("Press Ctrl+C to stop");
    if let Err(e) = hub.run(shutdown.token()).await {
        return Err(anyhow::anyhow!(e)).context("Gateway stopped");
    }

    tracing::info!("Gateway stopped");
    Ok(())
}
