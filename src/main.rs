//! Concierge HTTP 服务
//!
//! 入口：加载配置、初始化日志、装配编排器，启动空闲会话清扫与 HTTP 服务，收到关闭信号后优雅退出。
//! 启动: cargo run（默认监听 0.0.0.0:8000）

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use concierge::config::{load_config, AppConfig};
use concierge::core::{Orchestrator, ShutdownManager};
use concierge::gateway::SessionSweeper;
use concierge::integrations::{create_router, HttpState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (cfg, config_error) = match load_config(config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    concierge::observability::init(&cfg.app.log_level);
    if let Some(e) = config_error {
        tracing::warn!("Config load failed ({}), using defaults", e);
    }

    let (orchestrator, sessions) =
        Orchestrator::from_config(&cfg).context("Failed to assemble orchestrator")?;

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let sweeper = SessionSweeper::new(sessions, cfg.session.sweep_interval_secs)
        .spawn(shutdown.token());

    let state = Arc::new(HttpState {
        orchestrator: Arc::new(orchestrator),
        expose_error_details: cfg.web.expose_error_details,
    });
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.web.host, cfg.web.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("{} listening on http://{}", cfg.app.name, addr);

    let signal = Arc::clone(&shutdown);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.wait_for_shutdown().await })
        .await
        .context("HTTP server error")?;

    sweeper.await.ok();
    tracing::info!("Server stopped");
    Ok(())
}
