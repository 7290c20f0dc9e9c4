//! 排版规则决策服务
//!
//! 启动流程：加载配置 → 初始化可观测性 → 首次加载规则（失败即退出）
//! → 启动定时刷新 → 提供 HTTP 接口。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rule_engine::http::{self, AppState};
use rule_engine::source::build_source;
use rule_engine::{Refresher, RuleStore};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use typeset_shared::config::AppConfig;
use typeset_shared::observability;
use typeset_shared::retry::RetryPolicy;

const SERVICE_NAME: &str = "rule-engine";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load(SERVICE_NAME).context("加载配置失败")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        source = ?config.source.kind,
        "Starting rule-engine service..."
    );

    let source = build_source(&config.source)?;
    let store = RuleStore::new();
    let refresher = Arc::new(
        Refresher::new(
            store,
            source,
            config.source.source_id(),
            config.source.range.clone(),
        )
        .with_interval(config.refresh.interval()),
    );

    // 没有规则时不对外服务
    let policy = RetryPolicy::new(
        config.refresh.initial_max_retries,
        Duration::from_millis(config.refresh.initial_retry_delay_ms),
        Duration::from_millis(config.refresh.max_retry_delay_ms),
    );
    refresher
        .initial_load(&policy)
        .await
        .context("规则首次加载失败，服务终止启动")?;

    let refresh_handle = refresher.clone().spawn();

    let app = http::router(AppState::new(refresher));
    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址 {} 失败", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh_handle.shutdown().await;
    info!("Service shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
