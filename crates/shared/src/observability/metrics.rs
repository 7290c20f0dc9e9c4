//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。未安装 recorder 时
//! 所有记录函数都是空操作。

use std::net::SocketAddr;
use std::sync::OnceLock;

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 在 `metrics_port` 上启动独立的 HTTP 服务器暴露 `/metrics`。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("rule_refresh_total", "Total number of rule refresh attempts");
    metrics::describe_counter!(
        "rule_refresh_failures_total",
        "Total number of failed rule refreshes"
    );
    metrics::describe_histogram!(
        "rule_refresh_duration_seconds",
        "Rule refresh duration in seconds"
    );
    metrics::describe_gauge!("rule_snapshot_rules", "Rules in the published snapshot");
    metrics::describe_counter!("rule_decisions_total", "Total number of decisions served");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new().route("/metrics", get(move || std::future::ready(handle.render())));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// 记录一次规则刷新
///
/// outcome 取值：published / skipped / failed
#[inline]
pub fn record_rule_refresh(outcome: &str, duration_secs: f64) {
    metrics::counter!("rule_refresh_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("rule_refresh_duration_seconds").record(duration_secs);
}

/// 记录一次刷新失败，code 为错误码
#[inline]
pub fn record_rule_refresh_failure(code: &str) {
    metrics::counter!("rule_refresh_failures_total", "code" => code.to_string()).increment(1);
}

/// 更新当前快照的规则数
#[inline]
pub fn set_snapshot_rules(count: usize) {
    metrics::gauge!("rule_snapshot_rules").set(count as f64);
}

/// 记录一次决策，result 取值：exact / fallback / no_match
#[inline]
pub fn record_decision(result: &str) {
    metrics::counter!("rule_decisions_total", "result" => result.to_string()).increment(1);
}
