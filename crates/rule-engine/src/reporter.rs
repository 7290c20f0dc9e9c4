//! 刷新失败上报

use chrono::{DateTime, Utc};
use tracing::error;
use typeset_shared::observability::metrics;

use crate::error::RuleError;

/// 一次失败的定时刷新
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshFailure {
    pub source_id: String,
    pub code: &'static str,
    pub message: String,
    /// 失败后继续对外服务的快照版本
    pub retained_version: u64,
    pub occurred_at: DateTime<Utc>,
}

impl RefreshFailure {
    pub fn new(source_id: &str, err: &RuleError, retained_version: u64) -> Self {
        Self {
            source_id: source_id.to_string(),
            code: err.code(),
            message: err.to_string(),
            retained_version,
            occurred_at: Utc::now(),
        }
    }
}

/// 错误上报接口
///
/// 只接收失败描述，不需要确认。
pub trait ErrorReporter: Send + Sync {
    fn report(&self, failure: &RefreshFailure);
}

/// 写日志并累加失败计数的默认实现
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, failure: &RefreshFailure) {
        error!(
            source_id = %failure.source_id,
            code = failure.code,
            retained_version = failure.retained_version,
            error = %failure.message,
            "规则定时刷新失败，保留当前快照"
        );
        metrics::record_rule_refresh_failure(failure.code);
    }
}
