//! HTTP 接口
//!
//! - `POST /v1/decide` 决策
//! - `POST /v1/reload` 立即刷新规则
//! - `GET /health` 快照状态，首次加载完成前返回 503

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::engine::DecisionEngine;
use crate::error::RuleError;
use crate::models::{Decision, DecisionQuery, Rule};
use crate::refresher::{RefreshOutcome, Refresher};
use crate::store::StoreStatus;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: DecisionEngine,
    pub refresher: Arc<Refresher>,
}

impl AppState {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        Self {
            engine: DecisionEngine::new(refresher.store().clone()),
            refresher,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/decide", post(decide))
        .route("/v1/reload", post(reload))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 统一响应包装
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DecisionDto {
    /// 是否返回了规则（精确命中或兜底）
    pub matched: bool,
    pub fallback: bool,
    pub rule: Option<Rule>,
}

impl From<Decision> for DecisionDto {
    fn from(decision: Decision) -> Self {
        let fallback = decision.is_fallback();
        let rule = decision.into_rule();
        Self {
            matched: rule.is_some(),
            fallback,
            rule,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadDto {
    /// published 或 skipped
    pub outcome: &'static str,
    pub version: Option<u64>,
    pub rules: Option<usize>,
}

impl From<RefreshOutcome> for ReloadDto {
    fn from(outcome: RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Published { version, rules } => Self {
                outcome: "published",
                version: Some(version),
                rules: Some(rules),
            },
            RefreshOutcome::Skipped => Self {
                outcome: "skipped",
                version: None,
                rules: None,
            },
        }
    }
}

async fn decide(
    State(state): State<AppState>,
    payload: Result<Json<DecisionQuery>, JsonRejection>,
) -> Result<Json<ApiResponse<DecisionDto>>, RuleError> {
    let Json(query) = payload?;
    let decision = state.engine.decide(&query)?;
    Ok(ApiResponse::ok(decision.into()))
}

async fn reload(State(state): State<AppState>) -> Result<Json<ApiResponse<ReloadDto>>, RuleError> {
    let outcome = state.refresher.refresh_now().await?;
    Ok(ApiResponse::ok(outcome.into()))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<StoreStatus>>) {
    let status = state.engine.store().status();
    let code = if status.loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(ApiResponse {
            success: status.loaded,
            data: status,
        }),
    )
}

impl RuleError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            e if e.is_source_error() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for RuleError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("请求体无效: {}", rejection.body_text()))
    }
}

impl IntoResponse for RuleError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Configuration(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, Json(body)).into_response()
    }
}
