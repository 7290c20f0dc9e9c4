//! 规则后台刷新
//!
//! 以固定间隔从规则源拉取表格、解析成新快照并发布。
//!
//! - 新快照在发布前完整构建，网络等待期间不持有任何会阻塞读者的锁
//! - 同一时刻最多一个刷新在执行，重叠的触发直接跳过
//! - 定时刷新失败只上报，当前快照保持不变
//! - 启动时的首次加载失败（重试耗尽后）向调用方返回错误

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};
use typeset_shared::observability::metrics;
use typeset_shared::retry::{RetryPolicy, retry_with_policy};

use crate::error::{Result, RuleError};
use crate::models::{RuleSnapshot, SharedSnapshot};
use crate::parser::parse_rows;
use crate::reporter::{ErrorReporter, RefreshFailure, TracingReporter};
use crate::source::RuleSource;
use crate::store::RuleStore;

/// 默认刷新间隔
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// 单次刷新的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// 新快照已发布
    Published { version: u64, rules: usize },
    /// 已有刷新在执行，本次跳过
    Skipped,
}

/// 规则刷新器
pub struct Refresher {
    store: RuleStore,
    source: Arc<dyn RuleSource>,
    reporter: Arc<dyn ErrorReporter>,
    source_id: String,
    range: String,
    interval: Duration,
    /// 串行化刷新，try_lock 失败即表示已有刷新在执行
    in_flight: Mutex<()>,
}

impl Refresher {
    pub fn new(
        store: RuleStore,
        source: Arc<dyn RuleSource>,
        source_id: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        Self {
            store,
            source,
            reporter: Arc::new(TracingReporter),
            source_id: source_id.into(),
            range: range.into(),
            interval: DEFAULT_REFRESH_INTERVAL,
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 拉取并解析，不发布
    async fn load_snapshot(&self) -> Result<RuleSnapshot> {
        let rows = self.source.fetch(&self.source_id, &self.range).await?;
        Ok(parse_rows(&rows.header, &rows.rows))
    }

    /// 启动时的首次加载
    ///
    /// `SourceUnavailable` 按策略重试，其余错误立即返回。返回错误时调用方应终止启动。
    #[instrument(skip(self, policy), fields(source_id = %self.source_id, range = %self.range))]
    pub async fn initial_load(&self, policy: &RetryPolicy) -> Result<SharedSnapshot> {
        let _guard = self.in_flight.lock().await;
        let started = Instant::now();

        let snapshot = retry_with_policy(policy, "initial_rule_load", RuleError::is_retryable, || {
            self.load_snapshot()
        })
        .await?;

        if snapshot.is_empty() {
            warn!("首次加载的规则表格不含任何有效规则");
        }

        let published = self.store.publish(snapshot);
        metrics::record_rule_refresh("published", started.elapsed().as_secs_f64());
        info!(
            version = published.version(),
            rules = published.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "规则首次加载完成"
        );
        Ok(published)
    }

    /// 立即刷新一次
    ///
    /// 错误原样返回，当前快照不受影响。
    #[instrument(skip(self), fields(source_id = %self.source_id))]
    pub async fn refresh_now(&self) -> Result<RefreshOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            info!("已有规则刷新在执行，跳过本次触发");
            metrics::record_rule_refresh("skipped", 0.0);
            return Ok(RefreshOutcome::Skipped);
        };
        let started = Instant::now();

        let snapshot = match self.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                metrics::record_rule_refresh("failed", started.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        let published = self.store.publish(snapshot);
        metrics::record_rule_refresh("published", started.elapsed().as_secs_f64());
        Ok(RefreshOutcome::Published {
            version: published.version(),
            rules: published.len(),
        })
    }

    /// 执行一次定时刷新，失败时上报并保留当前快照
    pub async fn tick(&self) -> Option<RefreshOutcome> {
        match self.refresh_now().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                let failure = RefreshFailure::new(&self.source_id, &e, self.store.read().version());
                self.reporter.report(&failure);
                None
            }
        }
    }

    /// 启动后台定时刷新
    ///
    /// 首次触发在一个间隔之后，错过的触发直接跳过。
    pub fn spawn(self: Arc<Self>) -> RefresherHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let refresher = self;

        let join = tokio::spawn(async move {
            let period = refresher.interval;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(interval_secs = period.as_secs(), "规则定时刷新已启动");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        refresher.tick().await;
                    }
                    // 句柄被丢弃时发送端关闭，同样退出
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("规则定时刷新已停止");
        });

        RefresherHandle { shutdown_tx, join }
    }
}

/// 后台刷新任务句柄
///
/// 丢弃句柄等同于通知刷新循环退出，但不等待其结束。
#[must_use = "丢弃句柄会停止后台刷新"]
pub struct RefresherHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RefresherHandle {
    /// 通知刷新循环退出并等待其结束
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "规则刷新任务异常退出");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
