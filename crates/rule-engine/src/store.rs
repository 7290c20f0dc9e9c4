//! 规则快照存储
//!
//! 使用 `ArcSwap` 持有当前发布的快照：读取只是一次原子 load，不会阻塞；
//! 发布是一次原子指针替换，读者看到的要么是旧快照，要么是完整的新快照。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;
use typeset_shared::observability::metrics;

use crate::models::{RuleSnapshot, SharedSnapshot};

/// 规则存储
///
/// 克隆开销很小，所有克隆共享同一份快照。
#[derive(Clone)]
pub struct RuleStore {
    /// 当前快照，读取端通过 ArcSwap::load_full 获取（无锁）
    current: Arc<ArcSwap<RuleSnapshot>>,
    /// 已发布的最大版本号
    version: Arc<AtomicU64>,
    /// 快照变更通知
    tx: watch::Sender<SharedSnapshot>,
}

impl RuleStore {
    /// 创建存储，初始对外可见的是空快照
    pub fn new() -> Self {
        let empty = Arc::new(RuleSnapshot::empty());
        let (tx, _) = watch::channel(empty.clone());
        Self {
            current: Arc::new(ArcSwap::from(empty)),
            version: Arc::new(AtomicU64::new(0)),
            tx,
        }
    }

    /// 获取当前快照
    pub fn read(&self) -> SharedSnapshot {
        self.current.load_full()
    }

    /// 发布新快照，整体替换当前快照
    ///
    /// 快照必须在调用前完整构建。并发发布由 Refresher 串行化。
    pub fn publish(&self, snapshot: RuleSnapshot) -> SharedSnapshot {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(snapshot.with_version(version));

        self.current.store(snapshot.clone());
        self.tx.send_replace(snapshot.clone());
        metrics::set_snapshot_rules(snapshot.len());

        info!(
            version,
            rules = snapshot.len(),
            fallback_rules = snapshot.fallback_count(),
            dropped_rows = snapshot.dropped_rows(),
            "规则快照已发布"
        );
        snapshot
    }

    /// 订阅快照发布通知
    pub fn subscribe(&self) -> watch::Receiver<SharedSnapshot> {
        self.tx.subscribe()
    }

    /// 是否已有成功发布的快照
    pub fn is_loaded(&self) -> bool {
        self.current.load().version() > 0
    }

    /// 获取存储状态
    pub fn status(&self) -> StoreStatus {
        let snapshot = self.current.load();
        StoreStatus {
            loaded: snapshot.version() > 0,
            version: snapshot.version(),
            rule_count: snapshot.len(),
            fallback_count: snapshot.fallback_count(),
            dropped_rows: snapshot.dropped_rows(),
            loaded_at: snapshot.loaded_at(),
        }
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 存储状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStatus {
    pub loaded: bool,
    pub version: u64,
    pub rule_count: usize,
    pub fallback_count: usize,
    pub dropped_rows: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}
