//! 决策入口

use tracing::{debug, instrument};
use typeset_shared::observability::metrics;

use crate::error::Result;
use crate::matcher::select_rule;
use crate::models::{Decision, DecisionQuery};
use crate::store::RuleStore;

/// 决策引擎
///
/// 每次决策读取当前快照后在其上匹配，决策期间发生的发布不影响本次结果。
#[derive(Clone)]
pub struct DecisionEngine {
    store: RuleStore,
}

impl DecisionEngine {
    pub fn new(store: RuleStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// 按四个属性做出决策
    ///
    /// 缺少字段返回 `RuleError::Validation`；未命中返回 `Decision::NoMatch`。
    #[instrument(skip(self), fields(snapshot_version = tracing::field::Empty))]
    pub fn decide(&self, query: &DecisionQuery) -> Result<Decision> {
        let snapshot = self.store.read();
        tracing::Span::current().record("snapshot_version", snapshot.version());

        let decision = select_rule(query, &snapshot)?.into_decision();

        metrics::record_decision(decision.kind());
        debug!(
            result = decision.kind(),
            rule_id = decision.rule().map(|r| r.rule_id.as_str()),
            "决策完成"
        );
        Ok(decision)
    }
}
