//! 排版规则决策引擎
//!
//! 从外部表格数据源周期性加载排版规则，提供：
//! - 表格行到规则实体的解析
//! - 基于 ArcSwap 的不可变快照存储，读取无锁
//! - 按优先级选取规则并支持兜底规则的匹配器
//! - 失败保留旧快照的后台刷新器
//! - 对外的 HTTP 决策接口

pub mod engine;
pub mod error;
pub mod http;
pub mod matcher;
pub mod models;
pub mod parser;
pub mod refresher;
pub mod reporter;
pub mod source;
pub mod store;

pub use engine::DecisionEngine;
pub use error::{Result, RuleError};
pub use matcher::{Selection, select_rule};
pub use models::{Decision, DecisionQuery, FALLBACK_PRIORITY, Rule, RuleSnapshot};
pub use parser::parse_rows;
pub use refresher::{RefreshOutcome, Refresher, RefresherHandle};
pub use reporter::{ErrorReporter, RefreshFailure, TracingReporter};
pub use source::{FileRuleSource, RuleSource, SheetRows, SheetsRuleSource};
pub use store::{RuleStore, StoreStatus};
