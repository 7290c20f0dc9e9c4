//! 规则引擎领域模型

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};

/// 兜底规则的优先级
pub const FALLBACK_PRIORITY: i64 = 100;

/// 排版规则
///
/// 由解析器在一次加载中创建，发布后不再修改。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub usage: String,
    pub audience: String,
    pub density: String,
    pub tone: String,
    pub font_style: String,
    pub weight: String,
    pub spacing: String,
    pub priority: i64,
    /// 备注，不参与匹配
    pub note: String,
    /// 表头中未识别的列，原样保留
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Rule {
    pub fn is_fallback(&self) -> bool {
        self.priority == FALLBACK_PRIORITY
    }

    /// 四个匹配属性是否与查询完全相等（区分大小写）
    pub fn matches(&self, key: &QueryKey<'_>) -> bool {
        self.usage == key.usage
            && self.audience == key.audience
            && self.density == key.density
            && self.tone == key.tone
    }
}

/// 规则快照
///
/// 一次解析产出的完整、有序、不可变的规则集合。顺序与源表格的行顺序一致。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSnapshot {
    version: u64,
    loaded_at: Option<DateTime<Utc>>,
    rules: Vec<Rule>,
    dropped_rows: usize,
}

impl RuleSnapshot {
    pub fn new(rules: Vec<Rule>, dropped_rows: usize) -> Self {
        Self {
            version: 0,
            loaded_at: Some(Utc::now()),
            rules,
            dropped_rows,
        }
    }

    /// 首次发布前对外可见的空快照
    pub fn empty() -> Self {
        Self::default()
    }

    /// 由 RuleStore 在发布时赋予版本号
    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 解析时被丢弃的行数
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn fallback_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_fallback()).count()
    }

    pub fn get(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }
}

impl<'a> IntoIterator for &'a RuleSnapshot {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// 决策查询
///
/// 字段在反序列化时允许缺失，由 `validate` 统一校验。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionQuery {
    pub usage: Option<String>,
    pub audience: Option<String>,
    pub density: Option<String>,
    pub tone: Option<String>,
}

impl DecisionQuery {
    pub fn new(
        usage: impl Into<String>,
        audience: impl Into<String>,
        density: impl Into<String>,
        tone: impl Into<String>,
    ) -> Self {
        Self {
            usage: Some(usage.into()),
            audience: Some(audience.into()),
            density: Some(density.into()),
            tone: Some(tone.into()),
        }
    }

    /// 校验四个字段均存在且非空
    pub fn validate(&self) -> Result<QueryKey<'_>> {
        fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
            match value.as_deref() {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(RuleError::Validation(format!("缺少必填字段 {}", field))),
            }
        }

        Ok(QueryKey {
            usage: required(&self.usage, "usage")?,
            audience: required(&self.audience, "audience")?,
            density: required(&self.density, "density")?,
            tone: required(&self.tone, "tone")?,
        })
    }
}

/// 校验通过的查询键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryKey<'a> {
    pub usage: &'a str,
    pub audience: &'a str,
    pub density: &'a str,
    pub tone: &'a str,
}

/// 决策结果
///
/// 未命中是正常的业务结果，不是错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 四个属性精确命中
    Matched(Rule),
    /// 无精确命中，返回兜底规则
    Fallback(Rule),
    /// 无命中且未配置兜底规则
    NoMatch,
}

impl Decision {
    pub fn rule(&self) -> Option<&Rule> {
        match self {
            Self::Matched(rule) | Self::Fallback(rule) => Some(rule),
            Self::NoMatch => None,
        }
    }

    pub fn into_rule(self) -> Option<Rule> {
        match self {
            Self::Matched(rule) | Self::Fallback(rule) => Some(rule),
            Self::NoMatch => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    /// 用于日志与指标的结果标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matched(_) => "exact",
            Self::Fallback(_) => "fallback",
            Self::NoMatch => "no_match",
        }
    }
}

/// 共享的快照引用
pub type SharedSnapshot = Arc<RuleSnapshot>;
