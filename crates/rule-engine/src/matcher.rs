//! 规则匹配器
//!
//! 在借用的不可变快照上选出一条规则，不产生任何副作用。

use crate::error::Result;
use crate::models::{Decision, DecisionQuery, Rule, RuleSnapshot};

/// 匹配结果，借用自快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    Exact(&'a Rule),
    Fallback(&'a Rule),
    NoMatch,
}

impl<'a> Selection<'a> {
    pub fn rule(&self) -> Option<&'a Rule> {
        match *self {
            Self::Exact(rule) | Self::Fallback(rule) => Some(rule),
            Self::NoMatch => None,
        }
    }

    /// 转换为不再借用快照的决策结果
    pub fn into_decision(self) -> Decision {
        match self {
            Self::Exact(rule) => Decision::Matched(rule.clone()),
            Self::Fallback(rule) => Decision::Fallback(rule.clone()),
            Self::NoMatch => Decision::NoMatch,
        }
    }
}

/// 按查询选择规则
///
/// 1. 过滤出四个属性全部相等的规则
/// 2. 有命中时按优先级降序稳定排序，同优先级保持快照顺序，取第一条
/// 3. 无命中时在整个快照中取第一条优先级为 100 的兜底规则，不看查询属性
///
/// 查询缺少字段时返回 `RuleError::Validation`。
pub fn select_rule<'a>(query: &DecisionQuery, snapshot: &'a RuleSnapshot) -> Result<Selection<'a>> {
    let key = query.validate()?;

    let mut candidates: Vec<&Rule> = snapshot.iter().filter(|r| r.matches(&key)).collect();
    if !candidates.is_empty() {
        // sort_by 是稳定排序
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        return Ok(Selection::Exact(candidates[0]));
    }

    Ok(snapshot
        .iter()
        .find(|r| r.is_fallback())
        .map_or(Selection::NoMatch, Selection::Fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;

    fn rule(id: &str, attrs: [&str; 4], priority: i64) -> Rule {
        Rule {
            rule_id: id.to_string(),
            usage: attrs[0].to_string(),
            audience: attrs[1].to_string(),
            density: attrs[2].to_string(),
            tone: attrs[3].to_string(),
            priority,
            ..Default::default()
        }
    }

    const PRINT_TEEN: [&str; 4] = ["print", "teen", "high", "friendly"];

    fn query(attrs: [&str; 4]) -> DecisionQuery {
        DecisionQuery::new(attrs[0], attrs[1], attrs[2], attrs[3])
    }

    #[test]
    fn test_exact_match() {
        let snapshot = RuleSnapshot::new(
            vec![
                rule("R1", PRINT_TEEN, 10),
                rule("SYS", ["", "", "", ""], 100),
            ],
            0,
        );

        let selection = select_rule(&query(PRINT_TEEN), &snapshot).unwrap();

        assert_eq!(selection.rule().unwrap().rule_id, "R1");
        assert!(matches!(selection, Selection::Exact(_)));
    }

    #[test]
    fn test_highest_priority_wins() {
        let snapshot = RuleSnapshot::new(
            vec![
                rule("LOW", PRINT_TEEN, 1),
                rule("HIGH", PRINT_TEEN, 50),
                rule("MID", PRINT_TEEN, 20),
            ],
            0,
        );

        let selection = select_rule(&query(PRINT_TEEN), &snapshot).unwrap();

        assert_eq!(selection.rule().unwrap().rule_id, "HIGH");
    }

    #[test]
    fn test_equal_priority_keeps_snapshot_order() {
        let snapshot = RuleSnapshot::new(
            vec![
                rule("A", PRINT_TEEN, 5),
                rule("B", PRINT_TEEN, 7),
                rule("C", PRINT_TEEN, 7),
                rule("D", PRINT_TEEN, 7),
            ],
            0,
        );

        let selection = select_rule(&query(PRINT_TEEN), &snapshot).unwrap();

        assert_eq!(selection.rule().unwrap().rule_id, "B");
    }

    #[test]
    fn test_exact_match_beats_fallback_even_with_lower_priority() {
        let snapshot = RuleSnapshot::new(
            vec![
                rule("SYS", ["web", "adult", "low", "formal"], 100),
                rule("R1", PRINT_TEEN, -3),
            ],
            0,
        );

        let selection = select_rule(&query(PRINT_TEEN), &snapshot).unwrap();

        assert_eq!(selection, Selection::Exact(&snapshot.rules()[1]));
    }

    #[test]
    fn test_fallback_ignores_query_attributes() {
        let snapshot = RuleSnapshot::new(
            vec![
                rule("R1", PRINT_TEEN, 10),
                rule("SYS1", ["web", "kid", "low", "calm"], 100),
                rule("SYS2", ["", "", "", ""], 100),
            ],
            0,
        );

        let selection = select_rule(&query(["web", "adult", "low", "formal"]), &snapshot).unwrap();

        assert_eq!(selection, Selection::Fallback(&snapshot.rules()[1]));
    }

    #[test]
    fn test_no_match_without_fallback() {
        let snapshot = RuleSnapshot::new(vec![rule("R1", PRINT_TEEN, 10)], 0);

        let selection = select_rule(&query(["web", "adult", "low", "formal"]), &snapshot).unwrap();

        assert_eq!(selection, Selection::NoMatch);
        assert_eq!(selection.into_decision(), Decision::NoMatch);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let snapshot = RuleSnapshot::new(vec![rule("R1", PRINT_TEEN, 10)], 0);

        let selection =
            select_rule(&query(["Print", "teen", "high", "friendly"]), &snapshot).unwrap();

        assert_eq!(selection, Selection::NoMatch);
    }

    #[test]
    fn test_empty_snapshot_is_no_match() {
        let empty = RuleSnapshot::empty();
        let selection = select_rule(&query(PRINT_TEEN), &empty).unwrap();
        assert_eq!(selection, Selection::NoMatch);
    }

    #[test]
    fn test_missing_field_is_validation_error() {
        let snapshot = RuleSnapshot::new(vec![rule("R1", PRINT_TEEN, 10)], 0);
        let query = DecisionQuery {
            density: None,
            ..query(PRINT_TEEN)
        };

        let err = select_rule(&query, &snapshot).unwrap_err();

        assert!(matches!(err, RuleError::Validation(_)));
    }

    #[test]
    fn test_every_rule_is_reachable_by_its_own_attributes() {
        let snapshot = RuleSnapshot::new(
            vec![
                rule("R1", PRINT_TEEN, 10),
                rule("R2", ["web", "adult", "low", "formal"], 0),
                rule("R3", ["web", "adult", "low", "formal"], 3),
                rule("R4", ["app", "kid", "mid", "playful"], 100),
            ],
            0,
        );

        for r in snapshot.iter() {
            let q = query([&r.usage, &r.audience, &r.density, &r.tone].map(String::as_str));
            let selected = select_rule(&q, &snapshot).unwrap().rule().unwrap();
            assert_eq!(
                (&selected.usage, &selected.audience, &selected.density, &selected.tone),
                (&r.usage, &r.audience, &r.density, &r.tone)
            );
        }
    }
}
