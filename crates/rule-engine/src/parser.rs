//! 表格行解析器
//!
//! 把表头行与数据行转换为规则快照。第一列固定视为规则 ID 列，
//! 单行格式问题只会让该行被丢弃，不会导致整体加载失败。

use tracing::debug;

use crate::models::{Rule, RuleSnapshot};

/// 规则 ID 列名
pub const RULE_ID_COLUMN: &str = "rule_id";

/// 解析表头与数据行，生成规则快照
///
/// - 表头逐格去除首尾空白，首列强制命名为 `rule_id`
/// - 数据行为空（零个单元格）时直接跳过
/// - 缺失的尾部单元格视为空字符串，表头名为空的列被忽略
/// - `rule_id` 为空的行被丢弃
pub fn parse_rows(header: &[String], rows: &[Vec<String>]) -> RuleSnapshot {
    let columns = normalize_header(header);
    let mut rules = Vec::with_capacity(rows.len());
    let mut dropped = 0;

    for (index, row) in rows.iter().enumerate() {
        if row.is_empty() {
            dropped += 1;
            continue;
        }

        let rule = map_row(&columns, row);
        if rule.rule_id.is_empty() {
            debug!(row = index + 2, "规则行缺少 rule_id，已丢弃");
            dropped += 1;
            continue;
        }
        rules.push(rule);
    }

    debug!(
        rules = rules.len(),
        dropped_rows = dropped,
        "规则表格解析完成"
    );
    RuleSnapshot::new(rules, dropped)
}

/// 规范化表头
pub fn normalize_header(header: &[String]) -> Vec<String> {
    header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            if i == 0 {
                RULE_ID_COLUMN.to_string()
            } else {
                cell.trim().to_string()
            }
        })
        .collect()
}

fn map_row(columns: &[String], row: &[String]) -> Rule {
    let mut rule = Rule::default();
    let mut priority = "";

    for (i, column) in columns.iter().enumerate() {
        if column.is_empty() {
            continue;
        }
        let value = row.get(i).map(|v| v.trim()).unwrap_or_default();

        // 同名列以靠后的为准
        match column.as_str() {
            RULE_ID_COLUMN => rule.rule_id = value.to_string(),
            "usage" => rule.usage = value.to_string(),
            "audience" => rule.audience = value.to_string(),
            "density" => rule.density = value.to_string(),
            "tone" => rule.tone = value.to_string(),
            "font_style" => rule.font_style = value.to_string(),
            "weight" => rule.weight = value.to_string(),
            "spacing" => rule.spacing = value.to_string(),
            "note" => rule.note = value.to_string(),
            "priority" => priority = value,
            other => {
                rule.extra.insert(other.to_string(), value.to_string());
            }
        }
    }

    rule.priority = coerce_priority(priority);
    rule
}

/// 将优先级文本转换为整数
///
/// 先按十进制整数解析，失败则按有限浮点数解析并向零截断；
/// 空值、非数字、NaN 与无穷大都视为 0。
pub fn coerce_priority(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    if let Ok(value) = raw.parse::<i64>() {
        return value;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value.trunc() as i64,
        _ => 0,
    }
}
