//! 规则源
//!
//! ```text
//! RuleSource trait
//!  ├── SheetsRuleSource: Google Sheets values API（默认）
//!  └── FileRuleSource:   本地 JSON 文件，与 Sheets 响应同构，用于本地开发
//! ```

mod file;
mod sheets;

pub use file::FileRuleSource;
pub use sheets::SheetsRuleSource;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use typeset_shared::config::{SourceConfig, SourceKind};

use crate::error::{Result, RuleError};

/// 表格原始数据：表头行加数据行，单元格未做任何裁剪
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRows {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetRows {
    /// 从二维单元格网格构建，首行为表头
    ///
    /// 网格为空（没有表头行）或含有非字符串单元格时返回 `MalformedSource`。
    pub fn from_grid(values: Vec<Vec<Value>>) -> Result<Self> {
        let mut grid = values
            .into_iter()
            .enumerate()
            .map(|(row_index, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(col_index, cell)| match cell {
                        Value::String(s) => Ok(s),
                        other => Err(RuleError::MalformedSource(format!(
                            "第 {} 行第 {} 列不是字符串: {}",
                            row_index + 1,
                            col_index + 1,
                            other
                        ))),
                    })
                    .collect::<Result<Vec<String>>>()
            })
            .collect::<Result<Vec<Vec<String>>>>()?
            .into_iter();

        let header = grid
            .next()
            .ok_or_else(|| RuleError::MalformedSource("缺少表头行".to_string()))?;

        Ok(Self {
            header,
            rows: grid.collect(),
        })
    }

    /// 解析 values API 的 JSON 响应体
    pub fn from_value_range(body: &[u8]) -> Result<Self> {
        let range: ValueRange = serde_json::from_slice(body)
            .map_err(|e| RuleError::MalformedSource(format!("响应不是二维表格: {}", e)))?;
        Self::from_grid(range.values)
    }
}

/// Sheets values API 的响应结构，空范围时不返回 values 字段
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// 规则源抽象
///
/// 不同数据源实现此 trait，返回原始表格数据。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// 读取指定表格范围
    ///
    /// 网络或认证失败返回 `SourceUnavailable`，数据形状不符返回 `MalformedSource`。
    async fn fetch(&self, source_id: &str, range: &str) -> Result<SheetRows>;
}

/// 根据配置创建对应的规则源
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn RuleSource>> {
    match config.kind {
        SourceKind::Sheets => Ok(Arc::new(SheetsRuleSource::from_config(config)?)),
        SourceKind::File => {
            if config.source_id().is_empty() {
                return Err(RuleError::Configuration(
                    "source.kind = file 时必须配置 source.file_path".to_string(),
                ));
            }
            Ok(Arc::new(FileRuleSource))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_grid_splits_header() {
        let rows = SheetRows::from_grid(vec![
            vec![json!("rule_id"), json!("usage")],
            vec![json!("R1"), json!("print")],
            vec![],
        ])
        .unwrap();

        assert_eq!(rows.header, vec!["rule_id", "usage"]);
        assert_eq!(rows.rows.len(), 2);
        assert!(rows.rows[1].is_empty());
    }

    #[test]
    fn test_from_grid_rejects_non_string_cells() {
        let err = SheetRows::from_grid(vec![
            vec![json!("rule_id"), json!("priority")],
            vec![json!("R1"), json!(10)],
        ])
        .unwrap_err();

        assert_eq!(err.code(), "MALFORMED_SOURCE");
    }

    #[test]
    fn test_from_value_range_without_values_is_malformed() {
        let err = SheetRows::from_value_range(br#"{"range": "Rules!A1:Z"}"#).unwrap_err();
        assert_eq!(err, RuleError::MalformedSource("缺少表头行".to_string()));
    }

    #[test]
    fn test_from_value_range_rejects_flat_array() {
        let err = SheetRows::from_value_range(br#"{"values": ["a", "b"]}"#).unwrap_err();
        assert!(matches!(err, RuleError::MalformedSource(_)));
    }

    #[test]
    fn test_build_file_source_requires_path() {
        let config = SourceConfig {
            kind: SourceKind::File,
            ..Default::default()
        };
        assert!(matches!(
            build_source(&config),
            Err(RuleError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_sheets_source_requires_spreadsheet_id() {
        let config = SourceConfig::default();
        assert!(matches!(
            build_source(&config),
            Err(RuleError::Configuration(_))
        ));
    }
}
