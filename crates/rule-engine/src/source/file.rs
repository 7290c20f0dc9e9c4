//! 本地文件规则源

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{RuleSource, SheetRows};
use crate::error::{Result, RuleError};

/// 本地 JSON 文件规则源
///
/// 文件内容与 Sheets values API 响应同构：`{"values": [["rule_id", ...], ...]}`。
/// `source_id` 即文件路径，`range` 被忽略。
#[derive(Debug, Default, Clone, Copy)]
pub struct FileRuleSource;

#[async_trait]
impl RuleSource for FileRuleSource {
    #[instrument(skip(self))]
    async fn fetch(&self, source_id: &str, range: &str) -> Result<SheetRows> {
        let path = Path::new(source_id);
        let body = tokio::fs::read(path).await.map_err(|e| {
            RuleError::SourceUnavailable(format!("读取规则文件 {} 失败: {}", path.display(), e))
        })?;

        let rows = SheetRows::from_value_range(&body)?;
        debug!(rows = rows.rows.len(), "规则文件读取完成");
        Ok(rows)
    }
}
