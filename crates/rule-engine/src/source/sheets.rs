//! Google Sheets 规则源

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, instrument};
use typeset_shared::config::SourceConfig;

use super::{RuleSource, SheetRows};
use crate::error::{Result, RuleError};

/// 访问凭证
///
/// 凭证由部署环境预先签发，本服务只负责携带。
#[derive(Clone)]
enum Credential {
    ApiKey(String),
    Bearer(String),
    Anonymous,
}

/// 通过 Sheets v4 values API 读取规则表格
pub struct SheetsRuleSource {
    client: reqwest::Client,
    base_url: Url,
    credential: Credential,
}

impl SheetsRuleSource {
    /// 从配置创建
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(RuleError::Configuration(
                "source.kind = sheets 时必须配置 source.spreadsheet_id".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RuleError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        let credential = match (&config.bearer_token, &config.api_key) {
            (Some(token), _) if !token.is_empty() => Credential::Bearer(token.clone()),
            (_, Some(key)) if !key.is_empty() => Credential::ApiKey(key.clone()),
            _ => Credential::Anonymous,
        };

        Self::with_client(client, &config.base_url, credential)
    }

    /// 使用 API Key 访问指定服务地址
    pub fn with_api_key(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        Self::with_client(
            reqwest::Client::new(),
            base_url,
            Credential::ApiKey(api_key.into()),
        )
    }

    /// 使用 bearer token 访问指定服务地址
    pub fn with_bearer_token(base_url: &str, token: impl Into<String>) -> Result<Self> {
        Self::with_client(
            reqwest::Client::new(),
            base_url,
            Credential::Bearer(token.into()),
        )
    }

    fn with_client(client: reqwest::Client, base_url: &str, credential: Credential) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RuleError::Configuration(format!("无效的 base_url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RuleError::Configuration(format!(
                "无效的 base_url {}",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            credential,
        })
    }

    /// 构造 values 接口地址，路径段会被百分号编码（range 中含有 `!` 和 `:`）
    fn values_url(&self, source_id: &str, range: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RuleError::Configuration(format!("无效的 base_url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", source_id, "values", range]);

        url.query_pairs_mut().append_pair("majorDimension", "ROWS");
        if let Credential::ApiKey(key) = &self.credential {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

#[async_trait]
impl RuleSource for SheetsRuleSource {
    #[instrument(skip(self))]
    async fn fetch(&self, source_id: &str, range: &str) -> Result<SheetRows> {
        let url = self.values_url(source_id, range)?;

        let mut request = self.client.get(url);
        if let Credential::Bearer(token) = &self.credential {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RuleError::SourceUnavailable(format!("请求规则表格失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuleError::SourceUnavailable(format!(
                "规则表格返回 HTTP {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RuleError::SourceUnavailable(format!("读取响应失败: {}", e)))?;

        let rows = SheetRows::from_value_range(&body)?;
        debug!(rows = rows.rows.len(), "规则表格读取完成");
        Ok(rows)
    }
}
