//! 配置管理模块
//!
//! 支持多层 TOML 配置文件加载与环境变量覆盖，提供类型安全的配置访问。

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 环境变量前缀，如 TYPESET_SOURCE__SPREADSHEET_ID -> source.spreadsheet_id
pub const ENV_PREFIX: &str = "TYPESET";

/// HTTP 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 规则源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Google Sheets values API
    #[default]
    Sheets,
    /// 本地 JSON 文件（与 Sheets 响应同构）
    File,
}

/// 规则源配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// 电子表格 ID
    pub spreadsheet_id: String,
    /// A1 表示法的读取范围
    pub range: String,
    pub base_url: String,
    /// API Key 与 bearer token 二选一，凭证的获取方式不在本服务职责内
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    /// kind = file 时读取的路径
    pub file_path: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Sheets,
            spreadsheet_id: String::new(),
            range: "Rules!A1:Z".to_string(),
            base_url: "https://sheets.googleapis.com".to_string(),
            api_key: None,
            bearer_token: None,
            file_path: None,
            timeout_secs: 10,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 规则源的标识，用于日志与 fetch 调用
    pub fn source_id(&self) -> &str {
        match self.kind {
            SourceKind::Sheets => &self.spreadsheet_id,
            SourceKind::File => self.file_path.as_deref().unwrap_or_default(),
        }
    }
}

/// 规则刷新配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// 周期刷新间隔（秒）
    pub interval_secs: u64,
    /// 启动时首次加载的最大重试次数
    pub initial_max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            initial_max_retries: 3,
            initial_retry_delay_ms: 1000,
            max_retry_delay_ms: 10_000,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，由 AppConfig 注入
    pub service_name: String,
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub refresh: RefreshConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的覆盖先加载的同名配置项）：
    /// 1. config/default.toml
    /// 2. config/{environment}.toml
    /// 3. config/{service_name}.toml
    /// 4. 环境变量（TYPESET_ 前缀，层级用双下划线分隔）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("TYPESET_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录加载配置
    pub fn load_from(
        config_dir: &Path,
        environment: &str,
        service_name: &str,
    ) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", environment)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", environment))).required(false),
            )
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 获取服务监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.source.kind, SourceKind::Sheets);
        assert_eq!(config.refresh.interval(), Duration::from_secs(300));
        assert!(!config.observability.json_logs());
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_refresh_interval_never_zero() {
        let refresh = RefreshConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(refresh.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_layered_files_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            r#"
            [server]
            port = 7000

            [source]
            kind = "file"
            file_path = "rules.json"
            "#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("staging.toml"),
            r#"
            [refresh]
            interval_secs = 60
            "#,
        )
        .unwrap();

        let config = AppConfig::load_from(dir.path(), "staging", "rule-engine").unwrap();

        assert_eq!(config.service_name, "rule-engine");
        assert_eq!(config.environment, "staging");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(config.source.source_id(), "rules.json");
        assert_eq!(config.refresh.interval_secs, 60);
        // 未覆盖的字段保持默认值
        assert_eq!(config.refresh.initial_max_retries, 3);
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path(), "development", "rule-engine").unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(!config.is_production());
    }
}
