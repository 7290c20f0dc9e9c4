//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("规则源不可用: {0}")]
    SourceUnavailable(String),

    #[error("规则源数据格式错误: {0}")]
    MalformedSource(String),

    #[error("配置错误: {0}")]
    Configuration(String),
}

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            Self::MalformedSource(_) => "MALFORMED_SOURCE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 只有网络/认证类的瞬时故障值得重试，数据格式错误重试也不会变好。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }

    /// 是否来自规则源
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::MalformedSource(_))
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
