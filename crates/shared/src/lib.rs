//! 共享库
//!
//! 包含决策服务共用的配置加载、可观测性初始化和重试等基础设施代码。

pub mod config;
pub mod observability;
pub mod retry;
