//! # 统一日志工具模块
//!
//! 提供完整的日志工具链：
//! - 请求管道业务日志格式化
//! - 日志系统初始化和配置

use crate::error::{ErrorCategory, ProxyError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志阶段枚举
#[derive(Debug, Clone, Copy)]
pub enum LogStage {
    RequestStart,
    Authentication,
    PostAuth,
    Quota,
    UpstreamRequest,
    Response,
    Logging,
    Error,
    // 非请求上下文
    Startup,
    Shutdown,
    Configuration,
    Cache,
    Db,
    Portal,
    Internal,
}

impl LogStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequestStart => "request_start",
            Self::Authentication => "authentication",
            Self::PostAuth => "post_auth",
            Self::Quota => "quota",
            Self::UpstreamRequest => "upstream_request",
            Self::Response => "response",
            Self::Logging => "logging",
            Self::Error => "error",
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::Cache => "cache",
            Self::Db => "db",
            Self::Portal => "portal",
            Self::Internal => "internal",
        }
    }
}

/// 组件枚举
#[derive(Debug, Clone, Copy)]
pub enum LogComponent {
    // --- 系统组件 ---
    Main,
    Config,
    Cache,
    // --- 管道核心组件 ---
    Pipeline,
    Registry,
    Builder,
    // --- 管道阶段 ---
    Auth,
    Quota,
    Upstream,
    // --- 插件 ---
    HmacAuth,
    SqlBackend,
    MemoryBackend,
    Geolocation,
    LogPush,
    // --- 门户 ---
    Portal,
}

impl LogComponent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Cache => "cache",
            Self::Pipeline => "pipeline",
            Self::Registry => "registry",
            Self::Builder => "builder",
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Upstream => "upstream",
            Self::HmacAuth => "hmac_auth",
            Self::SqlBackend => "sql_backend",
            Self::MemoryBackend => "memory_backend",
            Self::Geolocation => "geolocation",
            Self::LogPush => "log_push",
            Self::Portal => "portal",
        }
    }
}

/// 标准日志宏 - 信息级别
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::info!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::info!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 调试级别
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::debug!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::debug!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 警告级别
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::warn!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::warn!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 错误级别
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::error!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::error!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 统一记录 `ProxyError` 的辅助函数，确保必备字段齐全。
///
/// 客户端类错误（4xx）记 warn，服务端类错误记 error。
pub fn log_proxy_error(
    request_id: &str,
    stage: LogStage,
    component: LogComponent,
    operation: &str,
    message: &str,
    error: &ProxyError,
) {
    let status_code = error.status_code().as_u16();
    let error_code = error.error_code();
    let error_message = error.to_string();

    match error.category() {
        ErrorCategory::Client => {
            lwarn!(
                request_id,
                stage,
                component,
                operation,
                message,
                error_code = %error_code,
                error_message = %error_message,
                status_code = status_code,
                error_category = "client"
            );
        }
        ErrorCategory::Server => {
            lerror!(
                request_id,
                stage,
                component,
                operation,
                message,
                error_code = %error_code,
                error_message = %error_message,
                status_code = status_code,
                error_category = "server"
            );
        }
    }
}

/// 初始化日志系统
///
/// 通过 `RUST_LOG` 控制过滤，默认 `info`。重复调用安全（忽略二次注册）。
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
