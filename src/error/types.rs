//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

use super::plugin::PluginBuildError;

/// 错误类别：区分客户端可见错误与服务端内部错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Client,
    Server,
}

/// 应用主要错误类型
///
/// `Abort` 是插件和网关主动返回给调用方的结构化失败（自带状态码和
/// 人类可读消息）；其余变体一律视为内部故障，网关边界统一渲染为 500。
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 中止请求：状态码 + 消息原样返回给客户端
    #[error("{message}")]
    Abort { status: u16, message: String },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 插件装配错误
    #[error(transparent)]
    PluginBuild(#[from] PluginBuildError),

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 缓存/键值存储相关错误
    #[error("缓存错误: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 网络通信错误
    #[error("网络错误: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 认证和授权错误
    #[error("认证错误: {message}")]
    Auth {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游不可达（传输层失败）
    #[error("上游服务器不可用: {message}")]
    UpstreamUnavailable {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游响应超时
    #[error("上游响应超时: {message}")]
    UpstreamTimeout {
        message: String,
        timeout_seconds: u64,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 服务器初始化错误
    #[error("服务器初始化错误: {message}")]
    ServerInit {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务器启动错误
    #[error("服务器启动错误: {message}")]
    ServerStart {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ProxyError {
    /// 网关边界的响应状态码
    ///
    /// `Abort` 使用自带状态；上游失败映射 502/504；其余一律 500。
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Abort { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 日志用错误代码
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Abort { .. } => "ABORT",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::PluginBuild(_) => "PLUGIN_BUILD_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Cache { .. } => "CACHE_ERROR",
            Self::Network { .. } => "NETWORK_ERROR",
            Self::Auth { .. } => "AUTH_ERROR",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_NOT_AVAILABLE",
            Self::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::ServerInit { .. } => "SERVER_INIT_ERROR",
            Self::ServerStart { .. } => "SERVER_START_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// 错误类别（4xx 归为客户端，其余归为服务端）
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.status_code().is_client_error() {
            ErrorCategory::Client
        } else {
            ErrorCategory::Server
        }
    }

    /// 创建中止错误（状态码 0 时回落到 400）
    pub fn abort<T: Into<String>>(status: u16, message: T) -> Self {
        let status = if status == 0 { 400 } else { status };
        Self::Abort {
            status,
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建缓存错误
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的缓存错误
    pub fn cache_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建网络错误
    pub fn network<T: Into<String>>(message: T) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的网络错误
    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建认证错误
    pub fn auth<T: Into<String>>(message: T) -> Self {
        Self::Auth {
            message: message.into(),
            source: None,
        }
    }

    /// 创建上游不可用错误
    pub fn upstream_unavailable<T: Into<String>>(message: T) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的上游不可用错误
    pub fn upstream_unavailable_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建上游超时错误
    pub fn upstream_timeout<T: Into<String>>(message: T, timeout_seconds: u64) -> Self {
        Self::UpstreamTimeout {
            message: message.into(),
            timeout_seconds,
        }
    }

    /// 创建序列化错误
    pub fn serialization_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: source.into(),
        }
    }

    /// 创建服务器初始化错误
    pub fn server_init<T: Into<String>>(message: T) -> Self {
        Self::ServerInit {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的服务器初始化错误
    pub fn server_init_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerInit {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的服务器启动错误
    pub fn server_start_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            message: source.to_string(),
            source,
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(source: serde_json::Error) -> Self {
        Self::serialization_with_source("JSON 编解码失败", source)
    }
}
