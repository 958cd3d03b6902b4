//! # 插件装配错误

use thiserror::Error;

use super::ProxyError;

/// 装配管道阶段时可能出现的错误
///
/// 每个变体对应装配流程中的一个失败点：名称解析、角色探测、
/// 配置合并和 `configure` 调用。
#[derive(Debug, Error)]
pub enum PluginBuildError {
    /// 注册表中不存在该名称
    #[error("未注册的插件: '{0}'")]
    UnknownPlugin(String),

    /// 插件实例不具备所需角色能力
    #[error("插件 '{plugin}' 不支持 {role} 角色")]
    RoleMismatch {
        plugin: String,
        role: &'static str,
    },

    /// 用户配置项与默认值的 JSON 类型不一致
    #[error("插件 '{plugin}' 的配置项 '{field}' 类型错误，期望 {expected}")]
    BadOption {
        plugin: String,
        field: String,
        expected: &'static str,
    },

    /// 插件自身的 `configure` 调用失败
    #[error("配置插件 '{plugin}' 失败: {source}")]
    ConfigureFailed {
        plugin: String,
        #[source]
        source: Box<ProxyError>,
    },
}

impl PluginBuildError {
    pub fn configure_failed(plugin: impl Into<String>, source: ProxyError) -> Self {
        Self::ConfigureFailed {
            plugin: plugin.into(),
            source: Box::new(source),
        }
    }
}
