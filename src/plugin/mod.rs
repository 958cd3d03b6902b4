//! # 插件系统
//!
//! 网关的全部可扩展点：注册表 → 装配器 → 角色列表。
//! 基础能力（配置）加角色能力（认证、后端、各管道阶段、日志）
//! 组成一个插件；角色探测是方法调用而非反射。

mod builder;
mod geolocation;
mod hmac_auth;
mod log_push;
mod memory_backend;
mod registry;
mod roles;
mod sql_backend;

pub use builder::{BuiltPlugin, build_role, merge_defaults};
pub use geolocation::GeolocationPlugin;
pub use hmac_auth::HmacAuthPlugin;
pub use log_push::LogPushPlugin;
pub use memory_backend::MemoryBackendPlugin;
pub use registry::{
    PluginDescriptor, available_plugins, example_configuration, install_builtin_plugins,
    instantiate, register_plugin,
};
pub use roles::{
    AuthPlugin, BackendPlugin, Detection, LoggingPlugin, ManagementPlugin, PostAuthPlugin,
    PostUpstreamPlugin, PreUpstreamPlugin,
};
pub use sql_backend::SqlBackendPlugin;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::JsonMap;

/// 插件基础能力
///
/// `default_config` 提供可合并的默认配置；`configure` 在装配时调用一次，
/// 返回后实例即被视为线程安全、只读共享。角色探测方法默认返回 `None`，
/// 插件为自己承担的每个角色覆盖对应方法。
#[async_trait]
pub trait GatewayPlugin: Send + Sync {
    /// 默认配置；用户配置按键逐个合并到其上
    fn default_config(&self) -> JsonMap {
        JsonMap::new()
    }

    /// 应用合并后的配置
    async fn configure(&mut self, config: JsonMap) -> Result<()> {
        let _ = config;
        Ok(())
    }

    fn as_auth(self: Arc<Self>) -> Option<Arc<dyn AuthPlugin>> {
        None
    }

    fn as_backend(self: Arc<Self>) -> Option<Arc<dyn BackendPlugin>> {
        None
    }

    fn as_management(self: Arc<Self>) -> Option<Arc<dyn ManagementPlugin>> {
        None
    }

    fn as_post_auth(self: Arc<Self>) -> Option<Arc<dyn PostAuthPlugin>> {
        None
    }

    fn as_pre_upstream(self: Arc<Self>) -> Option<Arc<dyn PreUpstreamPlugin>> {
        None
    }

    fn as_post_upstream(self: Arc<Self>) -> Option<Arc<dyn PostUpstreamPlugin>> {
        None
    }

    fn as_logging(self: Arc<Self>) -> Option<Arc<dyn LoggingPlugin>> {
        None
    }
}
