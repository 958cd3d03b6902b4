//! # 插件注册表
//!
//! 进程级 名称 → 描述符 映射。服务启动前填充完毕，热路径只读。
//! 重复注册以后者为准。

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::config::{AppConfig, PluginEntry, PluginsConfig};
use crate::error::{PluginBuildError, Result};
use crate::plugin::GatewayPlugin;
use crate::types::Quota;

/// 插件描述符：人类可读信息 + 实例化工厂
#[derive(Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub description: String,
    pub link: String,
    factory: fn() -> Box<dyn GatewayPlugin>,
}

impl PluginDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        link: impl Into<String>,
        factory: fn() -> Box<dyn GatewayPlugin>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            link: link.into(),
            factory,
        }
    }

    /// 从原型创建全新实例；同名插件的多次装配互不共享状态
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn GatewayPlugin> {
        (self.factory)()
    }
}

static REGISTRY: LazyLock<RwLock<HashMap<String, PluginDescriptor>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// 注册插件；同名替换
pub fn register_plugin(descriptor: PluginDescriptor) {
    let mut registry = REGISTRY.write().unwrap();
    registry.insert(descriptor.name.clone(), descriptor);
}

/// 按名称取得描述符
#[must_use]
pub fn lookup(name: &str) -> Option<PluginDescriptor> {
    let registry = REGISTRY.read().unwrap();
    registry.get(name).cloned()
}

/// 按名称实例化
pub fn instantiate(name: &str) -> Result<Box<dyn GatewayPlugin>> {
    lookup(name)
        .map(|d| d.instantiate())
        .ok_or_else(|| PluginBuildError::UnknownPlugin(name.to_string()).into())
}

/// 可用插件列表：名称 → 描述
#[must_use]
pub fn available_plugins() -> HashMap<String, String> {
    let registry = REGISTRY.read().unwrap();
    registry
        .iter()
        .map(|(name, d)| (name.clone(), d.description.clone()))
        .collect()
}

/// 注册全部内置插件
pub fn install_builtin_plugins() {
    register_plugin(PluginDescriptor::new(
        "hmac",
        "Authenticate requests via HMAC request signing.",
        "https://docs.rs/api-gateway/latest/api_gateway/plugin/struct.HmacAuthPlugin.html",
        || Box::new(crate::plugin::HmacAuthPlugin::default()),
    ));
    register_plugin(PluginDescriptor::new(
        "sql",
        "Use popular SQL databases as backend stores (with full user/key management).",
        "https://docs.rs/api-gateway/latest/api_gateway/plugin/struct.SqlBackendPlugin.html",
        || Box::new(crate::plugin::SqlBackendPlugin::default()),
    ));
    register_plugin(PluginDescriptor::new(
        "memory",
        "In-process backend store with full user/key management (tests, single node).",
        "https://docs.rs/api-gateway/latest/api_gateway/plugin/struct.MemoryBackendPlugin.html",
        || Box::new(crate::plugin::MemoryBackendPlugin::default()),
    ));
    register_plugin(PluginDescriptor::new(
        "geolocation",
        "Resolve client IPs to their geographical location.",
        "https://docs.rs/api-gateway/latest/api_gateway/plugin/struct.GeolocationPlugin.html",
        || Box::new(crate::plugin::GeolocationPlugin::default()),
    ));
    register_plugin(PluginDescriptor::new(
        "log-push",
        "POST the per-request log map to an HTTP collector.",
        "https://docs.rs/api-gateway/latest/api_gateway/plugin/struct.LogPushPlugin.html",
        || Box::new(crate::plugin::LogPushPlugin::default()),
    ));
}

/// 为给定插件生成一份示例配置骨架
///
/// 每个插件按其声明的角色落入对应清单，配置为插件默认值。
pub fn example_configuration(plugin_names: &[&str]) -> Result<AppConfig> {
    let mut plugins = PluginsConfig::default();

    for name in plugin_names {
        let descriptor = lookup(name)
            .ok_or_else(|| PluginBuildError::UnknownPlugin((*name).to_string()))?;
        let instance: std::sync::Arc<dyn GatewayPlugin> =
            std::sync::Arc::from(descriptor.instantiate());
        let entry = PluginEntry {
            plugin: descriptor.name.clone(),
            config: instance.default_config(),
        };

        if instance.clone().as_auth().is_some() {
            plugins.auth.push(entry.clone());
        }
        if instance.clone().as_backend().is_some() {
            plugins.backend.push(entry.clone());
        }
        if instance.clone().as_post_auth().is_some() {
            plugins.post_auth.push(entry.clone());
        }
        if instance.clone().as_pre_upstream().is_some() {
            plugins.pre_upstream.push(entry.clone());
        }
        if instance.clone().as_post_upstream().is_some() {
            plugins.post_upstream.push(entry.clone());
        }
        if instance.as_logging().is_some() {
            plugins.logging.push(entry);
        }
    }

    let mut quotas = std::collections::HashMap::new();
    quotas.insert(
        "default".to_string(),
        Quota {
            minutes: 5,
            max_ip: 50,
            max_key: 5000,
        },
    );

    Ok(AppConfig {
        auth_cache_minutes: 10,
        redis: crate::config::RedisConfig::default(),
        serve: crate::config::ServeConfig {
            port: 5000,
            api: "/".to_string(),
            upstreams: vec!["http://your-actual-api:8000/".to_string()],
            portal_api: "/portal/api/".to_string(),
            portal: "/portal/".to_string(),
            signing_key: String::new(),
            upstream_timeout_seconds: 30,
        },
        quotas,
        plugins,
    })
}
