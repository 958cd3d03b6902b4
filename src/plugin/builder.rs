//! # 插件装配器
//!
//! 把用户的有序 `(plugin, config)` 清单装配成某个角色的就绪插件列表。
//! 启动时单线程执行一次，之后列表冻结。

use std::sync::Arc;

use serde_json::Value;

use crate::config::PluginEntry;
use crate::error::{PluginBuildError, ProxyError, Result};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};
use crate::plugin::{GatewayPlugin, registry};
use crate::types::JsonMap;

/// 装配完成的插件：基础实例 + 提取出的角色视图
///
/// 保留基础实例是为了事后再探测其它角色（比如在后端列表里
/// 挑选管理后端）。
pub struct BuiltPlugin<T: ?Sized> {
    pub name: String,
    pub instance: Arc<dyn GatewayPlugin>,
    pub role: Arc<T>,
}

impl<T: ?Sized> std::fmt::Debug for BuiltPlugin<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltPlugin")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// JSON 值的类型标签，用于配置类型检查
const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 将用户配置合并到插件默认配置上
///
/// 对每个默认键：用户提供时类型必须一致，缺失时补默认值；
/// 用户多出的键原样通过。重复合并与单次合并结果相同。
pub fn merge_defaults(
    plugin: &str,
    user: &JsonMap,
    defaults: &JsonMap,
) -> std::result::Result<JsonMap, PluginBuildError> {
    let mut merged = user.clone();
    for (field, default_value) in defaults {
        match merged.get(field) {
            Some(user_value) => {
                if value_kind(user_value) != value_kind(default_value) {
                    return Err(PluginBuildError::BadOption {
                        plugin: plugin.to_string(),
                        field: field.clone(),
                        expected: value_kind(default_value),
                    });
                }
            }
            None => {
                merged.insert(field.clone(), default_value.clone());
            }
        }
    }
    Ok(merged)
}

/// 装配一个角色的全部插件，保序
///
/// 对每个清单项：解析名称 → 实例化 → 角色探测 → 配置合并 →
/// `configure`。同名插件的多次出现得到互相独立的实例。
pub async fn build_role<T>(
    entries: &[PluginEntry],
    role: &'static str,
    extract: impl Fn(Arc<dyn GatewayPlugin>) -> Option<Arc<T>>,
) -> Result<Vec<BuiltPlugin<T>>>
where
    T: ?Sized,
{
    let mut built = Vec::with_capacity(entries.len());

    for entry in entries {
        let descriptor = registry::lookup(&entry.plugin)
            .ok_or_else(|| PluginBuildError::UnknownPlugin(entry.plugin.clone()))?;

        let mut instance: Arc<dyn GatewayPlugin> = Arc::from(descriptor.instantiate());

        if extract(instance.clone()).is_none() {
            return Err(PluginBuildError::RoleMismatch {
                plugin: entry.plugin.clone(),
                role,
            }
            .into());
        }

        let merged = merge_defaults(&entry.plugin, &entry.config, &instance.default_config())?;

        let inner = Arc::get_mut(&mut instance)
            .ok_or_else(|| ProxyError::internal("装配期插件实例被意外共享"))?;
        inner
            .configure(merged)
            .await
            .map_err(|e| PluginBuildError::configure_failed(&entry.plugin, e))?;

        ldebug!(
            "system",
            LogStage::Startup,
            LogComponent::Builder,
            "plugin_configured",
            &format!("插件 '{}' 装配为 {role} 角色", entry.plugin)
        );

        let role_impl = extract(instance.clone())
            .ok_or_else(|| ProxyError::internal("角色探测结果在配置前后不一致"))?;

        built.push(BuiltPlugin {
            name: entry.plugin.clone(),
            instance,
            role: role_impl,
        });
    }

    Ok(built)
}
