//! # 应用配置结构定义

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{JsonMap, Quota};

/// 应用主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 已验证密钥的缓存时长（分钟）
    #[serde(default = "default_auth_cache_minutes")]
    pub auth_cache_minutes: u64,
    /// 共享键值存储
    pub redis: RedisConfig,
    /// HTTP 服务配置
    pub serve: ServeConfig,
    /// 命名配额表；必须包含 `default`
    pub quotas: HashMap<String, Quota>,
    /// 按角色分组的插件装配清单
    #[serde(default)]
    pub plugins: PluginsConfig,
}

fn default_auth_cache_minutes() -> u64 {
    10
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// 服务器地址
    pub host: String,
    /// 服务器端口
    pub port: u16,
    /// 数据库编号
    #[serde(default)]
    pub db: u8,
    /// 连接密码（可选）
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl RedisConfig {
    /// 构建 Redis 连接 URL
    #[must_use]
    pub fn build_url(&self) -> String {
        if let Some(password) = &self.password {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            )
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        }
    }
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// 监听端口
    pub port: u16,
    /// 网关子树前缀
    #[serde(default = "default_api_path")]
    pub api: String,
    /// 上游基地址列表
    pub upstreams: Vec<String>,
    /// 门户 API 子树前缀；空串禁用门户
    #[serde(default = "default_portal_api_path")]
    pub portal_api: String,
    /// 门户前端地址（激活后的跳转目标）
    #[serde(default = "default_portal_path")]
    pub portal: String,
    /// 门户令牌签名密钥
    #[serde(default)]
    pub signing_key: String,
    /// 上游请求截止时间（秒）
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,
}

fn default_api_path() -> String {
    "/".to_string()
}

fn default_portal_api_path() -> String {
    "/portal/api/".to_string()
}

fn default_portal_path() -> String {
    "/portal/".to_string()
}

fn default_upstream_timeout() -> u64 {
    30
}

/// 单个插件装配项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    /// 注册表中的插件名
    pub plugin: String,
    /// 用户配置；缺失项由插件默认值补齐
    #[serde(default)]
    pub config: JsonMap,
}

/// 按角色分组的插件清单，装配时保序
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub auth: Vec<PluginEntry>,
    #[serde(default)]
    pub backend: Vec<PluginEntry>,
    #[serde(default)]
    pub post_auth: Vec<PluginEntry>,
    #[serde(default)]
    pub pre_upstream: Vec<PluginEntry>,
    #[serde(default)]
    pub post_upstream: Vec<PluginEntry>,
    #[serde(default)]
    pub logging: Vec<PluginEntry>,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.serve.port == 0 {
            return Err(format!("Invalid serve port: {}", self.serve.port));
        }
        if self.serve.upstreams.is_empty() {
            return Err("At least one upstream must be configured".to_string());
        }
        if !self.serve.api.starts_with('/') {
            return Err(format!("serve.api must start with '/': {}", self.serve.api));
        }

        if !self.quotas.contains_key("default") {
            return Err("Quota 'default' must be configured".to_string());
        }
        if let Some(keyless) = self.quotas.get("keyless") {
            if keyless.max_key > 0 {
                return Err("Quota 'keyless' must not set max_key".to_string());
            }
        }
        for (name, quota) in &self.quotas {
            if quota.max_ip < 0 || quota.max_key < 0 {
                return Err(format!("Quota '{name}' has a negative limit"));
            }
        }

        if !self.serve.portal_api.is_empty() && self.serve.signing_key.is_empty() {
            return Err("serve.signing_key is required when the portal is enabled".to_string());
        }

        Ok(())
    }

    /// 门户是否启用
    #[must_use]
    pub fn portal_enabled(&self) -> bool {
        !self.serve.portal_api.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> AppConfig {
        toml::from_str(
            r#"
            [redis]
            host = "127.0.0.1"
            port = 6379
            db = 0

            [serve]
            port = 5000
            api = "/"
            upstreams = ["http://127.0.0.1:8000/"]
            signing_key = "secret"

            [quotas.default]
            minutes = 5
            max_ip = 50
            max_key = 5000
            "#,
        )
        .unwrap()
    }

    #[test]
    fn minimal_config_parses_and_validates() {
        let config = minimal_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.auth_cache_minutes, 10);
        assert_eq!(config.serve.upstream_timeout_seconds, 30);
        assert_eq!(config.serve.portal_api, "/portal/api/");
    }

    #[test]
    fn missing_default_quota_is_rejected() {
        let mut config = minimal_config();
        config.quotas.remove("default");
        assert!(config.validate().is_err());
    }

    #[test]
    fn keyless_quota_must_not_limit_per_key() {
        let mut config = minimal_config();
        config.quotas.insert(
            "keyless".into(),
            Quota {
                minutes: 5,
                max_ip: 5,
                max_key: 10,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn redis_url_includes_password_when_present() {
        let mut redis = RedisConfig::default();
        assert_eq!(redis.build_url(), "redis://127.0.0.1:6379/0");
        redis.password = Some("pw".into());
        assert_eq!(redis.build_url(), "redis://:pw@127.0.0.1:6379/0");
    }

    #[test]
    fn plugin_entries_parse_with_inline_config() {
        let config: AppConfig = toml::from_str(
            r#"
            [redis]
            host = "127.0.0.1"
            port = 6379

            [serve]
            port = 5000
            upstreams = ["http://127.0.0.1:8000/"]
            signing_key = "secret"

            [quotas.default]
            minutes = 5
            max_ip = 50

            [[plugins.auth]]
            plugin = "hmac"

            [[plugins.backend]]
            plugin = "sql"
            [plugins.backend.config]
            url = "sqlite::memory:"
            create_tables = true
            "#,
        )
        .unwrap();

        assert_eq!(config.plugins.auth.len(), 1);
        assert_eq!(config.plugins.auth[0].plugin, "hmac");
        assert_eq!(
            config.plugins.backend[0].config["create_tables"],
            serde_json::json!(true)
        );
    }
}
