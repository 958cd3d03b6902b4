//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;

pub use app_config::{AppConfig, PluginEntry, PluginsConfig, RedisConfig, ServeConfig};

use std::env;
use std::path::Path;

use crate::error::ErrorContext;

/// 加载配置文件
///
/// 根据 `RUST_ENV` 选择 `config/config.{env}.toml`，默认 `dev`。
pub fn load_config() -> crate::error::Result<AppConfig> {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let config_file = format!("config/config.{env}.toml");
    load_config_from(&config_file)
}

/// 从指定路径加载配置文件
pub fn load_config_from(path: &str) -> crate::error::Result<AppConfig> {
    if !Path::new(path).exists() {
        return Err(crate::config_error!("配置文件不存在: {}", path));
    }

    let config_content =
        std::fs::read_to_string(path).with_config_context(|| format!("读取配置文件失败: {path}"))?;

    let config: AppConfig =
        toml::from_str(&config_content).with_config_context(|| format!("TOML解析失败: {path}"))?;

    config
        .validate()
        .map_err(|reason| crate::config_error!("配置无效: {}", reason))?;

    Ok(config)
}
