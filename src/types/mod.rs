//! # 领域类型定义
//!
//! 网关热路径和门户共用的核心数据类型

mod domain;

pub use domain::{Key, KeyType, Quota, User};

/// JSON 对象的统一别名，插件配置和上下文映射均使用该类型，
/// 保证其中的值始终可以表示为 JSON 树。
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
