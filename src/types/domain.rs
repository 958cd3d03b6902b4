//! # 核心实体
//!
//! `Key` / `User` / `Quota` / `KeyType` 的内存表示。
//! `Key` 会以 JSON 形式写入键缓存，serde 往返必须无损。

use serde::{Deserialize, Serialize};

use crate::types::JsonMap;

/// API 密钥
///
/// 由认证插件的 `generate` 创建，管理后端持久化，热路径只读取。
/// 进入缓存或管道的 `Key` 均已通过对应请求类型的校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    /// 全局唯一标识
    pub id: String,
    /// 类型标签（如 "HMAC"）
    #[serde(rename = "type")]
    pub key_type: String,
    /// 绑定的应用标识或 Web 来源
    #[serde(default)]
    pub realm: String,
    /// 命名配额；空串回落到 `default`
    #[serde(default)]
    pub quota: String,
    /// 类型私有数据（签名秘密等）
    #[serde(default)]
    pub data: JsonMap,
}

/// 密钥类型描述，由认证插件公布、门户列出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyType {
    pub name: String,
    pub description: String,
}

/// 门户用户
///
/// 注册后处于未激活状态，带外确认后才能认证。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub admin: bool,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub profile: JsonMap,
}

/// 命名配额（固定窗口）
///
/// `minutes <= 0` 表示不计数；`max_ip` / `max_key` 为 0 时禁用对应子限额。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub minutes: i64,
    #[serde(default)]
    pub max_ip: i64,
    #[serde(default)]
    pub max_key: i64,
}

impl Key {
    /// 读取 data 中的字符串字段
    #[must_use]
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }
}
