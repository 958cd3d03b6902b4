//! # 存储抽象层
//!
//! 网关只依赖四个操作：GET / SETEX / INCRBY / DEL。
//! "键不存在" 通过 `Option` 表达，与传输层错误严格区分。

use async_trait::async_trait;

use crate::error::Result;

/// 共享键值存储接口
///
/// 实现必须可并发使用；计数器自增在存储端按键线性化。
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 读取键值；不存在返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入键值并设置过期秒数
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    /// 原子自增；键不存在时从 0 开始（不带 TTL）
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// 删除键，返回是否存在
    async fn delete(&self, key: &str) -> Result<bool>;

    /// 连通性检测
    async fn ping(&self) -> Result<()>;
}
