//! # Redis 存储客户端
//!
//! 提供 Redis 连接管理和基础操作

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use crate::config::RedisConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{cache::KvStore, ldebug, linfo};

/// Redis 存储客户端
///
/// `ConnectionManager` 内部多路复用连接，可安全克隆共享。
pub struct RedisStore {
    /// Redis 连接管理器
    connection_manager: ConnectionManager,
}

impl RedisStore {
    /// 创建新的存储客户端
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "connect_to_redis",
            &format!("正在连接 Redis 服务器: {}:{}", config.host, config.port)
        );

        let client = Client::open(config.build_url())
            .map_err(|e| ProxyError::cache_with_source("创建 Redis 客户端失败", e))?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| ProxyError::cache_with_source("建立 Redis 连接失败", e))?;

        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "redis_connected",
            "Redis 连接建立成功"
        );

        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection_manager.clone();

        let result: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| ProxyError::cache_with_source(format!("获取缓存失败: {key}"), e))?;

        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "get",
            &format!("GET {key} -> hit={}", result.is_some())
        );
        Ok(result)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.connection_manager.clone();

        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|e| ProxyError::cache_with_source(format!("设置缓存失败: {key}"), e))?;

        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "set_ex",
            &format!("SETEX {key} ttl={ttl_seconds}s")
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection_manager.clone();

        let value: i64 = conn
            .incr(key, delta)
            .await
            .map_err(|e| ProxyError::cache_with_source(format!("自增计数器失败: {key}"), e))?;

        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection_manager.clone();

        let deleted_count: i32 = conn
            .del(key)
            .await
            .map_err(|e| ProxyError::cache_with_source(format!("删除缓存失败: {key}"), e))?;

        Ok(deleted_count > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();

        let response: String = redis::Cmd::new()
            .arg("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ProxyError::cache_with_source("Redis ping 失败", e))?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(ProxyError::cache(format!("Redis ping 响应异常: {response}")))
        }
    }
}
