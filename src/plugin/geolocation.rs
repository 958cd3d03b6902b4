//! # 地理位置日志插件
//!
//! 把客户端 IP 解析为地理位置并写入请求日志映射。
//! 解析结果进程内缓存，避免对解析服务的重复查询。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{ProxyError, Result};
use crate::gateway::context::ApiContext;
use crate::gateway::request::{GatewayRequest, GatewayResponse};
use crate::plugin::{GatewayPlugin, LoggingPlugin};
use crate::types::JsonMap;

/// 并发安全的 查找-或-加载 缓存
///
/// 锁不跨越 loader 的 await 点；偶发的并发重复加载可以接受，
/// 后写覆盖先写。
#[derive(Debug, Default)]
pub(crate) struct CachedLookup {
    entries: RwLock<HashMap<String, Value>>,
}

impl CachedLookup {
    pub(crate) async fn lookup<F, Fut>(&self, key: &str, loader: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Value>>,
    {
        {
            let entries = self.entries.read().await;
            if let Some(value) = entries.get(key) {
                return Ok(value.clone());
            }
        }

        let value = loader().await?;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.clone());
        Ok(value)
    }
}

/// 地理位置插件
#[derive(Debug, Default)]
pub struct GeolocationPlugin {
    endpoint: String,
    cache: Option<CachedLookup>,
    client: Option<reqwest::Client>,
}

impl GeolocationPlugin {
    fn client(&self) -> Result<&reqwest::Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ProxyError::internal("地理位置插件在配置完成前被调用"))
    }

    async fn resolve(&self, ip: &str) -> Result<Value> {
        let url = format!("{}/{ip}", self.endpoint.trim_end_matches('/'));
        let response = self
            .client()?
            .get(&url)
            .send()
            .await
            .map_err(|e| ProxyError::network_with_source("地理位置查询失败", e))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ProxyError::network_with_source("地理位置响应解析失败", e))
    }
}

#[async_trait]
impl GatewayPlugin for GeolocationPlugin {
    fn default_config(&self) -> JsonMap {
        let mut defaults = JsonMap::new();
        defaults.insert(
            "endpoint".to_string(),
            Value::String("http://ip-api.com/json".to_string()),
        );
        defaults.insert("ip_caching".to_string(), Value::Bool(true));
        defaults
    }

    async fn configure(&mut self, config: JsonMap) -> Result<()> {
        let endpoint = config
            .get("endpoint")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProxyError::config("地理位置插件缺少 endpoint 配置"))?;
        self.endpoint = endpoint.to_string();

        if config
            .get("ip_caching")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
        {
            self.cache = Some(CachedLookup::default());
        }

        self.client = Some(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .map_err(|e| ProxyError::server_init_with_source("构建地理位置客户端失败", e))?,
        );
        Ok(())
    }

    fn as_logging(self: Arc<Self>) -> Option<Arc<dyn LoggingPlugin>> {
        Some(self)
    }
}

#[async_trait]
impl LoggingPlugin for GeolocationPlugin {
    async fn log(
        &self,
        req: &GatewayRequest,
        _resp: &GatewayResponse,
        ctx: &mut ApiContext,
    ) -> Result<()> {
        let ip = req.peer_ip();

        let location = match &self.cache {
            Some(cache) => cache.lookup(&ip, || self.resolve(&ip)).await?,
            None => self.resolve(&ip).await?,
        };

        ctx.log_insert("location", location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn lookup_loads_once_per_key() {
        let cache = CachedLookup::default();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .lookup("10.0.0.1", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({"country": "DE"}))
                })
                .await
                .unwrap();
            assert_eq!(value["country"], "DE");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lookup_propagates_loader_errors_without_caching() {
        let cache = CachedLookup::default();

        let result = cache
            .lookup("10.0.0.2", || async {
                Err(ProxyError::network("lookup backend down"))
            })
            .await;
        assert!(result.is_err());

        // 失败不落缓存，下一次重新加载
        let value = cache
            .lookup("10.0.0.2", || async { Ok(serde_json::json!("ok")) })
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!("ok"));
    }
}
