//! # 日志推送插件
//!
//! 请求结束后把日志映射作为 JSON 文档 POST 到外部收集端点
//! （Elasticsearch 等一切接受 JSON 的收集器均可）。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ProxyError, Result};
use crate::gateway::context::ApiContext;
use crate::gateway::request::{GatewayRequest, GatewayResponse};
use crate::plugin::{GatewayPlugin, LoggingPlugin};
use crate::types::JsonMap;

/// 日志推送插件
#[derive(Debug, Default)]
pub struct LogPushPlugin {
    endpoint: String,
    client: Option<reqwest::Client>,
}

#[async_trait]
impl GatewayPlugin for LogPushPlugin {
    fn default_config(&self) -> JsonMap {
        let mut defaults = JsonMap::new();
        defaults.insert(
            "endpoint".to_string(),
            Value::String("http://localhost:9200/gateway/log_entry".to_string()),
        );
        defaults.insert("timeout_seconds".to_string(), Value::from(5));
        defaults
    }

    async fn configure(&mut self, config: JsonMap) -> Result<()> {
        let endpoint = config
            .get("endpoint")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProxyError::config("日志推送插件缺少 endpoint 配置"))?;
        self.endpoint = endpoint.to_string();

        let timeout = config
            .get("timeout_seconds")
            .and_then(|v| v.as_u64())
            .unwrap_or(5);
        self.client = Some(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()
                .map_err(|e| ProxyError::server_init_with_source("构建日志推送客户端失败", e))?,
        );
        Ok(())
    }

    fn as_logging(self: Arc<Self>) -> Option<Arc<dyn LoggingPlugin>> {
        Some(self)
    }
}

#[async_trait]
impl LoggingPlugin for LogPushPlugin {
    async fn log(
        &self,
        req: &GatewayRequest,
        resp: &GatewayResponse,
        ctx: &mut ApiContext,
    ) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ProxyError::internal("日志推送插件在配置完成前被调用"))?;

        // 基础请求事实补进日志映射，随后整体推送
        ctx.log_insert("method", Value::String(req.method.to_string()));
        ctx.log_insert("path", Value::String(ctx.path.clone()));
        ctx.log_insert("status", Value::from(resp.status.as_u16()));

        client
            .post(&self.endpoint)
            .json(&ctx.log)
            .send()
            .await
            .map_err(|e| ProxyError::network_with_source("推送日志文档失败", e))?
            .error_for_status()
            .map_err(|e| ProxyError::network_with_source("日志收集端点返回错误", e))?;

        Ok(())
    }
}
