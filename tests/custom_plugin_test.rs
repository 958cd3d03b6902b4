//! # 自定义插件集成测试
//!
//! 外部注册的插件走 post_auth / pre_upstream / post_upstream 三个
//! 阶段：改成本、改出站请求、改响应。验证注册表对外扩展路径。

use std::sync::Arc;

use api_gateway::cache::MemoryStore;
use api_gateway::config::PluginEntry;
use api_gateway::error::Result;
use api_gateway::gateway::context::ApiContext;
use api_gateway::gateway::request::{GatewayRequest, UpstreamResponse};
use api_gateway::plugin::{
    GatewayPlugin, PluginDescriptor, PostAuthPlugin, PostUpstreamPlugin, PreUpstreamPlugin,
    register_plugin,
};
use api_gateway::testing::{spawn_gateway, spawn_upstream, test_config};
use api_gateway::types::JsonMap;
use async_trait::async_trait;
use axum::http::HeaderValue;
use bytes::Bytes;

/// 测试用请求整形插件
#[derive(Debug, Default)]
struct ShaperPlugin {
    cost: i64,
}

#[async_trait]
impl GatewayPlugin for ShaperPlugin {
    fn default_config(&self) -> JsonMap {
        let mut defaults = JsonMap::new();
        defaults.insert("cost".to_string(), serde_json::Value::from(1));
        defaults
    }

    async fn configure(&mut self, config: JsonMap) -> Result<()> {
        self.cost = config.get("cost").and_then(|v| v.as_i64()).unwrap_or(1);
        Ok(())
    }

    fn as_post_auth(self: Arc<Self>) -> Option<Arc<dyn PostAuthPlugin>> {
        Some(self)
    }

    fn as_pre_upstream(self: Arc<Self>) -> Option<Arc<dyn PreUpstreamPlugin>> {
        Some(self)
    }

    fn as_post_upstream(self: Arc<Self>) -> Option<Arc<dyn PostUpstreamPlugin>> {
        Some(self)
    }
}

#[async_trait]
impl PostAuthPlugin for ShaperPlugin {
    async fn post_auth(&self, _req: &GatewayRequest, ctx: &mut ApiContext) -> Result<()> {
        ctx.cost = self.cost;
        Ok(())
    }
}

#[async_trait]
impl PreUpstreamPlugin for ShaperPlugin {
    async fn pre_upstream(&self, req: &mut GatewayRequest, _ctx: &mut ApiContext) -> Result<()> {
        req.headers
            .insert("x-shaped", HeaderValue::from_static("yes"));
        Ok(())
    }
}

#[async_trait]
impl PostUpstreamPlugin for ShaperPlugin {
    async fn post_upstream(
        &self,
        _req: &GatewayRequest,
        resp: &mut UpstreamResponse,
        _ctx: &mut ApiContext,
    ) -> Result<()> {
        resp.headers
            .insert("x-processed", HeaderValue::from_static("1"));
        let mut body = b"WRAPPED:".to_vec();
        body.extend_from_slice(&resp.body);
        resp.body = Bytes::from(body);
        Ok(())
    }
}

fn register_shaper() {
    register_plugin(PluginDescriptor::new(
        "shaper",
        "Test-only request shaping plugin.",
        "",
        || Box::new(ShaperPlugin::default()),
    ));
}

fn shaper_entry(cost: i64) -> PluginEntry {
    let mut config = JsonMap::new();
    config.insert("cost".to_string(), serde_json::Value::from(cost));
    PluginEntry {
        plugin: "shaper".to_string(),
        config,
    }
}

#[tokio::test]
async fn custom_plugin_shapes_request_and_response() {
    register_shaper();

    let upstream = spawn_upstream().await;
    let mut config = test_config(&format!("http://{upstream}/"));
    config.plugins.pre_upstream = vec![shaper_entry(1)];
    config.plugins.post_upstream = vec![shaper_entry(1)];
    let gateway = spawn_gateway(config, Arc::new(MemoryStore::new())).await;

    let resp = reqwest::get(gateway.url("/echo")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("x-processed").unwrap(), "1");

    let body = resp.text().await.unwrap();
    let echoed: serde_json::Value =
        serde_json::from_str(body.strip_prefix("WRAPPED:").expect("body rewritten")).unwrap();
    // pre_upstream 注入的头到达上游
    assert_eq!(echoed["headers"]["x-shaped"], "yes");
}

#[tokio::test]
async fn post_auth_cost_counts_against_quota() {
    register_shaper();

    let upstream = spawn_upstream().await;
    let mut config = test_config(&format!("http://{upstream}/"));
    // keyless 配额 max_ip = 5，每个请求成本 3：第二个请求超限
    config.plugins.post_auth = vec![shaper_entry(3)];
    let gateway = spawn_gateway(config, Arc::new(MemoryStore::new())).await;

    let resp = reqwest::get(gateway.url("/")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = reqwest::get(gateway.url("/")).await.unwrap();
    assert_eq!(resp.status(), 403);
}
