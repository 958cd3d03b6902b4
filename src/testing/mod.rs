//! # 测试支撑
//!
//! 集成测试共用的装配助手：内存存储上的完整网关、
//! 可观测收到内容的回显上游。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Request;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use crate::cache::KvStore;
use crate::config::{AppConfig, PluginEntry, PluginsConfig, RedisConfig, ServeConfig};
use crate::gateway::pipeline::Gateway;
use crate::server::{build_gateway, build_router};
use crate::types::{JsonMap, Quota};

/// 组装一份指向给定上游的测试配置
///
/// hmac 认证 + 内存管理后端（低 bcrypt 成本），
/// 配额与端到端场景一致：default{5m,50,5000}、keyless{5m,5}。
#[must_use]
pub fn test_config(upstream: &str) -> AppConfig {
    let mut quotas = HashMap::new();
    quotas.insert(
        "default".to_string(),
        Quota {
            minutes: 5,
            max_ip: 50,
            max_key: 5000,
        },
    );
    quotas.insert(
        "keyless".to_string(),
        Quota {
            minutes: 5,
            max_ip: 5,
            max_key: 0,
        },
    );

    let mut backend_config = JsonMap::new();
    backend_config.insert("bcrypt_cost".to_string(), serde_json::Value::from(4));

    AppConfig {
        auth_cache_minutes: 10,
        redis: RedisConfig::default(),
        serve: ServeConfig {
            port: 5000,
            api: "/".to_string(),
            upstreams: vec![upstream.to_string()],
            portal_api: "/portal/api/".to_string(),
            portal: "http://portal.example.org/".to_string(),
            signing_key: "test-signing-key".to_string(),
            upstream_timeout_seconds: 5,
        },
        quotas,
        plugins: PluginsConfig {
            auth: vec![PluginEntry {
                plugin: "hmac".to_string(),
                config: JsonMap::new(),
            }],
            backend: vec![PluginEntry {
                plugin: "memory".to_string(),
                config: backend_config,
            }],
            ..Default::default()
        },
    }
}

/// 回显上游：根路径返回 "API-OK"，其余路径回显收到的请求
async fn echo(req: Request) -> Json<serde_json::Value> {
    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect();

    Json(json!({
        "method": req.method().as_str(),
        "path": req.uri().path(),
        "query": req.uri().query(),
        "headers": headers,
    }))
}

/// 启动一个测试上游，返回其监听地址
pub async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/", get(|| async { "API-OK" }))
        .fallback(echo);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定测试上游");
    let addr = listener.local_addr().expect("读取上游地址");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// 已启动的测试网关
pub struct TestGateway {
    pub addr: SocketAddr,
    pub gateway: Arc<Gateway>,
}

impl TestGateway {
    /// 网关基地址
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// 在内存存储上装配并启动完整网关
pub async fn spawn_gateway(config: AppConfig, store: Arc<dyn KvStore>) -> TestGateway {
    let gateway = Arc::new(
        build_gateway(&config, store)
            .await
            .expect("装配测试网关"),
    );
    let router = build_router(gateway.clone(), &config).expect("装配测试路由");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定测试网关");
    let addr = listener.local_addr().expect("读取网关地址");
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });

    TestGateway { addr, gateway }
}
