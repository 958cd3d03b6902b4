//! # 管道集成测试
//!
//! 内存存储上的完整网关对真实上游收发：无凭据配额、
//! 代理头卫生、上游故障映射。

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use api_gateway::cache::MemoryStore;
use api_gateway::testing::{spawn_gateway, spawn_upstream, test_config};
use axum::Router;
use axum::extract::State;
use axum::routing::any;
use tokio::net::TcpListener;

/// 带命中计数的上游，用于断言"没有请求到达上游"
async fn spawn_counting_upstream() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/{*path}",
            any(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "API-OK"
            }),
        )
        .route(
            "/",
            any(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "API-OK"
            }),
        )
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, hits)
}

#[tokio::test]
async fn keyless_requests_pass_until_ip_quota_exhausted() {
    let upstream = spawn_upstream().await;
    let config = test_config(&format!("http://{upstream}/"));
    let gateway = spawn_gateway(config, Arc::new(MemoryStore::new())).await;

    let client = reqwest::Client::new();
    // keyless 配额 max_ip = 5：前 5 个请求放行
    for _ in 0..5 {
        let resp = client.get(gateway.url("/")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "API-OK");
    }

    // 第 6 个触发按 IP 限额
    let resp = client.get(gateway.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(
        body["error"].as_str().unwrap().contains("per IP"),
        "unexpected error body: {body}"
    );
}

#[tokio::test]
async fn keyless_traffic_is_rejected_when_keyless_quota_absent() {
    let (upstream, hits) = spawn_counting_upstream().await;
    let mut config = test_config(&format!("http://{upstream}/"));
    config.quotas.remove("keyless");
    let gateway = spawn_gateway(config, Arc::new(MemoryStore::new())).await;

    let resp = reqwest::get(gateway.url("/anything")).await.unwrap();
    assert_eq!(resp.status(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("credentials"));

    // 被拒请求不会到达上游
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn hop_by_hop_headers_do_not_reach_the_upstream() {
    let upstream = spawn_upstream().await;
    let config = test_config(&format!("http://{upstream}/"));
    let gateway = spawn_gateway(config, Arc::new(MemoryStore::new())).await;

    let resp = reqwest::Client::new()
        .get(gateway.url("/echo"))
        .header("proxy-authorization", "Basic Zm9vOmJhcg==")
        .header("keep-alive", "timeout=5")
        .header("x-app-header", "survives")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let echoed: serde_json::Value = resp.json().await.unwrap();
    let headers = echoed["headers"].as_object().unwrap();
    assert!(!headers.contains_key("proxy-authorization"));
    assert!(!headers.contains_key("keep-alive"));
    assert_eq!(headers["x-app-header"], "survives");
}

#[tokio::test]
async fn forwarded_for_ends_with_peer_and_preserves_prior_values() {
    let upstream = spawn_upstream().await;
    let config = test_config(&format!("http://{upstream}/"));
    let gateway = spawn_gateway(config, Arc::new(MemoryStore::new())).await;

    let resp = reqwest::Client::new()
        .get(gateway.url("/echo"))
        .header("x-forwarded-for", "203.0.113.7")
        .send()
        .await
        .unwrap();
    let echoed: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        echoed["headers"]["x-forwarded-for"],
        "203.0.113.7, 127.0.0.1"
    );

    // 无先前值时只有对端地址
    let resp = reqwest::Client::new()
        .get(gateway.url("/echo"))
        .send()
        .await
        .unwrap();
    let echoed: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(echoed["headers"]["x-forwarded-for"], "127.0.0.1");
}

#[tokio::test]
async fn path_and_query_are_forwarded() {
    let upstream = spawn_upstream().await;
    let config = test_config(&format!("http://{upstream}/"));
    let gateway = spawn_gateway(config, Arc::new(MemoryStore::new())).await;

    let resp = reqwest::get(gateway.url("/echo/deep/path?page=2&limit=10"))
        .await
        .unwrap();
    let echoed: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(echoed["path"], "/echo/deep/path");
    assert_eq!(echoed["query"], "page=2&limit=10");
}

#[tokio::test]
async fn unreachable_upstream_maps_to_502() {
    // 占个端口再放掉，保证无人监听
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = listener.local_addr().unwrap();
    drop(listener);

    let config = test_config(&format!("http://{dead_addr}/"));
    let gateway = spawn_gateway(config, Arc::new(MemoryStore::new())).await;

    let resp = reqwest::get(gateway.url("/")).await.unwrap();
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}
