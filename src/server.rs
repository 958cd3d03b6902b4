//! # 服务装配与启动
//!
//! 从配置装配网关（插件 → 角色列表 → 上游池 → 配额守卫），
//! 同一端口挂载门户子树和网关入口。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::cache::{KvStore, RedisStore};
use crate::config::AppConfig;
use crate::error::{ProxyError, Result};
use crate::gateway::pipeline::Gateway;
use crate::gateway::quota::QuotaGuard;
use crate::gateway::upstream::build_upstreams;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::plugin::{self, build_role};
use crate::portal::PortalContext;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub portal: Option<Arc<PortalContext>>,
}

/// 按配置装配网关
///
/// 装配单线程执行一次；返回后所有阶段列表冻结。
pub async fn build_gateway(config: &AppConfig, store: Arc<dyn KvStore>) -> Result<Gateway> {
    plugin::install_builtin_plugins();

    let auth = build_role(&config.plugins.auth, "auth", |p| p.as_auth()).await?;
    let backends = build_role(&config.plugins.backend, "backend", |p| p.as_backend()).await?;
    let post_auth = build_role(&config.plugins.post_auth, "post_auth", |p| {
        p.as_post_auth()
    })
    .await?;
    let pre_upstream = build_role(&config.plugins.pre_upstream, "pre_upstream", |p| {
        p.as_pre_upstream()
    })
    .await?;
    let post_upstream = build_role(&config.plugins.post_upstream, "post_upstream", |p| {
        p.as_post_upstream()
    })
    .await?;
    let logging = build_role(&config.plugins.logging, "logging", |p| p.as_logging()).await?;

    // 管道顺序中第一个声明管理角色的后端成为权威管理后端
    let management = backends
        .iter()
        .find_map(|built| {
            built
                .instance
                .clone()
                .as_management()
                .map(|role| (built.name.clone(), role))
        })
        .map(|(name, role)| {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Builder,
                "management_backend_selected",
                &format!("管理后端: {name}")
            );
            role
        });

    let upstreams = build_upstreams(
        &config.serve.upstreams,
        Duration::from_secs(config.serve.upstream_timeout_seconds),
    )?;

    let quota = QuotaGuard::new(store.clone(), config.quotas.clone());

    Ok(Gateway {
        auth: auth.into_iter().map(|b| b.role).collect(),
        backends: backends.into_iter().map(|b| b.role).collect(),
        management,
        post_auth: post_auth.into_iter().map(|b| b.role).collect(),
        pre_upstream: pre_upstream.into_iter().map(|b| b.role).collect(),
        post_upstream: post_upstream.into_iter().map(|b| b.role).collect(),
        logging: logging.into_iter().map(|b| b.role).collect(),
        upstreams,
        quota,
        store,
        api_prefix: config.serve.api.clone(),
        auth_cache_minutes: config.auth_cache_minutes,
        upstream_timeout_seconds: config.serve.upstream_timeout_seconds,
    })
}

/// 装配完整路由：门户子树 + 网关兜底
pub fn build_router(gateway: Arc<Gateway>, config: &AppConfig) -> Result<Router> {
    let portal = if config.portal_enabled() {
        Some(Arc::new(PortalContext::build(
            gateway.management(),
            gateway.auth_plugins(),
            gateway.store(),
            &config.serve.signing_key,
            &config.serve.portal,
        )?))
    } else {
        None
    };

    let state = AppState {
        gateway,
        portal: portal.clone(),
    };

    let mut router = Router::new();
    if portal.is_some() {
        let portal_path = config.serve.portal_api.trim_end_matches('/');
        if portal_path.is_empty() || portal_path == "/" {
            return Err(ProxyError::server_init(format!(
                "无效的门户路径: {}",
                config.serve.portal_api
            )));
        }
        router = router.nest(portal_path, crate::portal::portal_routes());
    }

    Ok(router
        .fallback(crate::gateway::handler::gateway_entry)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// 连接存储、装配网关并开始服务
pub async fn run(config: AppConfig) -> Result<()> {
    let store: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&config.redis).await?);
    store.ping().await?;
    let gateway = Arc::new(build_gateway(&config, store).await?);
    let router = build_router(gateway, &config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.serve.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ProxyError::server_start_with_source(format!("绑定 {addr} 失败"), e))?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "server_listening",
        &format!(
            "网关监听 {addr}，API 前缀 {}，门户 {}",
            config.serve.api,
            if config.portal_enabled() {
                config.serve.portal_api.as_str()
            } else {
                "<disabled>"
            }
        )
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| ProxyError::server_start_with_source("HTTP 服务异常退出", e))
}
