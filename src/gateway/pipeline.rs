//! # 请求管道引擎
//!
//! 每请求状态机：认证 → 认证后 → 配额 → 上游前 → 派发 → 上游后 →
//! 写回 → 日志。任一阶段中止或出错即短路其余阶段；日志阶段例外，
//! 始终运行且错误只记不抛。

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{CacheKey, KvStore};
use crate::error::{ProxyError, Result};
use crate::gateway::context::{ApiContext, normalize_path};
use crate::gateway::dispatch::{dispatch, strip_hop_headers};
use crate::gateway::quota::QuotaGuard;
use crate::gateway::request::{GatewayRequest, GatewayResponse, UpstreamResponse};
use crate::gateway::upstream::{Upstream, pick_random};
use crate::logging::{LogComponent, LogStage, log_proxy_error};
use crate::plugin::{
    AuthPlugin, BackendPlugin, LoggingPlugin, ManagementPlugin, PostAuthPlugin, PostUpstreamPlugin,
    PreUpstreamPlugin,
};
use crate::types::Key;
use crate::{ldebug, lwarn};

/// 装配完成、冻结后的网关
///
/// 启动后全部字段只读；插件列表内的实例自行保证线程安全。
pub struct Gateway {
    pub(crate) auth: Vec<Arc<dyn AuthPlugin>>,
    pub(crate) backends: Vec<Arc<dyn BackendPlugin>>,
    pub(crate) management: Option<Arc<dyn ManagementPlugin>>,
    pub(crate) post_auth: Vec<Arc<dyn PostAuthPlugin>>,
    pub(crate) pre_upstream: Vec<Arc<dyn PreUpstreamPlugin>>,
    pub(crate) post_upstream: Vec<Arc<dyn PostUpstreamPlugin>>,
    pub(crate) logging: Vec<Arc<dyn LoggingPlugin>>,
    pub(crate) upstreams: Vec<Arc<Upstream>>,
    pub(crate) quota: QuotaGuard,
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) api_prefix: String,
    pub(crate) auth_cache_minutes: u64,
    pub(crate) upstream_timeout_seconds: u64,
}

/// 一次请求处理的完整产物，日志阶段消费
pub struct RequestOutcome {
    pub request: GatewayRequest,
    pub response: GatewayResponse,
    pub ctx: ApiContext,
}

impl Gateway {
    /// 权威管理后端（装配顺序中第一个声明该角色的后端）
    #[must_use]
    pub fn management(&self) -> Option<Arc<dyn ManagementPlugin>> {
        self.management.clone()
    }

    /// 认证插件列表（门户按密钥类型签发时使用）
    #[must_use]
    pub fn auth_plugins(&self) -> &[Arc<dyn AuthPlugin>] {
        &self.auth
    }

    /// 共享键值存储句柄
    #[must_use]
    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    /// 处理一个完整请求，保证恰好产出一个响应
    pub async fn process(&self, mut req: GatewayRequest) -> RequestOutcome {
        let mut ctx = ApiContext::new(normalize_path(req.uri.path(), &self.api_prefix));
        ctx.log_insert("client_ip", Value::String(req.peer_ip()));

        ldebug!(
            &ctx.request_id,
            LogStage::RequestStart,
            LogComponent::Pipeline,
            "request_start",
            &format!("{} {}", req.method, ctx.path)
        );

        let response = match self.run_stages(&mut req, &mut ctx).await {
            Ok(response) => response,
            Err(err) => {
                log_proxy_error(
                    &ctx.request_id,
                    LogStage::Error,
                    LogComponent::Pipeline,
                    "pipeline_abort",
                    "请求管道终止",
                    &err,
                );
                GatewayResponse::error_body(err.status_code(), &err.to_string())
            }
        };

        RequestOutcome {
            request: req,
            response,
            ctx,
        }
    }

    /// 阶段 A 到 F：短路语义，首个失败即返回
    async fn run_stages(
        &self,
        req: &mut GatewayRequest,
        ctx: &mut ApiContext,
    ) -> Result<GatewayResponse> {
        // A. 认证
        self.authenticate(req, ctx).await?;

        // B. 认证后
        for plugin in &self.post_auth {
            plugin.post_auth(req, ctx).await?;
        }

        // C. 配额
        self.quota.check(ctx, &req.peer_ip()).await?;

        // D. 上游前
        for plugin in &self.pre_upstream {
            plugin.pre_upstream(req, ctx).await?;
        }
        if ctx.upstream.is_none() {
            ctx.upstream = Some(pick_random(&self.upstreams));
        }

        // E. 上游派发
        let upstream = ctx
            .upstream
            .clone()
            .ok_or_else(|| ProxyError::internal("派发阶段缺少上游"))?;
        ldebug!(
            &ctx.request_id,
            LogStage::UpstreamRequest,
            LogComponent::Upstream,
            "dispatch",
            &format!("派发到 {}", upstream.base)
        );
        let mut upstream_resp: UpstreamResponse =
            dispatch(req, ctx, &upstream, self.upstream_timeout_seconds).await?;

        // F. 上游后：先清理响应头，再交插件改写
        strip_hop_headers(&mut upstream_resp.headers);
        upstream_resp.headers.remove(axum::http::header::CONTENT_LENGTH);
        for plugin in &self.post_upstream {
            plugin.post_upstream(req, &mut upstream_resp, ctx).await?;
        }

        Ok(GatewayResponse::from(upstream_resp))
    }

    /// 阶段 A：两级密钥认证
    ///
    /// 认证插件按序探测；识别出凭据后先查键缓存，未命中再按序询问
    /// 后端。任一插件完成认证即终止本阶段；识别出但校验失败的凭据
    /// 硬中止 403，绝不静默放行。
    async fn authenticate(&self, req: &GatewayRequest, ctx: &mut ApiContext) -> Result<()> {
        for auth in &self.auth {
            let Some(detection) = auth.detect(req, ctx).await? else {
                continue;
            };

            let cache_key = CacheKey::AuthCache {
                key_id: detection.key_id.clone(),
            }
            .build();

            // 传输层读取失败按未命中处理
            let cached = match self.store.get(&cache_key).await {
                Ok(value) => value,
                Err(err) => {
                    lwarn!(
                        &ctx.request_id,
                        LogStage::Authentication,
                        LogComponent::Auth,
                        "auth_cache_read_failed",
                        &format!("键缓存读取失败，按未命中处理: {err}")
                    );
                    None
                }
            };

            if let Some(raw) = cached {
                match serde_json::from_str::<Key>(&raw) {
                    Ok(key) => {
                        if auth.validate(&key, req, ctx, &detection.bits).await? {
                            ldebug!(
                                &ctx.request_id,
                                LogStage::Authentication,
                                LogComponent::Auth,
                                "auth_cache_hit",
                                &format!("密钥 {} 命中缓存", key.id)
                            );
                            ctx.key = Some(key);
                            return Ok(());
                        }
                        return Err(ProxyError::abort(
                            403,
                            format!(
                                "Access denied. Found a key of type '{}', but it is invalid.",
                                key.key_type
                            ),
                        ));
                    }
                    // 缓存内容损坏：按未命中处理，走后端
                    Err(_) => {
                        lwarn!(
                            &ctx.request_id,
                            LogStage::Authentication,
                            LogComponent::Auth,
                            "auth_cache_corrupt",
                            &format!("键缓存条目损坏: {cache_key}")
                        );
                    }
                }
            }

            for backend in &self.backends {
                let Some(key) = backend
                    .get_key(&detection.key_id, &detection.key_type)
                    .await?
                else {
                    continue;
                };

                if auth.validate(&key, req, ctx, &detection.bits).await? {
                    // 缓存写入尽力而为
                    match serde_json::to_string(&key) {
                        Ok(json) => {
                            if let Err(err) = self
                                .store
                                .set_ex(&cache_key, &json, self.auth_cache_minutes * 60)
                                .await
                            {
                                lwarn!(
                                    &ctx.request_id,
                                    LogStage::Authentication,
                                    LogComponent::Auth,
                                    "auth_cache_write_failed",
                                    &format!("键缓存写入失败: {err}")
                                );
                            }
                        }
                        Err(err) => {
                            lwarn!(
                                &ctx.request_id,
                                LogStage::Authentication,
                                LogComponent::Auth,
                                "auth_cache_encode_failed",
                                &format!("密钥序列化失败: {err}")
                            );
                        }
                    }
                    ctx.key = Some(key);
                    return Ok(());
                }

                return Err(ProxyError::abort(
                    403,
                    format!(
                        "Access denied. Found a key of type '{}', but it is invalid.",
                        key.key_type
                    ),
                ));
            }
            // 所有后端都没有这把密钥：继续尝试后续认证插件
        }

        if self.quota.keyless_enabled() {
            ctx.keyless = true;
            ctx.key = None;
            Ok(())
        } else {
            Err(ProxyError::abort(
                403,
                "Access denied. You or your app must supply valid credentials to access this API.",
            ))
        }
    }

    /// 阶段 H：日志插件在响应写回之后运行，错误吞掉只记内部日志
    pub async fn run_logging(
        &self,
        req: &GatewayRequest,
        resp: &GatewayResponse,
        ctx: &mut ApiContext,
    ) {
        for plugin in &self.logging {
            if let Err(err) = plugin.log(req, resp, ctx).await {
                log_proxy_error(
                    &ctx.request_id,
                    LogStage::Logging,
                    LogComponent::Pipeline,
                    "logging_plugin_failed",
                    "日志插件执行失败",
                    &err,
                );
            }
        }
    }
}
