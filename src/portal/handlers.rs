//! # 门户处理器
//!
//! 账户注册、激活、令牌签发和密钥自助管理。全部响应为 JSON；
//! 错误体 `{"error": message}`，与网关平面一致。

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::cache::{CacheKey, KvStore};
use crate::error::{ProxyError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage, log_proxy_error};
use crate::plugin::{AuthPlugin, ManagementPlugin};
use crate::portal::token::TokenIssuer;
use crate::server::AppState;
use crate::types::{JsonMap, KeyType, User};

/// 激活码有效期：24 小时
const ACTIVATION_TTL_SECONDS: u64 = 24 * 60 * 60;

/// 门户运行时上下文
///
/// 只有在装配出权威管理后端时才会构建；没有管理后端的部署
/// 直接拒绝初始化门户。
pub struct PortalContext {
    pub(crate) management: Arc<dyn ManagementPlugin>,
    pub(crate) key_types: HashMap<String, KeyType>,
    pub(crate) key_plugins: HashMap<String, Arc<dyn AuthPlugin>>,
    pub(crate) token: TokenIssuer,
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) redirect: String,
}

impl PortalContext {
    /// 由网关的管理后端和认证插件组装门户
    pub fn build(
        management: Option<Arc<dyn ManagementPlugin>>,
        auth_plugins: &[Arc<dyn AuthPlugin>],
        store: Arc<dyn KvStore>,
        signing_key: &str,
        redirect: &str,
    ) -> Result<Self> {
        let management = management.ok_or_else(|| {
            ProxyError::server_init(
                "无法创建门户：没有支持完整用户管理的后端插件",
            )
        })?;

        let mut key_types = HashMap::new();
        let mut key_plugins = HashMap::new();
        for plugin in auth_plugins {
            for key_type in plugin.available_types() {
                key_types.insert(key_type.name.clone(), key_type.clone());
                key_plugins.insert(key_type.name, plugin.clone());
            }
        }

        Ok(Self {
            management,
            key_types,
            key_plugins,
            token: TokenIssuer::new(signing_key),
            store,
            redirect: redirect.to_string(),
        })
    }

    /// 从请求头解析 Bearer 令牌，返回调用者邮箱
    fn caller_email(&self, headers: &HeaderMap) -> Result<String> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                ProxyError::abort(
                    403,
                    "Access denied: please authenticate using a valid token.",
                )
            })?;
        self.token.verify(token)
    }
}

/// 门户平面的错误包装，统一渲染为 `{"error": message}`
pub struct PortalError(ProxyError);

impl From<ProxyError> for PortalError {
    fn from(err: ProxyError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        log_proxy_error(
            "portal",
            LogStage::Portal,
            LogComponent::Portal,
            "portal_request_failed",
            "门户请求失败",
            &self.0,
        );
        abort_response(self.0.status_code(), &self.0.to_string())
    }
}

type PortalResult = std::result::Result<Response, PortalError>;

fn json_content_type() -> (header::HeaderName, &'static str) {
    (header::CONTENT_TYPE, "application/json;charset=utf-8")
}

/// 成功响应：200 + JSON 结果
fn finish<T: serde::Serialize>(result: &T) -> Response {
    (StatusCode::OK, [json_content_type()], Json(result)).into_response()
}

/// 错误响应：状态码 + `{"error": message}`
fn abort_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [json_content_type()],
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

fn portal(state: &AppState) -> Result<Arc<PortalContext>> {
    state
        .portal
        .clone()
        .ok_or_else(|| ProxyError::internal("门户未初始化"))
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub profile: JsonMap,
}

/// POST /account：注册账户（初始未激活）
pub async fn create_account(
    State(state): State<AppState>,
    Json(body): Json<CreateAccountRequest>,
) -> PortalResult {
    let portal = portal(&state)?;

    if body.email.is_empty() || body.name.is_empty() || body.password.is_empty() {
        return Ok(abort_response(
            StatusCode::BAD_REQUEST,
            "Request a new account by supplying your email, name and password.",
        ));
    }

    let user = User {
        email: body.email.clone(),
        name: body.name,
        admin: false,
        active: false,
        profile: body.profile,
    };
    let created = match portal.management.add_user(&body.email, &body.password, &user).await {
        Ok(created) => created,
        Err(err) => {
            return Ok(abort_response(
                StatusCode::BAD_REQUEST,
                &format!("Could not create new account: {err}"),
            ));
        }
    };

    if !created.active {
        // 激活码经带外渠道（邮件）送达；这里落存储并记录
        let code = Uuid::new_v4().simple().to_string();
        let activation_key = CacheKey::Activation { code: code.clone() }.build();
        portal
            .store
            .set_ex(&activation_key, &body.email, ACTIVATION_TTL_SECONDS)
            .await?;
        linfo!(
            "portal",
            LogStage::Portal,
            LogComponent::Portal,
            "activation_code_issued",
            &format!("用户 {} 的激活码已生成: {code}", body.email)
        );
    }

    Ok(finish(&created))
}

/// GET /account/activate/{code}：消费激活码并跳转门户
pub async fn activate_account(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> PortalResult {
    let portal = portal(&state)?;

    let activation_key = CacheKey::Activation { code }.build();
    let Some(email) = portal.store.get(&activation_key).await? else {
        return Ok(abort_response(
            StatusCode::NOT_FOUND,
            "Unknown or expired activation code.",
        ));
    };

    portal.management.activate_user(&email).await?;
    let _ = portal.store.delete(&activation_key).await;

    linfo!(
        "portal",
        LogStage::Portal,
        LogComponent::Portal,
        "account_activated",
        &format!("用户 {email} 已激活")
    );

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, portal.redirect.clone())],
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /account/token：邮箱密码换取签名令牌
pub async fn get_token(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> PortalResult {
    let portal = portal(&state)?;

    if body.email.is_empty() || body.password.is_empty() {
        return Ok(abort_response(
            StatusCode::BAD_REQUEST,
            "Log in by supplying your email and password.",
        ));
    }

    let user = portal
        .management
        .authenticate(&body.email, &body.password)
        .await?;
    let Some(user) = user else {
        return Ok(abort_response(
            StatusCode::FORBIDDEN,
            "Wrong email/password combination.",
        ));
    };

    let token = portal.token.issue(&user.email)?;
    Ok(finish(&serde_json::json!({ "token": token })))
}

/// GET /keys/types：可签发的密钥类型
pub async fn get_key_types(State(state): State<AppState>, headers: HeaderMap) -> PortalResult {
    let portal = portal(&state)?;
    portal.caller_email(&headers)?;
    Ok(finish(&portal.key_types))
}

/// GET /keys：列出调用者的全部密钥
pub async fn get_all_keys(State(state): State<AppState>, headers: HeaderMap) -> PortalResult {
    let portal = portal(&state)?;
    let email = portal.caller_email(&headers)?;
    let keys = portal.management.get_all_keys(&email).await?;
    Ok(finish(&keys))
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    #[serde(rename = "type", default)]
    pub key_type: String,
    #[serde(default)]
    pub realm: String,
}

/// POST /keys：经对应认证插件签发新密钥
pub async fn create_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateKeyRequest>,
) -> PortalResult {
    let portal = portal(&state)?;
    let email = portal.caller_email(&headers)?;

    if body.key_type.is_empty() {
        return Ok(abort_response(StatusCode::BAD_REQUEST, "Specify a key_type."));
    }
    let Some(plugin) = portal.key_plugins.get(&body.key_type) else {
        return Ok(abort_response(
            StatusCode::BAD_REQUEST,
            "The requested key type is not available for creation.",
        ));
    };

    let mut key = plugin.generate(&body.key_type)?;
    key.realm = body.realm;

    portal.management.add_key(&email, &key).await?;
    Ok(finish(&key))
}

#[derive(Debug, Deserialize)]
pub struct DeleteKeyRequest {
    #[serde(default)]
    pub key_id: String,
}

/// POST /keys/delete：删除密钥并使其缓存条目失效
pub async fn delete_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeleteKeyRequest>,
) -> PortalResult {
    let portal = portal(&state)?;
    let email = portal.caller_email(&headers)?;

    if body.key_id.is_empty() {
        return Ok(abort_response(
            StatusCode::BAD_REQUEST,
            "Specify a key_id to delete.",
        ));
    }

    portal.management.delete_key(&email, &body.key_id).await?;

    // 管理后端变更后由这里负责让键缓存失效
    let cache_key = CacheKey::AuthCache {
        key_id: body.key_id.clone(),
    }
    .build();
    let _ = portal.store.delete(&cache_key).await;

    Ok(finish(&serde_json::json!({ "deleted": body.key_id })))
}
