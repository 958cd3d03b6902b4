//! # HMAC 认证插件
//!
//! 基于 HTTP `Date` 头的 HMAC 请求签名：
//! `Authorization: Signature keyId="...",algorithm="hmac-sha1",signature="..."`

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use uuid::Uuid;

use crate::error::{ProxyError, Result};
use crate::gateway::context::ApiContext;
use crate::gateway::request::GatewayRequest;
use crate::plugin::{AuthPlugin, Detection, GatewayPlugin};
use crate::types::{JsonMap, Key, KeyType};

type HmacSha1 = Hmac<Sha1>;

const KEY_TYPE_HMAC: &str = "HMAC";
const SIGNATURE_PREFIX: &str = "Signature ";

/// HMAC 认证插件（无状态，无配置项）
#[derive(Debug, Default)]
pub struct HmacAuthPlugin;

/// 解析 `k="v",k2="v2"` 形式的签名参数
fn parse_signature_params(raw: &str) -> JsonMap {
    let mut params = JsonMap::new();
    for part in raw.split(',') {
        if let Some((name, value)) = part.split_once('=') {
            let value = value.trim().trim_matches('"');
            params.insert(
                name.trim().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }
    params
}

impl GatewayPlugin for HmacAuthPlugin {
    fn as_auth(self: Arc<Self>) -> Option<Arc<dyn AuthPlugin>> {
        Some(self)
    }
}

#[async_trait]
impl AuthPlugin for HmacAuthPlugin {
    fn available_types(&self) -> Vec<KeyType> {
        vec![KeyType {
            name: KEY_TYPE_HMAC.to_string(),
            description: "HMAC-based request signing using the HTTP Date header.".to_string(),
        }]
    }

    fn generate(&self, key_type: &str) -> Result<Key> {
        if key_type != KEY_TYPE_HMAC {
            return Err(ProxyError::abort(
                400,
                format!("Unknown key type: {key_type}"),
            ));
        }
        let mut data = JsonMap::new();
        data.insert(
            "secret".to_string(),
            serde_json::Value::String(STANDARD.encode(Uuid::new_v4().as_bytes())),
        );
        Ok(Key {
            id: STANDARD.encode(Uuid::new_v4().as_bytes()),
            key_type: KEY_TYPE_HMAC.to_string(),
            realm: String::new(),
            quota: String::new(),
            data,
        })
    }

    async fn detect(
        &self,
        req: &GatewayRequest,
        _ctx: &mut ApiContext,
    ) -> Result<Option<Detection>> {
        let Some(authorization) = req.header("authorization") else {
            return Ok(None);
        };
        let Some(raw_params) = authorization.strip_prefix(SIGNATURE_PREFIX) else {
            return Ok(None);
        };

        let bits = parse_signature_params(raw_params);
        let key_id = bits.get("keyId").and_then(|v| v.as_str());
        let signature = bits.get("signature").and_then(|v| v.as_str());
        match (key_id, signature) {
            (Some(key_id), Some(_)) if !key_id.is_empty() => Ok(Some(Detection {
                key_id: key_id.to_string(),
                key_type: KEY_TYPE_HMAC.to_string(),
                bits,
            })),
            _ => Ok(None),
        }
    }

    async fn validate(
        &self,
        key: &Key,
        req: &GatewayRequest,
        _ctx: &mut ApiContext,
        bits: &JsonMap,
    ) -> Result<bool> {
        let Some(secret) = key.data_str("secret") else {
            return Ok(false);
        };
        let Some(signature) = bits.get("signature").and_then(|v| v.as_str()) else {
            return Ok(false);
        };
        let Ok(signature) = STANDARD.decode(signature) else {
            return Ok(false);
        };

        let date = req.header("date").unwrap_or_default();
        let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
            .map_err(|e| ProxyError::internal_with_source("构建 HMAC 计算器失败", e))?;
        mac.update(date.as_bytes());

        Ok(mac.verify_slice(&signature).is_ok())
    }
}
