//! # 请求上下文
//!
//! `ApiContext` 伴随每个请求走完整条管道：类型化字段供引擎使用，
//! `log` / `data` 两张 JSON 映射供插件沿链传递数据。

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::gateway::upstream::Upstream;
use crate::types::{JsonMap, Key};

/// 每请求管道上下文
///
/// 进入配额阶段时 `cost >= 1`；`keyless` 为真时 `key` 必为空。
/// `log` 中的值始终可表示为 JSON 树（插入即校验，`Value` 本身保证）。
#[derive(Debug, Clone)]
pub struct ApiContext {
    /// 请求关联标识，贯穿全部日志
    pub request_id: String,
    /// 是否为无凭据请求
    pub keyless: bool,
    /// 已验证的密钥
    pub key: Option<Key>,
    /// 本次请求的配额成本，默认 1
    pub cost: i64,
    /// 规范化后的请求路径（已剥离 API 前缀，保证前导斜杠、无尾部斜杠）
    pub path: String,
    /// 选中的上游；为空时派发阶段随机挑选
    pub upstream: Option<Arc<Upstream>>,
    /// 日志映射，最终交给 Logging 插件
    pub log: JsonMap,
    /// 插件间自由共享的数据映射
    pub data: JsonMap,
}

impl ApiContext {
    /// 构造请求入口处的初始上下文
    #[must_use]
    pub fn new(path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            keyless: false,
            key: None,
            cost: 1,
            path,
            upstream: None,
            log: JsonMap::new(),
            data: JsonMap::new(),
        }
    }

    /// 写入日志映射
    pub fn log_insert(&mut self, field: &str, value: Value) {
        self.log.insert(field.to_string(), value);
    }

    /// 配额阶段生效的成本；低于 1 的值按 1 计
    #[must_use]
    pub fn effective_cost(&self) -> i64 {
        self.cost.max(1)
    }
}

/// 去掉 API 前缀并规范化：保证前导斜杠、去掉尾部斜杠
///
/// `serve.api` 配置带不带尾部斜杠结果一致。
#[must_use]
pub fn normalize_path(raw_path: &str, api_prefix: &str) -> String {
    let prefix = api_prefix.trim_end_matches('/');
    let rest = raw_path.strip_prefix(prefix).unwrap_or(raw_path);
    let rest = rest.trim_start_matches('/').trim_end_matches('/');
    format!("/{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_starts_with_unit_cost() {
        let ctx = ApiContext::new("/".into());
        assert_eq!(ctx.cost, 1);
        assert!(!ctx.keyless);
        assert!(ctx.key.is_none());
        assert!(ctx.upstream.is_none());
    }

    #[test]
    fn effective_cost_clamps_below_one() {
        let mut ctx = ApiContext::new("/".into());
        ctx.cost = 0;
        assert_eq!(ctx.effective_cost(), 1);
        ctx.cost = -3;
        assert_eq!(ctx.effective_cost(), 1);
        ctx.cost = 7;
        assert_eq!(ctx.effective_cost(), 7);
    }

    #[test]
    fn path_normalization_strips_prefix_and_slashes() {
        assert_eq!(normalize_path("/api/users/", "/api/"), "/users");
        assert_eq!(normalize_path("/api/users", "/api"), "/users");
        assert_eq!(normalize_path("/users", "/"), "/users");
        assert_eq!(normalize_path("/", "/"), "/");
        assert_eq!(normalize_path("/api/", "/api/"), "/");
    }

    #[test]
    fn trailing_slash_on_prefix_is_irrelevant() {
        assert_eq!(
            normalize_path("/v1/things", "/v1"),
            normalize_path("/v1/things", "/v1/")
        );
    }
}
