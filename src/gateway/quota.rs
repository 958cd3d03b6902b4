//! # 配额检查
//!
//! 固定窗口计数：每个 `(范围, 密钥或IP)` 一个计数器，TTL 即窗口长度，
//! 到期整体过期、归零重计。计数器所在的共享存储是唯一事实来源。

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheKey, KvStore};
use crate::error::{ProxyError, Result};
use crate::gateway::context::ApiContext;
use crate::types::Quota;

/// 名为 `keyless` 的配额同时是无凭据流量的开关
pub const QUOTA_KEYLESS: &str = "keyless";
const QUOTA_DEFAULT: &str = "default";

/// 配额守卫
pub struct QuotaGuard {
    store: Arc<dyn KvStore>,
    quotas: HashMap<String, Quota>,
}

impl QuotaGuard {
    pub fn new(store: Arc<dyn KvStore>, quotas: HashMap<String, Quota>) -> Self {
        Self { store, quotas }
    }

    /// 是否允许无凭据流量
    #[must_use]
    pub fn keyless_enabled(&self) -> bool {
        self.quotas.contains_key(QUOTA_KEYLESS)
    }

    /// 解析命名配额；未知名称回落到 `default`
    #[must_use]
    pub fn resolve(&self, name: &str) -> Quota {
        self.quotas
            .get(name)
            .or_else(|| self.quotas.get(QUOTA_DEFAULT))
            .copied()
            .unwrap_or(Quota {
                minutes: 0,
                max_ip: 0,
                max_key: 0,
            })
    }

    /// 检查单个计数器；超限返回 true，否则计入本次成本
    ///
    /// GET 与 INCRBY 之间存在普通竞态窗口，突发下超出一两次可接受。
    async fn over_quota(&self, counter: &str, cost: i64, max: i64, minutes: i64) -> Result<bool> {
        let window_seconds = u64::try_from(minutes).unwrap_or(0) * 60;

        let current = match self.store.get(counter).await? {
            Some(raw) => raw.parse::<i64>().unwrap_or(0),
            None => {
                self.store.set_ex(counter, "0", window_seconds).await?;
                0
            }
        };

        if current + cost > max {
            return Ok(true);
        }

        self.store.incr_by(counter, cost).await?;
        Ok(false)
    }

    /// 按上下文检查请求配额；按 IP 和按密钥两个子限额独立判定
    pub async fn check(&self, ctx: &ApiContext, client_ip: &str) -> Result<()> {
        let (quota_name, id) = if ctx.keyless {
            (QUOTA_KEYLESS.to_string(), QUOTA_KEYLESS.to_string())
        } else {
            match &ctx.key {
                Some(key) => (key.quota.clone(), key.id.clone()),
                // 认证阶段保证非 keyless 必有密钥；此处防御性回落
                None => (QUOTA_DEFAULT.to_string(), QUOTA_DEFAULT.to_string()),
            }
        };

        let quota = self.resolve(&quota_name);
        if quota.minutes <= 0 {
            return Ok(());
        }

        let cost = ctx.effective_cost();

        if quota.max_ip > 0 {
            let counter = CacheKey::QuotaIp {
                id: id.clone(),
                ip: client_ip.to_string(),
            }
            .build();
            if self
                .over_quota(&counter, cost, quota.max_ip, quota.minutes)
                .await?
            {
                return Err(ProxyError::abort(
                    403,
                    format!(
                        "Request quota per IP exceeded ({} reqs / {} mins). Please wait before making new requests.",
                        quota.max_ip, quota.minutes
                    ),
                ));
            }
        }

        if quota.max_key > 0 {
            let counter = CacheKey::QuotaKey { id }.build();
            if self
                .over_quota(&counter, cost, quota.max_key, quota.minutes)
                .await?
            {
                return Err(ProxyError::abort(
                    403,
                    format!(
                        "Request quota per key exceeded ({} reqs / {} mins). Please wait before making new requests.",
                        quota.max_key, quota.minutes
                    ),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::types::Key;

    fn guard(quotas: &[(&str, Quota)]) -> QuotaGuard {
        let quotas = quotas
            .iter()
            .map(|(name, quota)| ((*name).to_string(), *quota))
            .collect();
        QuotaGuard::new(Arc::new(MemoryStore::new()), quotas)
    }

    fn keyless_ctx() -> ApiContext {
        let mut ctx = ApiContext::new("/".into());
        ctx.keyless = true;
        ctx
    }

    fn keyed_ctx(quota: &str) -> ApiContext {
        let mut ctx = ApiContext::new("/".into());
        ctx.key = Some(Key {
            id: "k-1".into(),
            key_type: "HMAC".into(),
            realm: String::new(),
            quota: quota.into(),
            data: crate::types::JsonMap::new(),
        });
        ctx
    }

    #[tokio::test]
    async fn keyless_limit_allows_then_aborts() {
        let guard = guard(&[
            ("default", Quota { minutes: 5, max_ip: 50, max_key: 5000 }),
            ("keyless", Quota { minutes: 5, max_ip: 5, max_key: 0 }),
        ]);
        let ctx = keyless_ctx();

        for _ in 0..5 {
            guard.check(&ctx, "10.0.0.1").await.unwrap();
        }
        let err = guard.check(&ctx, "10.0.0.1").await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 403);
        assert!(err.to_string().contains("per IP"));

        // 其它 IP 不受影响
        guard.check(&ctx, "10.0.0.2").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_quota_name_falls_back_to_default() {
        let guard = guard(&[("default", Quota { minutes: 5, max_ip: 0, max_key: 2 })]);
        let ctx = keyed_ctx("no-such-quota");

        guard.check(&ctx, "10.0.0.1").await.unwrap();
        guard.check(&ctx, "10.0.0.1").await.unwrap();
        assert!(guard.check(&ctx, "10.0.0.1").await.is_err());
    }

    #[tokio::test]
    async fn zero_minutes_disables_counting() {
        let guard = guard(&[("default", Quota { minutes: 0, max_ip: 1, max_key: 1 })]);
        let ctx = keyed_ctx("default");
        for _ in 0..10 {
            guard.check(&ctx, "10.0.0.1").await.unwrap();
        }
    }

    #[tokio::test]
    async fn cost_below_one_counts_as_one() {
        let guard = guard(&[("default", Quota { minutes: 5, max_ip: 0, max_key: 3 })]);
        let mut ctx = keyed_ctx("default");
        ctx.cost = 0;

        for _ in 0..3 {
            guard.check(&ctx, "10.0.0.1").await.unwrap();
        }
        assert!(guard.check(&ctx, "10.0.0.1").await.is_err());
    }

    #[tokio::test]
    async fn cost_applies_to_both_sub_limits() {
        let guard = guard(&[("default", Quota { minutes: 5, max_ip: 5, max_key: 5 })]);
        let mut ctx = keyed_ctx("default");
        ctx.cost = 3;

        guard.check(&ctx, "10.0.0.1").await.unwrap();
        // 3 + 3 > 5：按 IP 先行中止
        let err = guard.check(&ctx, "10.0.0.1").await.unwrap_err();
        assert!(err.to_string().contains("per IP"));
    }

    #[tokio::test]
    async fn counter_reset_allows_traffic_again() {
        let store = Arc::new(MemoryStore::new());
        let mut quotas = HashMap::new();
        quotas.insert(
            "default".to_string(),
            Quota { minutes: 1, max_ip: 1, max_key: 0 },
        );
        let guard = QuotaGuard::new(store.clone(), quotas);
        let ctx = keyed_ctx("default");

        guard.check(&ctx, "10.0.0.1").await.unwrap();
        assert!(guard.check(&ctx, "10.0.0.1").await.is_err());

        // 模拟窗口到期：计数器整体过期
        store.delete("quota:ip:k-1:10.0.0.1").await.unwrap();
        guard.check(&ctx, "10.0.0.1").await.unwrap();
    }
}
