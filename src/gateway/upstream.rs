//! # 上游池
//!
//! 统一解析 `base_url` 可能包含的 scheme / path / port，启动时为每个
//! 上游构建可复用的 HTTP 客户端，进程生命周期内共享。

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use url::Url;

use crate::ensure_config;
use crate::error::{ProxyError, Result};

/// 单个上游：解析后的基地址 + 共享客户端
#[derive(Debug, Clone)]
pub struct Upstream {
    /// 解析后的基地址（scheme / host / port / base path）
    pub base: Url,
    /// 复用的 HTTP 客户端，带配置的请求截止时间
    pub client: reqwest::Client,
}

impl Upstream {
    /// 上游自身的基路径（保证前导斜杠）
    #[must_use]
    pub fn base_path(&self) -> &str {
        let path = self.base.path();
        if path.is_empty() { "/" } else { path }
    }
}

/// 解析上游 `base_url`；缺失 scheme 时按 https 处理
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    ensure_config!(!trimmed.is_empty(), "上游 base_url 不能为空");

    let url = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("https://{trimmed}"))
    }
    .map_err(|e| ProxyError::config_with_source(format!("无效的上游地址: {trimmed}"), e))?;

    ensure_config!(url.host().is_some(), "上游地址缺少 host: {}", trimmed);
    ensure_config!(
        matches!(url.scheme(), "http" | "https"),
        "上游地址 scheme 必须是 http/https: {}",
        trimmed
    );

    Ok(url)
}

/// 根据配置构建上游池
pub fn build_upstreams(addresses: &[String], timeout: Duration) -> Result<Vec<Arc<Upstream>>> {
    ensure_config!(!addresses.is_empty(), "至少需要配置一个上游");

    let mut upstreams = Vec::with_capacity(addresses.len());
    for address in addresses {
        let base = parse_base_url(address)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::server_init_with_source("构建上游 HTTP 客户端失败", e))?;
        upstreams.push(Arc::new(Upstream { base, client }));
    }
    Ok(upstreams)
}

/// 均匀随机挑选一个上游
#[must_use]
pub fn pick_random(upstreams: &[Arc<Upstream>]) -> Arc<Upstream> {
    let index = rand::thread_rng().gen_range(0..upstreams.len());
    upstreams[index].clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url_with_path() {
        let url = parse_base_url("http://api.internal:8000/v2/").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("api.internal"));
        assert_eq!(url.port(), Some(8000));
        assert_eq!(url.path(), "/v2/");
    }

    #[test]
    fn bare_host_defaults_to_https() {
        let url = parse_base_url("api.example.org").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn rejects_empty_and_schemeless_garbage() {
        assert!(parse_base_url("").is_err());
        assert!(parse_base_url("ftp://files.example.org").is_err());
    }

    #[test]
    fn build_upstreams_requires_at_least_one() {
        assert!(build_upstreams(&[], Duration::from_secs(30)).is_err());

        let pool = build_upstreams(
            &["http://127.0.0.1:8000/".to_string()],
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].base_path(), "/");
    }
}
