//! # 上游派发
//!
//! 基于入站请求构造出站请求：替换 scheme/host、以上游基路径替换
//! API 前缀、剥离逐跳头、追加 X-Forwarded-For，经上游共享客户端发送，
//! 响应体整体缓冲。

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use url::Url;

use crate::error::{ProxyError, Result};
use crate::gateway::context::ApiContext;
use crate::gateway::request::{GatewayRequest, UpstreamResponse};
use crate::gateway::upstream::Upstream;

/// 逐跳头（RFC 2616 §13），网关在每一跳上剥离
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// 从头表中剥离全部逐跳头
pub fn strip_hop_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// 追加客户端 IP 到 X-Forwarded-For，保序逗号拼接
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: &str) {
    let prior: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {client_ip}", prior.join(", "))
    };

    headers.remove("x-forwarded-for");
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static("x-forwarded-for"), value);
    }
}

/// 构造出站 URL：上游基路径 + 规范化请求路径，查询串原样保留
pub fn upstream_url(upstream: &Upstream, ctx_path: &str, query: Option<&str>) -> Url {
    let mut url = upstream.base.clone();
    let joined = format!("{}{ctx_path}", upstream.base_path().trim_end_matches('/'));
    url.set_path(&joined);
    url.set_query(query);
    url
}

/// 构造出站头表：独立复制，出站侧修改不影响入站结构
fn outbound_headers(req: &GatewayRequest) -> HeaderMap {
    let mut headers = req.headers.clone();
    strip_hop_headers(&mut headers);
    // Host 随上游重写，Content-Length 由客户端按缓冲体重算
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    append_forwarded_for(&mut headers, &req.peer_ip());
    headers
}

/// 派发请求到选定上游，响应体完整读入缓冲
///
/// 传输错误中止 502，超出截止时间中止 504。
pub async fn dispatch(
    req: &GatewayRequest,
    ctx: &ApiContext,
    upstream: &Upstream,
    timeout_seconds: u64,
) -> Result<UpstreamResponse> {
    let url = upstream_url(upstream, &ctx.path, req.uri.query());
    let headers = outbound_headers(req);

    let response = upstream
        .client
        .request(req.method.clone(), url)
        .headers(headers)
        .body(req.body.clone())
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProxyError::upstream_timeout("上游在截止时间内未响应", timeout_seconds)
            } else {
                ProxyError::upstream_unavailable_with_source("上游请求失败", e)
            }
        })?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ProxyError::upstream_timeout("读取上游响应超时", timeout_seconds)
        } else {
            ProxyError::upstream_unavailable_with_source("读取上游响应失败", e)
        }
    })?;

    Ok(UpstreamResponse {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn upstream(base: &str) -> Upstream {
        Upstream {
            base: Url::parse(base).unwrap(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(1))
                .build()
                .unwrap(),
        }
    }

    #[test]
    fn hop_by_hop_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("close"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("upgrade", HeaderValue::from_static("websocket"));
        headers.insert("x-custom", HeaderValue::from_static("stays"));

        strip_hop_headers(&mut headers);

        assert!(headers.get("connection").is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert!(headers.get("upgrade").is_none());
        assert_eq!(headers.get("x-custom").unwrap(), "stays");
    }

    #[test]
    fn forwarded_for_appends_preserving_order() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1");
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "10.0.0.1");

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.5, 172.16.0.9"),
        );
        append_forwarded_for(&mut headers, "10.0.0.1");
        assert_eq!(
            headers.get("x-forwarded-for").unwrap(),
            "192.168.1.5, 172.16.0.9, 10.0.0.1"
        );
    }

    #[test]
    fn upstream_url_substitutes_base_path() {
        let up = upstream("http://backend:8000/");
        let url = upstream_url(&up, "/users", None);
        assert_eq!(url.as_str(), "http://backend:8000/users");

        let up = upstream("http://backend:8000/v2/");
        let url = upstream_url(&up, "/users", Some("page=2"));
        assert_eq!(url.as_str(), "http://backend:8000/v2/users?page=2");

        let url = upstream_url(&up, "/", None);
        assert_eq!(url.as_str(), "http://backend:8000/v2/");
    }

    #[test]
    fn outbound_headers_do_not_alias_inbound() {
        let mut headers = HeaderMap::new();
        headers.insert("x-app", HeaderValue::from_static("one"));
        headers.insert("connection", HeaderValue::from_static("close"));
        let req = GatewayRequest {
            method: axum::http::Method::GET,
            uri: axum::http::Uri::from_static("/"),
            headers,
            body: bytes::Bytes::new(),
            peer_addr: "10.0.0.1:50000".parse().unwrap(),
        };

        let outbound = outbound_headers(&req);
        assert!(outbound.get("connection").is_none());
        assert_eq!(outbound.get("x-forwarded-for").unwrap(), "10.0.0.1");
        // 入站头保持原样
        assert_eq!(req.headers.get("connection").unwrap(), "close");
        assert!(req.headers.get("x-forwarded-for").is_none());
    }
}
