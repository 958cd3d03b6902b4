//! # 缓冲请求/响应表示
//!
//! 管道处理的是完全缓冲后的请求和响应：请求体在入口一次读完，
//! 上游响应体整体读入 `Bytes`，下游阶段可反复读取而互不消耗。

use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use bytes::Bytes;

/// 入站请求的缓冲表示
///
/// 向上游派发时会基于它构造全新的出站请求（头表独立复制），
/// 出站侧的修改不会回写到这里。
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// 对端地址（配额按其 host 部分计数）
    pub peer_addr: SocketAddr,
}

impl GatewayRequest {
    /// 读取单个请求头的文本值
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// 对端地址的 host 部分
    #[must_use]
    pub fn peer_ip(&self) -> String {
        self.peer_addr.ip().to_string()
    }
}

/// 上游响应的缓冲表示，PostUpstream 插件可改写三个字段
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// 写回客户端的最终响应
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    /// 网关自产的 JSON 错误响应体：`{"error": message}`
    #[must_use]
    pub fn error_body(status: StatusCode, message: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=utf-8"),
        );
        let body = serde_json::to_vec(&serde_json::json!({ "error": message }))
            .unwrap_or_else(|_| b"{\"error\":\"internal error\"}".to_vec());
        Self {
            status,
            headers,
            body: Bytes::from(body),
        }
    }
}

impl From<UpstreamResponse> for GatewayResponse {
    fn from(resp: UpstreamResponse) -> Self {
        Self {
            status: resp.status,
            headers: resp.headers,
            body: resp.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_uses_json_envelope() {
        let resp = GatewayResponse::error_body(StatusCode::FORBIDDEN, "credentials rejected");
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert_eq!(
            resp.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json;charset=utf-8"
        );
        let parsed: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(parsed["error"], "credentials rejected");
    }
}
