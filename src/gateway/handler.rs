//! # 网关 HTTP 入口
//!
//! axum 与管道引擎之间的粘合：缓冲请求体、构造 `GatewayRequest`、
//! 在独立任务上跑管道。客户端提前断开只会跳过响应写回，
//! 日志阶段仍然执行。

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;

use crate::gateway::request::{GatewayRequest, GatewayResponse};
use crate::server::AppState;

/// 缓冲体上限：网关整体缓冲请求与响应，不做流式透传
const MAX_BUFFERED_BODY: usize = 64 * 1024 * 1024;

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// 网关子树的统一入口，任意方法
pub async fn gateway_entry(
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(body) => body,
        Err(_) => {
            return GatewayResponse::error_body(
                StatusCode::PAYLOAD_TOO_LARGE,
                "request body too large",
            )
            .into_response();
        }
    };

    let req = GatewayRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
        peer_addr,
    };

    // 管道在独立任务上执行：客户端断开（本 future 被丢弃）不会打断
    // 管道和日志阶段，只是没有人再读响应。
    let gateway = state.gateway.clone();
    let (resp_tx, resp_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut outcome = gateway.process(req).await;
        let _ = resp_tx.send(outcome.response.clone());
        gateway
            .run_logging(&outcome.request, &outcome.response, &mut outcome.ctx)
            .await;
    });

    match resp_rx.await {
        Ok(response) => response.into_response(),
        Err(_) => GatewayResponse::error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "request processing task failed",
        )
        .into_response(),
    }
}
