//! # 网关核心
//!
//! 请求管道引擎及其周边：上下文、缓冲请求/响应、上游池、
//! 配额守卫、上游派发和 axum 入口。

pub mod context;
pub mod dispatch;
pub mod handler;
pub mod pipeline;
pub mod quota;
pub mod request;
pub mod upstream;

pub use context::ApiContext;
pub use pipeline::{Gateway, RequestOutcome};
pub use request::{GatewayRequest, GatewayResponse, UpstreamResponse};
pub use upstream::Upstream;
