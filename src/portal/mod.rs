//! # 开发者门户
//!
//! 账户/密钥自助管理的 HTTP 外观，复用网关的管理后端与认证插件。
//! 登录后使用短期 HS256 令牌认证后续调用。

mod handlers;
mod token;

pub use handlers::PortalContext;
pub use token::TokenIssuer;

use axum::Router;
use axum::routing::{get, post};

use crate::server::AppState;

/// 门户子树路由
pub fn portal_routes() -> Router<AppState> {
    Router::new()
        .route("/account", post(handlers::create_account))
        .route("/account/token", post(handlers::get_token))
        .route("/account/activate/{code}", get(handlers::activate_account))
        .route("/keys/types", get(handlers::get_key_types))
        .route(
            "/keys",
            get(handlers::get_all_keys).post(handlers::create_key),
        )
        .route("/keys/delete", post(handlers::delete_key))
}
