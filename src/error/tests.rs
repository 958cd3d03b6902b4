//! # 错误模块测试

use axum::http::StatusCode;

use super::{ErrorCategory, PluginBuildError, ProxyError};

#[test]
fn abort_carries_status_and_message() {
    let err = ProxyError::abort(403, "quota exceeded");
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(err.to_string(), "quota exceeded");
    assert_eq!(err.category(), ErrorCategory::Client);
}

#[test]
fn abort_without_status_defaults_to_400() {
    let err = ProxyError::abort(0, "missing parameter");
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[test]
fn internal_errors_render_as_500() {
    let err = ProxyError::internal("boom");
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.category(), ErrorCategory::Server);

    let err = ProxyError::database("connection lost");
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn upstream_failures_map_to_gateway_statuses() {
    let err = ProxyError::upstream_unavailable("connection refused");
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

    let err = ProxyError::upstream_timeout("no response", 30);
    assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
}

#[test]
fn plugin_build_errors_are_internal() {
    let err: ProxyError = PluginBuildError::UnknownPlugin("nope".into()).into();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(err.to_string().contains("nope"));
}

#[test]
fn error_macros_format_arguments() {
    let err = crate::abort_error!(403, "limit {} reached", 5);
    assert_eq!(err.to_string(), "limit 5 reached");

    let err = crate::config_error!("bad field '{}'", "minutes");
    assert!(err.to_string().contains("minutes"));
}
