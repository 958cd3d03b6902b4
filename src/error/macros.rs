//! # 错误处理宏

/// 快速创建中止错误的宏
#[macro_export]
macro_rules! abort_error {
    ($status:expr, $msg:expr) => {
        $crate::error::ProxyError::abort($status, $msg)
    };
    ($status:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::abort($status, format!($fmt, $($arg)*))
    };
}

/// 快速创建配置错误的宏
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::ProxyError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::config(format!($fmt, $($arg)*))
    };
}

/// 快速创建数据库错误的宏
#[macro_export]
macro_rules! database_error {
    ($msg:expr) => {
        $crate::error::ProxyError::database($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::database(format!($fmt, $($arg)*))
    };
}

/// 快速创建缓存错误的宏
#[macro_export]
macro_rules! cache_error {
    ($msg:expr) => {
        $crate::error::ProxyError::cache($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::cache(format!($fmt, $($arg)*))
    };
}

/// 快速创建网络错误的宏
#[macro_export]
macro_rules! network_error {
    ($msg:expr) => {
        $crate::error::ProxyError::network($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::network(format!($fmt, $($arg)*))
    };
}

/// 快速创建认证错误的宏
#[macro_export]
macro_rules! auth_error {
    ($msg:expr) => {
        $crate::error::ProxyError::auth($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::auth(format!($fmt, $($arg)*))
    };
}

/// 快速创建内部错误的宏
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::ProxyError::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::internal(format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回配置错误
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::config_error!($msg));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::config_error!($fmt, $($arg)*));
        }
    };
}

/// 确保条件成立，否则中止请求
#[macro_export]
macro_rules! ensure_abort {
    ($cond:expr, $status:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::abort_error!($status, $msg));
        }
    };
    ($cond:expr, $status:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::abort_error!($status, $fmt, $($arg)*));
        }
    };
}
