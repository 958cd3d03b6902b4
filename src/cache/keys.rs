//! # 存储键命名规范
//!
//! 定义统一的键生成策略，所有落入共享存储的键都经由这里构造

/// 存储键类型
#[derive(Debug, Clone)]
pub enum CacheKey {
    /// 已验证密钥缓存 - `auth_cache:{key_id}`
    AuthCache { key_id: String },

    /// 按 IP 配额计数器 - `quota:ip:{id}:{ip}`
    QuotaIp { id: String, ip: String },

    /// 按密钥配额计数器 - `quota:key:{id}`
    QuotaKey { id: String },

    /// 门户激活码 - `activation:{code}`
    Activation { code: String },
}

impl CacheKey {
    /// 生成键字符串
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::AuthCache { key_id } => format!("auth_cache:{key_id}"),
            Self::QuotaIp { id, ip } => format!("quota:ip:{id}:{ip}"),
            Self::QuotaKey { id } => format!("quota:key:{id}"),
            Self::Activation { code } => format!("activation:{code}"),
        }
    }

    /// 键的命名空间
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::AuthCache { .. } => "auth_cache",
            Self::QuotaIp { .. } | Self::QuotaKey { .. } => "quota",
            Self::Activation { .. } => "activation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_key_layout() {
        let key = CacheKey::AuthCache {
            key_id: "abc".into(),
        };
        assert_eq!(key.build(), "auth_cache:abc");

        let key = CacheKey::QuotaIp {
            id: "keyless".into(),
            ip: "10.0.0.1".into(),
        };
        assert_eq!(key.build(), "quota:ip:keyless:10.0.0.1");

        let key = CacheKey::QuotaKey { id: "k-1".into() };
        assert_eq!(key.build(), "quota:key:k-1");
        assert_eq!(key.namespace(), "quota");
    }
}
