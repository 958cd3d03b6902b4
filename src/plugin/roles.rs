//! # 插件角色能力
//!
//! 每个角色是一个独立 trait；引擎只通过插件声明的角色调用它。
//! 所有实现必须 `Send + Sync`，内部状态自行同步（见并发模型）。

use async_trait::async_trait;

use crate::error::Result;
use crate::gateway::context::ApiContext;
use crate::gateway::request::{GatewayRequest, UpstreamResponse};
use crate::types::{JsonMap, Key, KeyType, User};

/// `detect` 的识别结果
///
/// `bits` 是插件私有的携带数据（如解析出的签名分量），
/// 原样传给同一插件的 `validate`。
#[derive(Debug, Clone)]
pub struct Detection {
    pub key_id: String,
    pub key_type: String,
    pub bits: JsonMap,
}

/// 认证角色：负责一种或多种密钥类型
#[async_trait]
pub trait AuthPlugin: Send + Sync {
    /// 本插件提供的密钥类型
    fn available_types(&self) -> Vec<KeyType>;

    /// 生成指定类型的新密钥（门户签发流程使用）
    fn generate(&self, key_type: &str) -> Result<Key>;

    /// 检查请求是否携带本插件认识的凭据
    ///
    /// 返回 `None` 表示"不认识这个请求"，引擎继续尝试后续认证插件。
    async fn detect(
        &self,
        req: &GatewayRequest,
        ctx: &mut ApiContext,
    ) -> Result<Option<Detection>>;

    /// 用找到的完整密钥对请求做最终校验
    async fn validate(
        &self,
        key: &Key,
        req: &GatewayRequest,
        ctx: &mut ApiContext,
        bits: &JsonMap,
    ) -> Result<bool>;
}

/// 后端角色：按 id + 类型查找密钥
#[async_trait]
pub trait BackendPlugin: Send + Sync {
    /// 查找密钥；不存在返回 `None`
    async fn get_key(&self, key_id: &str, key_type: &str) -> Result<Option<Key>>;
}

/// 管理后端角色：在后端之上补齐用户/密钥的完整生命周期
///
/// 管道顺序中第一个声明该角色的后端成为权威管理后端。
#[async_trait]
pub trait ManagementPlugin: BackendPlugin {
    /// 创建用户（初始为未激活）
    async fn add_user(&self, email: &str, password: &str, user: &User) -> Result<User>;

    /// 按邮箱查找用户
    async fn get_user(&self, email: &str) -> Result<Option<User>>;

    /// 校验邮箱密码；未激活或不匹配返回 `None`
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>>;

    /// 激活用户
    async fn activate_user(&self, email: &str) -> Result<()>;

    /// 重置密码
    async fn reset_password(&self, email: &str, new_password: &str) -> Result<()>;

    /// 更新用户资料（名称与档案）
    async fn update_user(&self, email: &str, user: &User) -> Result<()>;

    /// 为用户追加密钥
    async fn add_key(&self, email: &str, key: &Key) -> Result<()>;

    /// 删除用户的密钥（校验归属）
    async fn delete_key(&self, email: &str, key_id: &str) -> Result<()>;

    /// 列出用户的全部密钥
    async fn get_all_keys(&self, email: &str) -> Result<Vec<Key>>;
}

/// 认证后角色：请求已合法，配额未检查；可调整成本和路径
#[async_trait]
pub trait PostAuthPlugin: Send + Sync {
    async fn post_auth(&self, req: &GatewayRequest, ctx: &mut ApiContext) -> Result<()>;
}

/// 上游前角色：可改写出站请求、指定上游
#[async_trait]
pub trait PreUpstreamPlugin: Send + Sync {
    async fn pre_upstream(&self, req: &mut GatewayRequest, ctx: &mut ApiContext) -> Result<()>;
}

/// 上游后角色：观察并可改写缓冲后的响应
#[async_trait]
pub trait PostUpstreamPlugin: Send + Sync {
    async fn post_upstream(
        &self,
        req: &GatewayRequest,
        resp: &mut UpstreamResponse,
        ctx: &mut ApiContext,
    ) -> Result<()>;
}

/// 日志角色：响应写回客户端之后运行，错误不影响请求结果
#[async_trait]
pub trait LoggingPlugin: Send + Sync {
    async fn log(
        &self,
        req: &GatewayRequest,
        resp: &crate::gateway::request::GatewayResponse,
        ctx: &mut ApiContext,
    ) -> Result<()>;
}
