//! # API 密钥实体定义
//!
//! 网关密钥表的 Sea-ORM 实体模型，软删除语义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// API 密钥实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key_id: String,
    /// 密钥类型标签（如 "HMAC"）
    pub key_type: String,
    /// 绑定的应用或来源标识
    pub realm: String,
    /// 命名配额
    pub quota: String,
    /// JSON 序列化的类型私有数据（签名秘密等）
    pub data: String,
    /// 所属用户邮箱
    #[sea_orm(indexed)]
    pub user_email: String,
    pub created_at: DateTime,
    pub deleted_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::api_users::Entity",
        from = "Column::UserEmail",
        to = "super::api_users::Column::Email"
    )]
    ApiUsers,
}

impl Related<super::api_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
