//! # 门户用户实体定义
//!
//! 开发者账户表的 Sea-ORM 实体模型，软删除语义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 门户用户实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "api_users")]
pub struct Model {
    /// 邮箱即身份
    #[sea_orm(primary_key, auto_increment = false)]
    pub email: String,
    pub name: String,
    /// bcrypt 哈希
    pub password: String,
    pub admin: bool,
    pub active: bool,
    /// JSON 序列化的自由档案字段
    pub profile: String,
    pub created_at: DateTime,
    pub last_login: Option<DateTime>,
    pub deleted_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::api_keys::Entity")]
    ApiKeys,
}

impl Related<super::api_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKeys.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
