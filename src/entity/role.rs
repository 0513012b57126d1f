//! Role entity - 角色表
//!
//! 表名: lib_role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 管理员角色代码
pub const ROLE_ADMIN: &str = "admin";
/// 读者角色代码 (导入账号的基础角色)
pub const ROLE_READER: &str = "reader";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lib_role")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 角色代码 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub code: String,

    /// 角色显示名称
    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
