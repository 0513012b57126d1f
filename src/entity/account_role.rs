//! AccountRole entity - 账号角色关系表
//!
//! 复合主键 (account_id, role_id)，重复授权会触发冲突，由导入流程忽略。
//! 表名: lib_account_role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lib_account_role")]
pub struct Model {
    /// 账号ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: i64,

    /// 角色ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub role_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
