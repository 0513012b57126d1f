//! Major entity - 专业表
//!
//! 表名: lib_major

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lib_major")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 专业名称 (唯一)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,

    /// 所属院系ID
    pub department_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
