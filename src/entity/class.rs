//! Class entity - 班级表
//!
//! 学术层级的叶子节点。
//! 表名: lib_class

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lib_class")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 班级名称 (唯一)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,

    /// 所属专业ID
    pub major_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
