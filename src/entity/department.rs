//! Department entity - 院系表
//!
//! 组织树的根节点，专业 (major) 挂在院系下。
//! 表名: lib_department

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lib_department")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 院系名称 (唯一)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 专业与院系的关系通过 major.department_id 手动查询处理

impl ActiveModelBehavior for ActiveModel {}
