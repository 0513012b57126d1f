//! WorkDepartment entity - 工作部门表
//!
//! 非教学人员 (临时工) 使用的扁平层级。
//! 表名: lib_work_department

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lib_work_department")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 部门名称 (唯一)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
