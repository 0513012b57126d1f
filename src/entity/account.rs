//! Account entity - 读者账号表
//!
//! 表名: lib_account

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 账号类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountKind {
    /// 学生 (关联班级)
    Student = 1,
    /// 教师 (关联院系)
    Teacher = 2,
    /// 临时工 (关联工作部门)
    TempWorker = 3,
}

impl AccountKind {
    /// Parse the `kind` selector used by the import endpoint.
    pub fn from_selector(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" | "students" => Some(AccountKind::Student),
            "teacher" | "teachers" => Some(AccountKind::Teacher),
            "temp-worker" | "temp_worker" | "tempworker" | "temp" => Some(AccountKind::TempWorker),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Student => "student",
            AccountKind::Teacher => "teacher",
            AccountKind::TempWorker => "temp-worker",
        }
    }
}

impl From<AccountKind> for i32 {
    fn from(kind: AccountKind) -> Self {
        kind as i32
    }
}

/// 账号状态: 正常
pub const STATUS_ACTIVE: i32 = 1;

/// 字段长度上限 (与列定义一致)
pub const USERNAME_MAX_LEN: usize = 32;
pub const REAL_NAME_MAX_LEN: usize = 64;
pub const EMAIL_MAX_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lib_account")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 登录账号 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub username: String,

    /// 真实姓名
    #[sea_orm(column_type = "String(Some(64))")]
    pub real_name: String,

    /// 密码 (bcrypt 哈希)
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing)]
    pub password: String,

    /// 邮箱
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub email: Option<String>,

    /// 账号类型: 1=学生, 2=教师, 3=临时工
    pub kind: i32,

    /// 班级ID (学生)
    #[sea_orm(nullable)]
    pub class_id: Option<i64>,

    /// 院系ID (教师)
    #[sea_orm(nullable)]
    pub department_id: Option<i64>,

    /// 工作部门ID (临时工)
    #[sea_orm(nullable)]
    pub work_department_id: Option<i64>,

    /// 最大借阅数量
    pub max_borrow: i32,

    /// 当前借阅数量
    pub borrowed: i32,

    /// 账号状态: 1=正常
    pub status: i32,

    /// 创建时间 (Unix 时间戳)
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 角色通过 account_role 表手动查询处理

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_selector() {
        assert_eq!(AccountKind::from_selector("student"), Some(AccountKind::Student));
        assert_eq!(AccountKind::from_selector(" Teacher "), Some(AccountKind::Teacher));
        assert_eq!(AccountKind::from_selector("temp-worker"), Some(AccountKind::TempWorker));
        assert_eq!(AccountKind::from_selector("librarian"), None);
    }

    #[test]
    fn test_kind_column_value() {
        assert_eq!(i32::from(AccountKind::Student), 1);
        assert_eq!(i32::from(AccountKind::TempWorker), 3);
    }
}
