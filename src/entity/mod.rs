//! Entity module - SeaORM 实体定义
//!
//! 包含组织层级 (院系/专业/班级/工作部门)、账号与角色对应的实体模型

pub mod account;
pub mod account_role;
pub mod class;
pub mod department;
pub mod major;
pub mod role;
pub mod work_department;

/// 院系/专业/班级/工作部门名称长度上限
pub const NAME_MAX_LEN: usize = 64;
