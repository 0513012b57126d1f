//! Import column schemas per account kind

use crate::entity::account::{self, AccountKind};
use crate::entity::NAME_MAX_LEN;

use super::decoder::DecodeOptions;

/// Logical field an import column maps to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Account,
    Name,
    Password,
    Email,
    /// Composite "department-major-class" path
    Class,
    Department,
    WorkDepartment,
}

impl Field {
    /// Header names accepted for this field, compared case-insensitively
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Account => &["account", "username", "账号", "学号", "工号"],
            Field::Name => &["name", "real_name", "姓名"],
            Field::Password => &["password", "密码"],
            Field::Email => &["email", "邮箱"],
            Field::Class => &["class", "班级"],
            Field::Department => &["department", "院系", "部门"],
            Field::WorkDepartment => &["work_department", "work department", "工作部门"],
        }
    }

    /// Name used in row error messages
    pub fn label(&self) -> &'static str {
        self.aliases()[0]
    }

    /// Widest value the backing column stores, in characters. The class path
    /// is checked per segment instead.
    pub fn max_len(&self) -> Option<usize> {
        match self {
            Field::Account => Some(account::USERNAME_MAX_LEN),
            Field::Name => Some(account::REAL_NAME_MAX_LEN),
            Field::Email => Some(account::EMAIL_MAX_LEN),
            Field::Department | Field::WorkDepartment => Some(NAME_MAX_LEN),
            Field::Password | Field::Class => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnSpec {
    pub field: Field,
    pub required: bool,
    /// Checked with the email shape rule when non-empty
    pub email: bool,
    pub max_len: Option<usize>,
}

impl ColumnSpec {
    fn required(field: Field) -> Self {
        Self {
            field,
            required: true,
            email: false,
            max_len: field.max_len(),
        }
    }

    fn optional(field: Field) -> Self {
        Self {
            field,
            required: false,
            email: false,
            max_len: field.max_len(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecordSchema {
    pub kind: AccountKind,
    pub columns: Vec<ColumnSpec>,
    /// Separator of the composite hierarchy path column
    pub path_separator: char,
    /// Credential applied when the password column is absent or blank
    pub default_password: String,
}

impl RecordSchema {
    pub fn for_kind(kind: AccountKind, default_password: impl Into<String>) -> Self {
        let placement = match kind {
            AccountKind::Student => Field::Class,
            AccountKind::Teacher => Field::Department,
            AccountKind::TempWorker => Field::WorkDepartment,
        };

        let columns = vec![
            ColumnSpec::required(Field::Account),
            ColumnSpec::required(Field::Name),
            ColumnSpec::required(placement),
            ColumnSpec::optional(Field::Password),
            ColumnSpec {
                email: true,
                ..ColumnSpec::optional(Field::Email)
            },
        ];

        Self {
            kind,
            columns,
            path_separator: '-',
            default_password: default_password.into(),
        }
    }

    /// Decoder options that recognise this schema's header even when the
    /// template comment-marks it
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            header_hints: self
                .columns
                .iter()
                .flat_map(|c| c.field.aliases().iter().map(|a| a.to_string()))
                .collect(),
            ..DecodeOptions::default()
        }
    }

    /// Find the decoded header that carries `field`, if any
    pub fn header_for<'a>(&self, field: Field, headers: &'a [String]) -> Option<&'a str> {
        headers
            .iter()
            .find(|h| {
                field
                    .aliases()
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(h.trim()))
            })
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_schema_requires_class() {
        let schema = RecordSchema::for_kind(AccountKind::Student, "123456");
        let required: Vec<Field> = schema
            .columns
            .iter()
            .filter(|c| c.required)
            .map(|c| c.field)
            .collect();
        assert_eq!(required, vec![Field::Account, Field::Name, Field::Class]);
    }

    #[test]
    fn test_header_lookup_uses_aliases() {
        let schema = RecordSchema::for_kind(AccountKind::Teacher, "123456");
        let headers = vec!["工号".to_string(), "Name".to_string(), "院系".to_string()];
        assert_eq!(schema.header_for(Field::Account, &headers), Some("工号"));
        assert_eq!(schema.header_for(Field::Name, &headers), Some("Name"));
        assert_eq!(schema.header_for(Field::Department, &headers), Some("院系"));
        assert_eq!(schema.header_for(Field::Email, &headers), None);
    }

    #[test]
    fn test_decode_hints_cover_all_columns() {
        let schema = RecordSchema::for_kind(AccountKind::TempWorker, "x");
        let hints = schema.decode_options().header_hints;
        assert!(hints.contains(&"account".to_string()));
        assert!(hints.contains(&"工作部门".to_string()));
    }
}
