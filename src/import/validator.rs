//! Record validation
//!
//! Splits decoded rows into typed [`ValidRecord`]s and row-scoped
//! [`RowError`]s. Every row ends up in exactly one of the two buckets.

use crate::entity::account::AccountKind;
use crate::entity::NAME_MAX_LEN;

use super::decoder::{DecodedTable, RawRow};
use super::schema::{Field, RecordSchema};

/// Fragments that mark a path segment as an institutional unit (department)
/// rather than a major
const UNIT_KEYWORDS: &[&str] = &[
    "学院",
    "院",
    "系",
    "部",
    "school",
    "college",
    "faculty",
    "department",
    "dept",
    "institute",
];

/// Which ancestor a two-segment path names
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentKind {
    Department,
    Major,
}

/// Decomposed "department-major-class" path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HierarchyPath {
    Qualified {
        department: String,
        major: String,
        class: String,
    },
    PartiallyQualified {
        parent: ParentKind,
        parent_name: String,
        class: String,
    },
    BareClass {
        class: String,
    },
}

impl HierarchyPath {
    pub fn class_name(&self) -> &str {
        match self {
            HierarchyPath::Qualified { class, .. }
            | HierarchyPath::PartiallyQualified { class, .. }
            | HierarchyPath::BareClass { class } => class,
        }
    }

    pub fn department(&self) -> Option<&str> {
        match self {
            HierarchyPath::Qualified { department, .. } => Some(department),
            HierarchyPath::PartiallyQualified {
                parent: ParentKind::Department,
                parent_name,
                ..
            } => Some(parent_name),
            _ => None,
        }
    }

    /// Every name in the path, outermost first
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.department()
            .into_iter()
            .chain(self.major())
            .chain(std::iter::once(self.class_name()))
    }

    pub fn major(&self) -> Option<&str> {
        match self {
            HierarchyPath::Qualified { major, .. } => Some(major),
            HierarchyPath::PartiallyQualified {
                parent: ParentKind::Major,
                parent_name,
                ..
            } => Some(parent_name),
            _ => None,
        }
    }
}

/// Split a hierarchy path on `separator`.
///
/// Three or more segments are department, major and the rest rejoined as the
/// class. Two segments are a guess: the first is a department when it
/// contains an institutional-unit keyword, a major otherwise. One segment is a
/// bare class. Returns `None` when no non-empty segment is left.
pub fn parse_hierarchy_path(raw: &str, separator: char) -> Option<HierarchyPath> {
    let segments: Vec<&str> = raw
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        [] => None,
        [class] => Some(HierarchyPath::BareClass {
            class: class.to_string(),
        }),
        [parent, class] => {
            let parent_kind = if looks_like_unit(parent) {
                ParentKind::Department
            } else {
                ParentKind::Major
            };
            Some(HierarchyPath::PartiallyQualified {
                parent: parent_kind,
                parent_name: parent.to_string(),
                class: class.to_string(),
            })
        }
        [department, major, rest @ ..] => Some(HierarchyPath::Qualified {
            department: department.to_string(),
            major: major.to_string(),
            class: rest.join(&separator.to_string()),
        }),
    }
}

fn looks_like_unit(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    UNIT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// `local@domain.tld` shape check, not RFC validation
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty())
}

/// Where an account hangs in the organisation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    Class(HierarchyPath),
    Department(String),
    WorkDepartment(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidRecord {
    /// 1-based source row
    pub row: usize,
    pub account: String,
    pub real_name: String,
    /// Plain credential, hashed by the orchestrator
    pub password: String,
    pub email: Option<String>,
    pub placement: Placement,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    /// Handle of the row when it had one
    pub account: Option<String>,
    pub reasons: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ValidationOutcome {
    pub valid_records: Vec<ValidRecord>,
    pub row_errors: Vec<RowError>,
    pub valid: bool,
}

/// Validate every decoded row against `schema`
pub fn validate(table: &DecodedTable, schema: &RecordSchema) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for raw in table.iter() {
        match validate_row(raw, &table.headers, schema) {
            Ok(record) => outcome.valid_records.push(record),
            Err(err) => outcome.row_errors.push(err),
        }
    }

    outcome.valid = outcome.row_errors.is_empty();
    if !outcome.valid {
        tracing::info!(
            "Validation rejected {} of {} rows",
            outcome.row_errors.len(),
            table.len()
        );
    }
    outcome
}

fn validate_row(
    raw: &RawRow,
    headers: &[String],
    schema: &RecordSchema,
) -> Result<ValidRecord, RowError> {
    let value_of = |field: Field| -> Option<String> {
        schema
            .header_for(field, headers)
            .and_then(|h| raw.get(h))
            .map(|cell| cell.as_text())
            .filter(|s| !s.is_empty())
    };

    let mut reasons = Vec::new();

    for column in &schema.columns {
        let value = value_of(column.field);
        if column.required && value.is_none() {
            reasons.push(format!("missing required field '{}'", column.field.label()));
        }
        let Some(v) = &value else {
            continue;
        };
        if let Some(max) = column.max_len {
            if v.chars().count() > max {
                reasons.push(format!(
                    "field '{}' longer than {} characters",
                    column.field.label(),
                    max
                ));
            }
        }
        if column.email && !is_valid_email(v) {
            reasons.push(format!("invalid email '{}'", v));
        }
    }

    let account = value_of(Field::Account);

    let placement = match schema.kind {
        AccountKind::Student => value_of(Field::Class).and_then(|raw_path| {
            let parsed = parse_hierarchy_path(&raw_path, schema.path_separator);
            match &parsed {
                None => reasons.push(format!("class path '{}' has no class name", raw_path)),
                Some(path) => {
                    for segment in path.segments() {
                        if segment.chars().count() > NAME_MAX_LEN {
                            reasons.push(format!(
                                "class path segment '{}' longer than {} characters",
                                segment, NAME_MAX_LEN
                            ));
                        }
                    }
                }
            }
            parsed.map(Placement::Class)
        }),
        AccountKind::Teacher => value_of(Field::Department).map(Placement::Department),
        AccountKind::TempWorker => {
            value_of(Field::WorkDepartment).map(Placement::WorkDepartment)
        }
    };

    match (reasons.is_empty(), account, value_of(Field::Name), placement) {
        (true, Some(account), Some(real_name), Some(placement)) => Ok(ValidRecord {
            row: raw.row,
            account,
            real_name,
            password: value_of(Field::Password).unwrap_or_else(|| schema.default_password.clone()),
            email: value_of(Field::Email),
            placement,
        }),
        (_, account, _, _) => Err(RowError {
            row: raw.row,
            account,
            reasons,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::decoder::{decode_delimited, DecodeOptions};

    fn table(csv: &str) -> DecodedTable {
        decode_delimited(csv.as_bytes(), &DecodeOptions::default()).unwrap()
    }

    #[test]
    fn test_path_three_segments_and_more() {
        assert_eq!(
            parse_hierarchy_path("Eng-CS-C1", '-'),
            Some(HierarchyPath::Qualified {
                department: "Eng".into(),
                major: "CS".into(),
                class: "C1".into(),
            })
        );
        let path = parse_hierarchy_path("Eng - CS - 2021 - A", '-').unwrap();
        assert_eq!(path.class_name(), "2021-A");
        assert_eq!(path.department(), Some("Eng"));
    }

    #[test]
    fn test_path_two_segments_uses_unit_keyword() {
        let dept = parse_hierarchy_path("计算机学院-1班", '-').unwrap();
        assert_eq!(dept.department(), Some("计算机学院"));
        assert_eq!(dept.major(), None);

        let dept = parse_hierarchy_path("School of Law-L1", '-').unwrap();
        assert_eq!(dept.department(), Some("School of Law"));

        let major = parse_hierarchy_path("CS-C1", '-').unwrap();
        assert_eq!(major.major(), Some("CS"));
        assert_eq!(major.department(), None);
    }

    #[test]
    fn test_path_single_and_empty() {
        assert_eq!(
            parse_hierarchy_path(" C9 ", '-'),
            Some(HierarchyPath::BareClass { class: "C9".into() })
        );
        assert_eq!(parse_hierarchy_path("--", '-'), None);
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("a.b@lib.example.org"));
        assert!(!is_valid_email("no-at.example.org"));
        assert!(!is_valid_email("@example.org"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a@b@c.d"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email("a@c..d"));
    }

    #[test]
    fn test_collects_all_reasons_per_row() {
        let input = "\
account,name,class,email
s1,Alice,Eng-CS-C1,alice@uni.edu
s2,,,bad-email
s3,Carol,C2,
";
        let schema = RecordSchema::for_kind(AccountKind::Student, "123456");
        let outcome = validate(&table(input), &schema);

        assert!(!outcome.valid);
        assert_eq!(outcome.valid_records.len(), 2);
        assert_eq!(outcome.row_errors.len(), 1);

        let err = &outcome.row_errors[0];
        assert_eq!(err.row, 3);
        assert_eq!(err.account.as_deref(), Some("s2"));
        assert_eq!(
            err.reasons,
            vec![
                "missing required field 'name'".to_string(),
                "missing required field 'class'".to_string(),
                "invalid email 'bad-email'".to_string(),
            ]
        );
        assert_eq!(
            outcome.valid_records[1].placement,
            Placement::Class(HierarchyPath::BareClass { class: "C2".into() })
        );
    }

    #[test]
    fn test_values_wider_than_columns_are_row_errors() {
        let long_handle = "s".repeat(33);
        let long_class = "C".repeat(65);
        let input = format!(
            "account,name,class\n{},Alice,Eng-CS-C1\ns2,Bob,Eng-CS-{}\ns3,Carol,Eng-CS-C1\n",
            long_handle, long_class
        );
        let schema = RecordSchema::for_kind(AccountKind::Student, "123456");
        let outcome = validate(&table(&input), &schema);

        assert_eq!(outcome.valid_records.len(), 1);
        assert_eq!(outcome.valid_records[0].account, "s3");
        assert_eq!(
            outcome.row_errors[0].reasons,
            vec!["field 'account' longer than 32 characters".to_string()]
        );
        assert_eq!(
            outcome.row_errors[1].reasons,
            vec![format!("class path segment '{}' longer than 64 characters", long_class)]
        );

        // Width is counted in characters, not bytes
        let name = "张".repeat(64);
        let input = format!("account,name,department\nt1,{},物理系\n", name);
        let schema = RecordSchema::for_kind(AccountKind::Teacher, "123456");
        assert!(validate(&table(&input), &schema).valid);
    }

    #[test]
    fn test_default_password_applied() {
        let input = "account,name,department\nt1,Teacher,Physics Dept\n";
        let schema = RecordSchema::for_kind(AccountKind::Teacher, "changeme");
        let outcome = validate(&table(input), &schema);

        assert!(outcome.valid);
        let record = &outcome.valid_records[0];
        assert_eq!(record.password, "changeme");
        assert_eq!(record.email, None);
        assert_eq!(record.placement, Placement::Department("Physics Dept".into()));
    }

    #[test]
    fn test_missing_column_reported_on_every_row() {
        let input = "account,name\nw1,Worker One\nw2,Worker Two\n";
        let schema = RecordSchema::for_kind(AccountKind::TempWorker, "123456");
        let outcome = validate(&table(input), &schema);

        assert_eq!(outcome.valid_records.len(), 0);
        assert_eq!(outcome.row_errors.len(), 2);
        assert!(outcome
            .row_errors
            .iter()
            .all(|e| e.reasons == vec!["missing required field 'work_department'".to_string()]));
    }
}
