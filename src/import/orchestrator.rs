//! Import orchestrator
//!
//! Splits validated records into batches, runs batches in waves of bounded
//! size and aggregates per-row outcomes. Every statement goes through the
//! caller's connection, normally the job transaction; batches of a wave share
//! it and the connection serializes their statements while password hashing
//! runs on the blocking pool.

use chrono::Utc;
use futures::future::join_all;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use std::collections::HashSet;

use crate::config::ImportConfig;
use crate::entity::account::{self, AccountKind, STATUS_ACTIVE};
use crate::entity::{account_role, role};

use super::error::{ImportError, RowErrorKind};
use super::hierarchy::HierarchySnapshot;
use super::observer::BatchObserver;
use super::report::{BatchSummary, RowFailure};
use super::validator::{Placement, ValidRecord};

/// bcrypt cost bounds
const MIN_PASSWORD_COST: u32 = 4;
const MAX_PASSWORD_COST: u32 = 31;

#[derive(Clone, Debug)]
pub struct ImportOptions {
    pub kind: AccountKind,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    /// Count already-present handles as skipped instead of row errors
    pub skip_existing: bool,
    pub password_cost: u32,
    /// Role code granted to every created account
    pub baseline_role: String,
    pub loan_quota: i32,
}

impl ImportOptions {
    pub fn from_config(config: &ImportConfig, kind: AccountKind) -> Self {
        Self {
            kind,
            batch_size: config.batch_size,
            max_concurrent_batches: config.max_concurrent_batches,
            skip_existing: config.skip_existing,
            password_cost: config.password_cost,
            baseline_role: config.baseline_role.clone(),
            loan_quota: config.loan_quota.for_kind(kind),
        }
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.batch_size == 0 {
            return Err(ImportError::InvalidOptions("batch size must be at least 1".into()));
        }
        if self.max_concurrent_batches == 0 {
            return Err(ImportError::InvalidOptions(
                "max concurrent batches must be at least 1".into(),
            ));
        }
        if !(MIN_PASSWORD_COST..=MAX_PASSWORD_COST).contains(&self.password_cost) {
            return Err(ImportError::InvalidOptions(format!(
                "password cost {} outside {}..={}",
                self.password_cost, MIN_PASSWORD_COST, MAX_PASSWORD_COST
            )));
        }
        Ok(())
    }
}

/// Aggregated result of all batches
#[derive(Clone, Debug, Default)]
pub struct BatchTotals {
    pub imported: usize,
    pub skipped: usize,
    pub failures: Vec<RowFailure>,
    pub batches: Vec<BatchSummary>,
}

impl BatchTotals {
    fn absorb(&mut self, outcome: BatchOutcome) {
        self.imported += outcome.summary.imported;
        self.skipped += outcome.summary.skipped;
        self.failures.extend(outcome.failures);
        self.batches.push(outcome.summary);
    }
}

/// A record plus whether its handle already appeared earlier in the input
struct Candidate<'a> {
    record: &'a ValidRecord,
    repeated: bool,
}

struct BatchOutcome {
    summary: BatchSummary,
    failures: Vec<RowFailure>,
}

impl BatchOutcome {
    fn new(batch: usize, size: usize) -> Self {
        Self {
            summary: BatchSummary {
                batch,
                size,
                ..BatchSummary::default()
            },
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, kind: RowErrorKind, record: &ValidRecord, reason: String) {
        tracing::debug!(
            "Batch {} row {} ({}): {}",
            self.summary.batch,
            record.row,
            kind.label(),
            reason
        );
        self.failures.push(RowFailure::new(
            kind,
            self.summary.batch,
            record.row,
            record.account.clone(),
            reason,
        ));
        self.summary.failed += 1;
    }
}

/// Foreign keys of a new account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Links {
    class_id: Option<i64>,
    department_id: Option<i64>,
    work_department_id: Option<i64>,
}

fn placement_links(placement: &Placement, snapshot: &HierarchySnapshot) -> Result<Links, String> {
    match placement {
        Placement::Class(path) => Ok(Links {
            class_id: Some(snapshot.class_id(path.class_name())?),
            ..Links::default()
        }),
        Placement::Department(name) => Ok(Links {
            department_id: Some(snapshot.department_id(name)?),
            ..Links::default()
        }),
        Placement::WorkDepartment(name) => Ok(Links {
            work_department_id: Some(snapshot.work_department_id(name)?),
            ..Links::default()
        }),
    }
}

/// First occurrence of a handle is the import candidate, later ones repeat it
fn mark_repeats(records: &[ValidRecord]) -> Vec<Candidate<'_>> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|record| Candidate {
            record,
            repeated: !seen.insert(record.account.as_str()),
        })
        .collect()
}

async fn baseline_role_id<C: ConnectionTrait>(conn: &C, code: &str) -> Result<i64, ImportError> {
    role::Entity::find()
        .filter(role::Column::Code.eq(code))
        .one(conn)
        .await?
        .map(|r| r.id)
        .ok_or_else(|| ImportError::BaselineRoleMissing(code.to_string()))
}

/// Import `records` in batches.
///
/// Row-scoped problems end up in [`BatchTotals::failures`]. Any `Err` is
/// job-fatal: it is returned once the current wave has finished and the
/// caller must roll back.
pub async fn import_records<C: ConnectionTrait>(
    conn: &C,
    records: &[ValidRecord],
    snapshot: &HierarchySnapshot,
    options: &ImportOptions,
    observer: &dyn BatchObserver,
) -> Result<BatchTotals, ImportError> {
    options.validate()?;
    let role_id = baseline_role_id(conn, &options.baseline_role).await?;

    let candidates = mark_repeats(records);
    let batches: Vec<(usize, &[Candidate<'_>])> = candidates
        .chunks(options.batch_size)
        .enumerate()
        .map(|(i, chunk)| (i + 1, chunk))
        .collect();

    tracing::info!(
        "Importing {} {} records in {} batches, up to {} at a time",
        records.len(),
        options.kind.as_str(),
        batches.len(),
        options.max_concurrent_batches
    );

    let mut totals = BatchTotals::default();
    for wave in batches.chunks(options.max_concurrent_batches) {
        let results = join_all(
            wave.iter()
                .map(|(number, chunk)| run_batch(conn, *number, chunk, snapshot, options, role_id)),
        )
        .await;

        let mut fatal = None;
        for result in results {
            match result {
                Ok(outcome) => {
                    if fatal.is_none() {
                        if let Err(err) = observer.after_batch(&outcome.summary) {
                            fatal = Some(err);
                        }
                    }
                    totals.absorb(outcome);
                }
                Err(err) => {
                    tracing::error!("Batch failed: {}", err);
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                }
            }
        }

        if let Some(err) = fatal {
            return Err(err);
        }
    }

    Ok(totals)
}

async fn run_batch<C: ConnectionTrait>(
    conn: &C,
    number: usize,
    chunk: &[Candidate<'_>],
    snapshot: &HierarchySnapshot,
    options: &ImportOptions,
    role_id: i64,
) -> Result<BatchOutcome, ImportError> {
    let mut outcome = BatchOutcome::new(number, chunk.len());

    let handles: Vec<String> = chunk
        .iter()
        .filter(|c| !c.repeated)
        .map(|c| c.record.account.clone())
        .collect();
    let existing = existing_handles(conn, handles).await?;

    let mut pending: Vec<(&ValidRecord, Links)> = Vec::with_capacity(chunk.len());
    for candidate in chunk {
        let record = candidate.record;
        if candidate.repeated || existing.contains(&record.account) {
            let reason = if candidate.repeated {
                format!("account '{}' appears earlier in the file", record.account)
            } else {
                format!("account '{}' already exists", record.account)
            };
            if options.skip_existing {
                tracing::debug!("Batch {} row {}: skipped, {}", number, record.row, reason);
                outcome.summary.skipped += 1;
            } else {
                outcome.fail(RowErrorKind::DuplicateAccount, record, reason);
            }
            continue;
        }

        match placement_links(&record.placement, snapshot) {
            Ok(links) => pending.push((record, links)),
            Err(reason) => outcome.fail(RowErrorKind::Resolution, record, reason),
        }
    }

    if pending.is_empty() {
        return Ok(outcome);
    }

    let passwords: Vec<String> = pending.iter().map(|(r, _)| r.password.clone()).collect();
    let hashes = hash_passwords(passwords, options.password_cost).await?;

    let now = Utc::now().timestamp();
    let mut models = Vec::with_capacity(pending.len());
    let mut inserted = Vec::with_capacity(pending.len());
    for ((record, links), hash) in pending.into_iter().zip(hashes) {
        let password = match hash {
            Ok(h) => h,
            Err(e) => {
                outcome.fail(
                    RowErrorKind::Credential,
                    record,
                    format!("failed to hash password: {}", e),
                );
                continue;
            }
        };

        models.push(account::ActiveModel {
            username: Set(record.account.clone()),
            real_name: Set(record.real_name.clone()),
            password: Set(password),
            email: Set(record.email.clone()),
            kind: Set(options.kind.into()),
            class_id: Set(links.class_id),
            department_id: Set(links.department_id),
            work_department_id: Set(links.work_department_id),
            max_borrow: Set(options.loan_quota),
            borrowed: Set(0),
            status: Set(STATUS_ACTIVE),
            created_at: Set(now),
            ..Default::default()
        });
        inserted.push(record.account.clone());
    }

    if models.is_empty() {
        return Ok(outcome);
    }

    account::Entity::insert_many(models).exec_without_returning(conn).await?;

    let account_ids: Vec<i64> = account::Entity::find()
        .filter(account::Column::Username.is_in(inserted.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();
    if account_ids.len() != inserted.len() {
        return Err(ImportError::Internal(format!(
            "batch {}: inserted {} accounts but found {}",
            number,
            inserted.len(),
            account_ids.len()
        )));
    }

    let links = account_ids.iter().map(|&account_id| account_role::ActiveModel {
        account_id: Set(account_id),
        role_id: Set(role_id),
    });
    account_role::Entity::insert_many(links)
        .on_conflict(
            OnConflict::columns([account_role::Column::AccountId, account_role::Column::RoleId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    outcome.summary.imported = inserted.len();
    Ok(outcome)
}

async fn existing_handles<C: ConnectionTrait>(
    conn: &C,
    handles: Vec<String>,
) -> Result<HashSet<String>, ImportError> {
    if handles.is_empty() {
        return Ok(HashSet::new());
    }
    let rows = account::Entity::find()
        .filter(account::Column::Username.is_in(handles))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|a| a.username).collect())
}

async fn hash_passwords(
    passwords: Vec<String>,
    cost: u32,
) -> Result<Vec<Result<String, bcrypt::BcryptError>>, ImportError> {
    let hashes = tokio::task::spawn_blocking(move || -> Vec<Result<String, bcrypt::BcryptError>> {
        passwords.iter().map(|p| bcrypt::hash(p, cost)).collect()
    })
    .await?;
    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, HierarchyPolicy};
    use crate::db;
    use crate::import::hierarchy::{self, HierarchyDemand};
    use crate::import::observer::LoggingObserver;
    use crate::import::validator::parse_hierarchy_path;
    use sea_orm::{DatabaseConnection, PaginatorTrait};

    fn student(row: usize, account: &str, path: &str) -> ValidRecord {
        ValidRecord {
            row,
            account: account.to_string(),
            real_name: format!("Student {}", account),
            password: "123456".to_string(),
            email: None,
            placement: Placement::Class(parse_hierarchy_path(path, '-').unwrap()),
        }
    }

    fn options() -> ImportOptions {
        ImportOptions {
            password_cost: 4,
            ..ImportOptions::from_config(&ImportConfig::default(), AccountKind::Student)
        }
    }

    async fn setup(records: &[ValidRecord]) -> (DatabaseConnection, HierarchySnapshot) {
        let conn = db::init_database(&DatabaseConfig::sqlite_memory()).await.unwrap();
        let policy = HierarchyPolicy::default();
        let demand = HierarchyDemand::from_records(records);
        let snapshot = hierarchy::resolve(&conn, &demand, &policy).await.unwrap();
        (conn, snapshot)
    }

    #[test]
    fn test_mark_repeats_keeps_first() {
        let records = vec![student(2, "s1", "C1"), student(3, "s2", "C1"), student(4, "s1", "C2")];
        let flags: Vec<bool> = mark_repeats(&records).iter().map(|c| c.repeated).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn test_options_reject_zero_sizes() {
        let bad = ImportOptions {
            batch_size: 0,
            ..options()
        };
        assert!(matches!(bad.validate(), Err(ImportError::InvalidOptions(_))));

        let bad = ImportOptions {
            password_cost: 2,
            ..options()
        };
        assert!(bad.validate().is_err());
        assert!(options().validate().is_ok());
    }

    #[tokio::test]
    async fn test_accounts_get_placement_and_role() {
        let records = vec![student(2, "s1", "Eng-CS-C1")];
        let (conn, snapshot) = setup(&records).await;

        let totals = import_records(&conn, &records, &snapshot, &options(), &LoggingObserver)
            .await
            .unwrap();
        assert_eq!(totals.imported, 1);

        let saved = account::Entity::find()
            .filter(account::Column::Username.eq("s1"))
            .one(&conn)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.class_id, Some(snapshot.classes["C1"]));
        assert_eq!(saved.max_borrow, ImportConfig::default().loan_quota.student);
        assert!(bcrypt::verify("123456", &saved.password).unwrap());

        let reader = baseline_role_id(&conn, role::ROLE_READER).await.unwrap();
        let link = account_role::Entity::find_by_id((saved.id, reader)).one(&conn).await.unwrap();
        assert!(link.is_some());
    }

    #[tokio::test]
    async fn test_duplicates_are_errors_without_skip() {
        let records = vec![student(2, "s1", "C1"), student(3, "s1", "C1")];
        let (conn, snapshot) = setup(&records).await;
        let opts = ImportOptions {
            skip_existing: false,
            ..options()
        };

        let totals = import_records(&conn, &records, &snapshot, &opts, &LoggingObserver)
            .await
            .unwrap();

        assert_eq!(totals.imported, 1);
        assert_eq!(totals.skipped, 0);
        assert_eq!(totals.failures.len(), 1);
        assert_eq!(totals.failures[0].kind, RowErrorKind::DuplicateAccount);
        assert_eq!(totals.failures[0].row, 3);
        assert_eq!(account::Entity::find().count(&conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_class_is_row_error() {
        let records = vec![student(2, "s1", "Eng-CS-C1")];
        let (conn, snapshot) = setup(&records).await;
        let stray = vec![student(5, "s9", "Eng-CS-Missing")];

        let totals = import_records(&conn, &stray, &snapshot, &options(), &LoggingObserver)
            .await
            .unwrap();

        assert_eq!(totals.imported, 0);
        assert_eq!(totals.failures[0].kind, RowErrorKind::Resolution);
        assert_eq!(totals.failures[0].error, "class 'Missing' not found");
    }
}
