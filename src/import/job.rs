//! Import job driver
//!
//! Decode, validate, then inside one transaction resolve the hierarchy and
//! import all batches. The transaction commits only when every batch
//! finished without a job-fatal error.

use sea_orm::{DatabaseConnection, TransactionTrait};
use std::fmt;
use std::path::PathBuf;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ImportConfig;

use super::decoder::{decode_path, DecodedTable};
use super::error::ImportError;
use super::hierarchy::{self, HierarchyDemand};
use super::observer::BatchObserver;
use super::orchestrator::{import_records, ImportOptions};
use super::report::{ImportReport, ImportResponse, RowFailure};
use super::schema::RecordSchema;
use super::validator::validate;

/// Lifecycle of one import job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobPhase {
    Start,
    HierarchyResolved,
    Batching,
    Importing,
    Committed,
    RolledBack,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Start => "start",
            JobPhase::HierarchyResolved => "hierarchy-resolved",
            JobPhase::Batching => "batching",
            JobPhase::Importing => "importing",
            JobPhase::Committed => "committed",
            JobPhase::RolledBack => "rolled-back",
        };
        f.write_str(name)
    }
}

struct PhaseTracker {
    phase: JobPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        tracing::info!("Import job phase: {}", JobPhase::Start);
        Self { phase: JobPhase::Start }
    }

    fn advance(&mut self, next: JobPhase) {
        tracing::info!("Import job phase: {} -> {}", self.phase, next);
        self.phase = next;
    }
}

/// Fatal failure plus the row count known when it happened
struct JobFailure {
    total: usize,
    error: ImportError,
}

impl JobFailure {
    fn at(total: usize) -> impl FnOnce(ImportError) -> JobFailure {
        move |error| JobFailure { total, error }
    }
}

/// Run one import job end to end. Never fails: job-fatal errors become a
/// `success=false` response after rollback.
pub async fn run_import_job(
    db: &DatabaseConnection,
    path: PathBuf,
    options: ImportOptions,
    config: &ImportConfig,
    observer: &dyn BatchObserver,
) -> ImportResponse {
    let job_id = Uuid::new_v4();
    let span = tracing::info_span!("import_job", %job_id, kind = options.kind.as_str());

    async move {
        tracing::info!("Import job started for {}", path.display());
        let mut tracker = PhaseTracker::new();

        match execute(db, path, &options, config, observer, &mut tracker).await {
            Ok(report) => {
                tracker.advance(JobPhase::Committed);
                let response = ImportResponse::completed(report);
                tracing::info!("{}", response.message);
                response
            }
            Err(failure) => {
                tracker.advance(JobPhase::RolledBack);
                tracing::error!("Import job failed: {}", failure.error);
                ImportResponse::failed(failure.total, &failure.error)
            }
        }
    }
    .instrument(span)
    .await
}

async fn execute(
    db: &DatabaseConnection,
    path: PathBuf,
    options: &ImportOptions,
    config: &ImportConfig,
    observer: &dyn BatchObserver,
    tracker: &mut PhaseTracker,
) -> Result<ImportReport, JobFailure> {
    options.validate().map_err(JobFailure::at(0))?;

    let schema = RecordSchema::for_kind(options.kind, config.default_password.clone());
    let table = decode(path, &schema).await.map_err(JobFailure::at(0))?;
    let total = table.len();

    let outcome = validate(&table, &schema);
    tracing::info!(
        "Decoded {} rows: {} valid, {} rejected",
        total,
        outcome.valid_records.len(),
        outcome.row_errors.len()
    );

    let txn = db.begin().await.map_err(|e| JobFailure::at(total)(e.into()))?;

    let imported = async {
        let demand = HierarchyDemand::from_records(&outcome.valid_records);
        let snapshot = hierarchy::resolve(&txn, &demand, &config.hierarchy).await?;
        tracker.advance(JobPhase::HierarchyResolved);

        tracker.advance(JobPhase::Batching);
        tracing::info!(
            "{} records in batches of {}",
            outcome.valid_records.len(),
            options.batch_size
        );

        tracker.advance(JobPhase::Importing);
        import_records(&txn, &outcome.valid_records, &snapshot, options, observer).await
    }
    .await;

    let totals = match imported {
        Ok(totals) => {
            txn.commit().await.map_err(|e| JobFailure::at(total)(e.into()))?;
            totals
        }
        Err(error) => {
            if let Err(e) = txn.rollback().await {
                tracing::error!("Rollback failed: {}", e);
            }
            return Err(JobFailure { total, error });
        }
    };

    let mut errors: Vec<RowFailure> =
        outcome.row_errors.into_iter().map(RowFailure::from).collect();
    errors.extend(totals.failures);

    Ok(ImportReport {
        total,
        imported: totals.imported,
        skipped: totals.skipped,
        errors,
        batches: totals.batches,
    })
}

async fn decode(path: PathBuf, schema: &RecordSchema) -> Result<DecodedTable, ImportError> {
    let options = schema.decode_options();
    let table = tokio::task::spawn_blocking(move || decode_path(&path, &options)).await??;
    Ok(table)
}
