//! Import job report and response envelope

use serde::Serialize;

use super::error::{ImportError, RowErrorKind};
use super::validator::RowError;

/// Batch number used for rows rejected before batching
pub const VALIDATION_BATCH: usize = 0;

/// One row that was not imported
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub account: String,
    pub error: String,
    /// 1-based batch number, 0 for validation failures
    pub batch: usize,
    /// 1-based source row
    pub row: usize,
    pub kind: RowErrorKind,
}

impl RowFailure {
    pub fn new(
        kind: RowErrorKind,
        batch: usize,
        row: usize,
        account: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            error: error.into(),
            batch,
            row,
            kind,
        }
    }
}

impl From<RowError> for RowFailure {
    fn from(err: RowError) -> Self {
        RowFailure::new(
            RowErrorKind::Validation,
            VALIDATION_BATCH,
            err.row,
            err.account.unwrap_or_default(),
            err.reasons.join("; "),
        )
    }
}

/// Per-batch counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch: usize,
    pub size: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<RowFailure>,
    pub batches: Vec<BatchSummary>,
}

impl ImportReport {
    /// Order errors by (batch, row) and batches by number so the report does
    /// not depend on completion order inside a wave
    pub fn sorted(mut self) -> Self {
        self.errors.sort_by_key(|e| (e.batch, e.row));
        self.batches.sort_by_key(|b| b.batch);
        self
    }

    /// Distinct rows that ended up as errors
    pub fn failed_rows(&self) -> usize {
        self.errors.len()
    }
}

/// JSON envelope returned by the import endpoint
#[derive(Clone, Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub data: ImportReport,
}

impl ImportResponse {
    pub fn completed(report: ImportReport) -> Self {
        let report = report.sorted();
        let message = format!(
            "Imported {} of {} records ({} skipped, {} failed)",
            report.imported,
            report.total,
            report.skipped,
            report.failed_rows()
        );
        Self {
            success: true,
            message,
            data: report,
        }
    }

    /// Job-fatal outcome: everything was rolled back, only `total` survives
    pub fn failed(total: usize, err: &ImportError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: ImportReport {
                total,
                ..ImportReport::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::error::DecodeError;

    #[test]
    fn test_validation_error_becomes_batch_zero() {
        let failure: RowFailure = RowError {
            row: 4,
            account: None,
            reasons: vec!["missing required field 'account'".into(), "invalid email 'x'".into()],
        }
        .into();

        assert_eq!(failure.batch, VALIDATION_BATCH);
        assert_eq!(failure.account, "");
        assert_eq!(failure.error, "missing required field 'account'; invalid email 'x'");
    }

    #[test]
    fn test_completed_sorts_errors() {
        let report = ImportReport {
            total: 5,
            imported: 2,
            skipped: 0,
            errors: vec![
                RowFailure::new(RowErrorKind::Resolution, 2, 9, "c", "x"),
                RowFailure::new(RowErrorKind::DuplicateAccount, 1, 7, "b", "x"),
                RowFailure::new(RowErrorKind::Validation, 0, 3, "a", "x"),
            ],
            batches: vec![],
        };

        let response = ImportResponse::completed(report);
        let order: Vec<&str> = response.data.errors.iter().map(|e| e.account.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(response.message, "Imported 2 of 5 records (0 skipped, 3 failed)");
    }

    #[test]
    fn test_failed_envelope_shape() {
        let response = ImportResponse::failed(12, &DecodeError::NoHeaderFound.into());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Decode error: No header row found");
        assert_eq!(json["data"]["total"], 12);
        assert_eq!(json["data"]["imported"], 0);
        assert_eq!(json["data"]["errors"].as_array().unwrap().len(), 0);
    }
}
