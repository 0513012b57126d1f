//! Import error taxonomy
//!
//! Job-fatal failures are [`ImportError`] values and abort the transaction.
//! Row-scoped failures never become an `ImportError`; they are collected as
//! [`RowErrorKind`]-tagged entries in the job report.

use serde::Serialize;
use thiserror::Error;

/// Failure to turn a source file into rows. Always fatal, raised before any
/// hierarchy resolution happens.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Workbook has no sheets")]
    EmptyWorkbook,

    #[error("No header row found")]
    NoHeaderFound,
}

impl From<calamine::Error> for DecodeError {
    fn from(err: calamine::Error) -> Self {
        DecodeError::Workbook(err.to_string())
    }
}

/// Errors that invalidate the whole import job.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Baseline role '{0}' does not exist")]
    BaselineRoleMissing(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sea_orm::DbErr),

    #[error("Invalid import options: {0}")]
    InvalidOptions(String),

    #[error("Import aborted: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::Internal(format!("background task failed: {}", err))
    }
}

/// Category of a row-scoped failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    /// Missing or malformed field
    Validation,
    /// Hierarchy entity could not be resolved or created
    Resolution,
    /// Handle already taken (in the store or earlier in the same file)
    DuplicateAccount,
    /// Credential could not be hashed
    Credential,
}

impl RowErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            RowErrorKind::Validation => "validation",
            RowErrorKind::Resolution => "resolution",
            RowErrorKind::DuplicateAccount => "duplicate",
            RowErrorKind::Credential => "credential",
        }
    }
}
