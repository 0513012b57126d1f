//! Batch account import
//!
//! Pipeline: decoder → validator → hierarchy resolver → orchestrator, driven
//! by [`job::run_import_job`].

pub mod decoder;
pub mod error;
pub mod hierarchy;
pub mod job;
pub mod observer;
pub mod orchestrator;
pub mod report;
pub mod schema;
pub mod validator;

pub use error::{DecodeError, ImportError, RowErrorKind};
pub use job::{run_import_job, JobPhase};
pub use observer::{BatchObserver, LoggingObserver};
pub use orchestrator::{import_records, BatchTotals, ImportOptions};
pub use report::{BatchSummary, ImportReport, ImportResponse, RowFailure};
