//! Batch completion hook

use super::error::ImportError;
use super::report::BatchSummary;

/// Called by the orchestrator after every finished batch.
///
/// Returning an error aborts the job and rolls the transaction back.
pub trait BatchObserver: Send + Sync {
    fn after_batch(&self, summary: &BatchSummary) -> Result<(), ImportError>;
}

/// Logs batch progress
#[derive(Default)]
pub struct LoggingObserver;

impl BatchObserver for LoggingObserver {
    fn after_batch(&self, summary: &BatchSummary) -> Result<(), ImportError> {
        tracing::info!(
            "Batch {} done: {} rows, {} imported, {} skipped, {} failed",
            summary.batch,
            summary.size,
            summary.imported,
            summary.skipped,
            summary.failed
        );
        Ok(())
    }
}
