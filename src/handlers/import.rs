//! Account import handler
//!
//! `POST /api/import/:kind` runs one import job over a file already present on
//! the server and returns the job report.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use std::path::PathBuf;

use crate::entity::account::AccountKind;
use crate::error::{AppError, AppResult};
use crate::import::{run_import_job, ImportOptions, ImportResponse, LoggingObserver};
use crate::state::AppState;

/// Import request
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    /// Server-side path of the CSV or workbook file
    pub path: String,
    #[serde(rename = "batchSize")]
    pub batch_size: Option<usize>,
    #[serde(rename = "maxConcurrentBatches")]
    pub max_concurrent_batches: Option<usize>,
    #[serde(rename = "skipExisting")]
    pub skip_existing: Option<bool>,
}

impl ImportRequest {
    fn options(&self, state: &AppState, kind: AccountKind) -> ImportOptions {
        let mut options = ImportOptions::from_config(&state.config.import, kind);
        if let Some(size) = self.batch_size {
            options.batch_size = size;
        }
        if let Some(limit) = self.max_concurrent_batches {
            options.max_concurrent_batches = limit;
        }
        if let Some(skip) = self.skip_existing {
            options.skip_existing = skip;
        }
        options
    }
}

/// Import accounts of one kind from a tabular file
pub async fn import_accounts(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<ImportRequest>,
) -> AppResult<Json<ImportResponse>> {
    let kind = AccountKind::from_selector(&kind)
        .ok_or_else(|| AppError::BadRequest(format!("unknown import kind '{}'", kind)))?;

    if req.path.trim().is_empty() {
        return Err(AppError::BadRequest("path is required".to_string()));
    }

    let options = req.options(&state, kind);
    options.validate()?;

    let response = run_import_job(
        &state.db,
        PathBuf::from(req.path.trim()),
        options,
        &state.config.import,
        &LoggingObserver,
    )
    .await;

    Ok(Json(response))
}
