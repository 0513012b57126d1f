#![allow(dead_code)]

use sea_orm::DatabaseConnection;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

use libraryd::config::{DatabaseConfig, ImportConfig};
use libraryd::db;
use libraryd::entity::account::AccountKind;
use libraryd::import::{BatchObserver, BatchSummary, ImportError, ImportOptions};

/// bcrypt cost low enough to keep tests fast
pub const TEST_COST: u32 = 4;

pub async fn memory_db() -> DatabaseConnection {
    tokio_test::assert_ok!(db::init_database(&DatabaseConfig::sqlite_memory()).await)
}

pub fn import_config() -> ImportConfig {
    ImportConfig {
        password_cost: TEST_COST,
        ..ImportConfig::default()
    }
}

pub fn options(config: &ImportConfig, kind: AccountKind, batch_size: usize) -> ImportOptions {
    ImportOptions {
        batch_size,
        ..ImportOptions::from_config(config, kind)
    }
}

/// Write `content` to a temporary file with the given extension
pub fn fixture(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("import-")
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Student CSV with `count` rows all placed under `path`
pub fn student_csv(count: usize, path: &str) -> String {
    let mut csv = String::from("account,name,class\n");
    for i in 1..=count {
        csv.push_str(&format!("s{:04},Student {},{}\n", i, i, path));
    }
    csv
}

/// Fails the job once `limit` batches have completed
pub struct FailAfter {
    limit: usize,
    seen: AtomicUsize,
}

impl FailAfter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            seen: AtomicUsize::new(0),
        }
    }

    pub fn seen(&self) -> usize {
        self.seen.load(Ordering::SeqCst)
    }
}

impl BatchObserver for FailAfter {
    fn after_batch(&self, summary: &BatchSummary) -> Result<(), ImportError> {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen >= self.limit {
            return Err(ImportError::Internal(format!(
                "injected failure after batch {}",
                summary.batch
            )));
        }
        Ok(())
    }
}
