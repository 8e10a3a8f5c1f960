use crate::domain::error::{AppError, Result};
use crate::infrastructure::db::connection::connect_pool;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

mod compliance;
mod entities;
mod integration_logs;
mod projects;
mod requirements;
mod test_cases;

/// Access to every table of the test generation database. The schema must
/// already be in place (see `init_testgen_db`).
#[derive(Clone)]
pub struct TestGenRepository {
    pool: SqlitePool,
}

impl TestGenRepository {
    pub async fn connect(db_path: &Path) -> Result<Self> {
        let pool = connect_pool(db_path)
            .await
            .map_err(AppError::StorageFailure)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(super) fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}

#[cfg(test)]
pub(crate) async fn test_repository() -> (tempfile::TempDir, TestGenRepository) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testgen.db");
    crate::infrastructure::db::connection::init_testgen_db(&path)
        .await
        .unwrap();
    let repo = TestGenRepository::connect(&path).await.unwrap();
    (dir, repo)
}
