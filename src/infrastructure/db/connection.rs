use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const TESTGEN_SCHEMA: &str = include_str!("../../resources/schema.sql");

const TESTGEN_SCHEMA_VERSION: i32 = 1;

/// Creates the database if missing and applies the schema additively.
pub async fn init_testgen_db(db_path: &Path) -> Result<(), String> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create database directory: {e}"))?;
        }
    }

    let pool = connect_pool(db_path).await?;

    let current_version = read_user_version(&pool).await?;
    if current_version > TESTGEN_SCHEMA_VERSION {
        return Err(format!(
            "Database schema too new: db user_version={} > app supported_version={}",
            current_version, TESTGEN_SCHEMA_VERSION
        ));
    }

    apply_schema(&pool).await?;
    set_user_version(&pool, TESTGEN_SCHEMA_VERSION).await?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| format!("Database health check failed: {e}"))?;

    pool.close().await;
    Ok(())
}

pub(crate) fn db_path_to_url(db_path: &Path) -> Result<String, String> {
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| "Database path is not valid UTF-8".to_string())?;
    Ok(format!("sqlite://{}", db_path_str.replace("\\", "/")))
}

pub(crate) async fn connect_pool(db_path: &Path) -> Result<SqlitePool, String> {
    let db_url = db_path_to_url(db_path)?;
    let options = SqliteConnectOptions::from_str(&db_url)
        .map_err(|e| format!("Failed to parse database URL: {e}"))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), String> {
    for statement in TESTGEN_SCHEMA.split(';') {
        let sql = statement.trim();
        if sql.is_empty() {
            continue;
        }
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| format!("Failed to apply schema statement: {e}"))?;
    }

    // Columns added after the first release.
    ensure_column(pool, "test_cases", "status", "TEXT NOT NULL DEFAULT 'draft'").await?;
    Ok(())
}

async fn ensure_column(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<(), String> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await
        .map_err(|e| format!("Failed to inspect {table} schema: {e}"))?;

    let mut exists = false;
    for row in rows {
        let name: String = row
            .try_get("name")
            .map_err(|e| format!("Failed to read {table} schema: {e}"))?;
        if name == column {
            exists = true;
            break;
        }
    }

    if !exists {
        sqlx::query(&format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column, definition
        ))
        .execute(pool)
        .await
        .map_err(|e| format!("Failed to add {column} column to {table}: {e}"))?;
    }
    Ok(())
}

async fn read_user_version(pool: &SqlitePool) -> Result<i32, String> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| format!("Failed to read PRAGMA user_version: {e}"))
}

async fn set_user_version(pool: &SqlitePool, version: i32) -> Result<(), String> {
    sqlx::query(&format!("PRAGMA user_version = {}", version))
        .execute(pool)
        .await
        .map_err(|e| format!("Failed to set PRAGMA user_version: {e}"))?;
    Ok(())
}
