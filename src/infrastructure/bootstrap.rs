//! Startup wiring: configuration, logging, database, backups, clients.

use crate::domain::error::{AppError, Result};
use crate::infrastructure::artifact_store::{ensure_daily_backup, restore_from_backup, BackupConfig};
use crate::infrastructure::config::ConfigService;
use crate::infrastructure::db::{init_testgen_db, TestGenRepository};
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::interfaces::http::{add_log, LogEntry};
use crate::interfaces::state::AppState;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn backup_config(config: &ConfigService) -> (PathBuf, BackupConfig) {
    let database = &config.config().database;
    (
        PathBuf::from(&database.path),
        BackupConfig::new(&database.backup_dir, database.max_backups),
    )
}

/// Replaces the database file with `backup`. Must run before any pool is opened.
pub fn restore_database(config: &ConfigService, backup: &Path) -> Result<()> {
    if !backup.exists() {
        return Err(AppError::NotFound(format!("Backup not found: {}", backup.display())));
    }
    let (db_path, backup_config) = backup_config(config);
    let saved = restore_from_backup(backup, &db_path, &backup_config)?;
    tracing::info!(
        restored = %backup.display(),
        previous = %saved.backup_path.display(),
        "Database restored from backup"
    );
    Ok(())
}

pub async fn build_state(config: ConfigService, logs: &Arc<Mutex<Vec<LogEntry>>>) -> Result<AppState> {
    let (db_path, backup_config) = backup_config(&config);

    init_testgen_db(&db_path).await.map_err(|err| {
        tracing::error!(error = %err, path = %db_path.display(), "Failed to initialize database");
        AppError::StorageFailure(err)
    })?;
    add_log(logs, "INFO", "System", &format!("Database ready at {}", db_path.display()));

    if config.config().database.auto_backup {
        // The schema pool is closed by now, so a file copy is consistent.
        let db_for_backup = db_path.clone();
        let joined = tokio::task::spawn_blocking(move || ensure_daily_backup(&db_for_backup, &backup_config)).await;
        match joined {
            Ok(Ok(Some(result))) => add_log(
                logs,
                "INFO",
                "Database",
                &format!(
                    "Daily backup created: {} ({} bytes)",
                    result.backup_path.display(),
                    result.size_bytes
                ),
            ),
            Ok(Ok(None)) => {}
            Ok(Err(err)) => add_log(logs, "WARN", "Database", &format!("Daily backup failed: {}", err)),
            Err(err) => add_log(logs, "WARN", "Database", &format!("Daily backup task failed: {}", err)),
        }
    }

    let repository = TestGenRepository::connect(&db_path).await?;
    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(RouterClient::new());

    let llm = config.llm_config();
    if llm.api_key.is_none() {
        add_log(
            logs,
            "WARN",
            "System",
            &format!("No API key found for {:?}; generation will fail until one is set", llm.provider),
        );
    }

    Ok(AppState::new(config, repository, llm_client))
}
