use crate::domain::error::{AppError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

fn io_err(msg: impl Into<String>) -> AppError {
    AppError::StorageFailure(msg.into())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| io_err(format!("Failed to create dir {}: {e}", path.display())))?;
    Ok(())
}

/// Writes through a temp file and renames it into place.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
    {
        let mut file = fs::File::create(&tmp_path).map_err(|e| {
            io_err(format!(
                "Failed to create temp file {}: {e}",
                tmp_path.display()
            ))
        })?;
        file.write_all(bytes).map_err(|e| {
            io_err(format!(
                "Failed to write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;
        file.sync_all().ok();
    }

    // Windows cannot rename over an existing file, so move the old one aside first.
    let displaced = if path.exists() {
        let aside = path.with_extension(format!("bak-{}", Uuid::new_v4()));
        fs::rename(path, &aside).map_err(|e| {
            io_err(format!(
                "Failed to move existing file {} to {}: {e}",
                path.display(),
                aside.display()
            ))
        })?;
        Some(aside)
    } else {
        None
    };

    fs::rename(&tmp_path, path).map_err(|e| {
        io_err(format!(
            "Failed to rename temp file {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })?;

    if let Some(aside) = displaced {
        let _ = fs::remove_file(aside);
    }
    Ok(())
}

pub fn sha256_hex_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| {
        io_err(format!(
            "Failed to open file for hashing {}: {e}",
            path.display()
        ))
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 64];
    loop {
        let n = file.read(&mut buf).map_err(|e| {
            io_err(format!(
                "Failed to read file for hashing {}: {e}",
                path.display()
            ))
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Daily copies of the test generation database.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    /// Regular backups kept; tagged ones (`pre_restore`) are never pruned.
    pub max_daily_backups: usize,
    pub prefix: String,
}

impl BackupConfig {
    pub fn new(backup_dir: impl Into<PathBuf>, max_daily_backups: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            max_daily_backups: max_daily_backups.max(1),
            prefix: "testgen_db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    pub backup_path: PathBuf,
    pub size_bytes: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub modified: Option<SystemTime>,
}

fn is_tagged(file_name: &str) -> bool {
    file_name.contains("pre_restore")
}

/// Creates today's backup unless one exists, then applies retention.
/// Does nothing when the database file has not been created yet.
pub fn ensure_daily_backup(db_path: &Path, config: &BackupConfig) -> Result<Option<BackupResult>> {
    if !db_path.exists() {
        return Ok(None);
    }
    ensure_dir(&config.backup_dir)?;

    let today_prefix = format!("{}_{}_", config.prefix, chrono::Utc::now().format("%Y%m%d"));
    let has_today = list_backups(config)?
        .iter()
        .any(|backup| backup.file_name.starts_with(&today_prefix) && !is_tagged(&backup.file_name));

    let created = if has_today {
        None
    } else {
        Some(backup_database(db_path, config, Some("daily"))?)
    };

    let removed = cleanup_old_backups(config)?;
    if !removed.is_empty() {
        tracing::info!(count = removed.len(), "Removed old database backups");
    }

    Ok(created)
}

pub fn backup_database(
    db_path: &Path,
    config: &BackupConfig,
    reason: Option<&str>,
) -> Result<BackupResult> {
    ensure_dir(&config.backup_dir)?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let reason_suffix = reason.map(|r| format!("_{}", r)).unwrap_or_default();
    let backup_path = config
        .backup_dir
        .join(format!("{}_{}{}.db", config.prefix, timestamp, reason_suffix));

    let db_bytes = fs::read(db_path).map_err(|e| {
        io_err(format!(
            "Failed to read database for backup {}: {e}",
            db_path.display()
        ))
    })?;
    atomic_write_bytes(&backup_path, &db_bytes)?;

    tracing::info!(path = %backup_path.display(), "Database backup written");
    Ok(BackupResult {
        backup_path,
        size_bytes: db_bytes.len() as u64,
        timestamp,
    })
}

/// Keeps the newest `max_daily_backups` regular backups and deletes the rest.
pub fn cleanup_old_backups(config: &BackupConfig) -> Result<Vec<PathBuf>> {
    let mut regular: Vec<BackupInfo> = list_backups(config)?
        .into_iter()
        .filter(|backup| !is_tagged(&backup.file_name))
        .collect();
    // newest first; file names carry the timestamp so they break mtime ties
    regular.sort_by(|a, b| b.modified.cmp(&a.modified).then(b.file_name.cmp(&a.file_name)));

    let mut deleted = Vec::new();
    for backup in regular.into_iter().skip(config.max_daily_backups) {
        if fs::remove_file(&backup.path).is_ok() {
            deleted.push(backup.path);
        }
    }
    Ok(deleted)
}

pub fn list_backups(config: &BackupConfig) -> Result<Vec<BackupInfo>> {
    let mut backups = Vec::new();
    if !config.backup_dir.exists() {
        return Ok(backups);
    }

    for entry in fs::read_dir(&config.backup_dir).map_err(|e| {
        io_err(format!(
            "Failed to read backup dir {}: {e}",
            config.backup_dir.display()
        ))
    })? {
        let entry = entry.map_err(|e| io_err(format!("Failed dir entry: {e}")))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        if !file_name.starts_with(&config.prefix) || !file_name.ends_with(".db") {
            continue;
        }

        let meta = entry
            .metadata()
            .map_err(|e| io_err(format!("Failed to stat {}: {e}", path.display())))?;
        backups.push(BackupInfo {
            path,
            file_name,
            size_bytes: meta.len(),
            modified: meta.modified().ok(),
        });
    }

    backups.sort_by(|a, b| b.modified.cmp(&a.modified).then(b.file_name.cmp(&a.file_name)));
    Ok(backups)
}

/// Replaces the database with a backup after saving the current file.
pub fn restore_from_backup(
    backup_path: &Path,
    db_path: &Path,
    config: &BackupConfig,
) -> Result<BackupResult> {
    let pre_restore = backup_database(db_path, config, Some("pre_restore"))?;

    let backup_bytes = fs::read(backup_path).map_err(|e| {
        io_err(format!(
            "Failed to read backup file {}: {e}",
            backup_path.display()
        ))
    })?;
    atomic_write_bytes(db_path, &backup_bytes)?;

    Ok(pre_restore)
}
