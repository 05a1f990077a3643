//! History export to a user-visible JSON file

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::{error::AppError, state::CompletedTimerRecord};

/// What an export request ended up doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExportOutcome {
    Written { path: PathBuf, count: usize },
    NothingToExport,
}

/// `Timer_History_<ISO-8601 timestamp with ':' replaced by '-'>.json`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-");
    format!("Timer_History_{}.json", stamp)
}

/// Write `records` as pretty-printed JSON into `dir`.
/// An empty slice writes nothing. Existing files are never overwritten.
pub async fn write_history_export(
    dir: &Path,
    records: &[CompletedTimerRecord],
    now: DateTime<Utc>,
) -> Result<ExportOutcome, AppError> {
    if records.is_empty() {
        info!("Export requested with no history; nothing written");
        return Ok(ExportOutcome::NothingToExport);
    }

    ensure_writable_dir(dir).await?;

    let path = dir.join(export_file_name(now));
    let json = serde_json::to_string_pretty(records).map_err(|e| AppError::Export {
        path: path.clone(),
        message: format!("failed to serialize history: {}", e),
    })?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
        .map_err(|e| classify_io(&path, e))?;
    file.write_all(json.as_bytes())
        .await
        .map_err(|e| classify_io(&path, e))?;
    file.flush().await.map_err(|e| classify_io(&path, e))?;

    info!("Exported {} history records to {}", records.len(), path.display());
    Ok(ExportOutcome::Written {
        path,
        count: records.len(),
    })
}

async fn ensure_writable_dir(dir: &Path) -> Result<(), AppError> {
    match fs::metadata(dir).await {
        Ok(meta) if !meta.is_dir() => Err(AppError::Export {
            path: dir.to_path_buf(),
            message: "export location is not a directory".to_string(),
        }),
        Ok(meta) if meta.permissions().readonly() => Err(AppError::Permission {
            path: dir.to_path_buf(),
            message: "export directory is read-only".to_string(),
        }),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Creating export directory {}", dir.display());
            fs::create_dir_all(dir)
                .await
                .map_err(|e| classify_io(dir, e))
        }
        Err(e) => Err(classify_io(dir, e)),
    }
}

fn classify_io(path: &Path, e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        AppError::Permission {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    } else {
        AppError::Export {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }
}
