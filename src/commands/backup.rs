use log::{error, warn};
use serde::Serialize;

use crate::backup::{ArtifactManifest, SnapshotStore};
use crate::error::BackupError;

pub const BACKUP_SOURCE_FILES: &str = "backup-source-files";
pub const GET_LATEST_BACKUP: &str = "get-latest-backup";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBackupResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LatestBackupResponse {
    fn failed(error: BackupError) -> Self {
        Self {
            success: false,
            path: None,
            files: None,
            error: Some(error.into()),
        }
    }
}

/// Copies the manifest into a fresh snapshot. Never fails outright; failures
/// come back as `success: false` with a message.
pub async fn backup_source_files(
    store: &SnapshotStore,
    manifest: &ArtifactManifest,
) -> BackupResponse {
    match store.create_snapshot(manifest).await {
        Ok(snapshot) => BackupResponse {
            success: true,
            path: Some(snapshot.path.to_string_lossy().to_string()),
            error: None,
        },
        Err(err) => {
            error!("[backup] Backup failed: {err}");
            BackupResponse {
                success: false,
                path: None,
                error: Some(err.into()),
            }
        }
    }
}

pub async fn get_latest_backup(store: &SnapshotStore) -> LatestBackupResponse {
    match store.get_latest_snapshot().await {
        Ok(latest) => LatestBackupResponse {
            success: true,
            path: Some(latest.path.to_string_lossy().to_string()),
            files: Some(latest.files),
            error: None,
        },
        Err(err) => {
            if !err.is_not_found() {
                warn!("[backup] Failed to resolve latest backup: {err}");
            }
            LatestBackupResponse::failed(err)
        }
    }
}
