use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use log::{info, warn};
use serde::Serialize;
use tokio::fs;

use super::manifest::ArtifactManifest;
use super::path::{compare_names, resolve_snapshot_path, DateKey, TimeKey};
use crate::error::{BackupError, Result};

/// A snapshot that was just written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub date_key: String,
    pub time_key: String,
    pub path: PathBuf,
    /// Copied file names, in manifest order.
    pub files: Vec<String>,
}

/// The most recent snapshot found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestSnapshot {
    pub path: PathBuf,
    pub files: Vec<String>,
}

/// Versioned copies of a fixed artifact set under `root/DD-MM-YY/HHMM/`.
///
/// Holds no state beyond the root; concurrent calls are not serialized.
/// Two snapshots in the same minute share a directory and overwrite each
/// other's files by name.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn create_snapshot(&self, manifest: &ArtifactManifest) -> Result<Snapshot> {
        self.create_snapshot_at(manifest, &Local::now()).await
    }

    pub async fn create_snapshot_at<Tz: TimeZone>(
        &self,
        manifest: &ArtifactManifest,
        now: &DateTime<Tz>,
    ) -> Result<Snapshot>
    where
        Tz::Offset: std::fmt::Display,
    {
        let target = resolve_snapshot_path(now, &self.root);

        fs::create_dir_all(&target.full_path)
            .await
            .map_err(|err| {
                BackupError::io_at("Failed to create backup directory", &target.full_path, err)
            })?;

        let mut files = Vec::with_capacity(manifest.entries().len());
        for entry in manifest.entries() {
            let exists = fs::try_exists(&entry.source)
                .await
                .map_err(|err| BackupError::io_at("Failed to inspect", &entry.source, err))?;
            if !exists {
                continue;
            }

            let dest = target.full_path.join(&entry.file_name);
            fs::copy(&entry.source, &dest).await.map_err(|err| {
                BackupError::io(
                    format!(
                        "Failed to copy {} to {}",
                        entry.source.display(),
                        dest.display()
                    ),
                    err,
                )
            })?;
            files.push(entry.file_name.clone());
        }

        info!(
            "[backup] Snapshot written to {} ({} files)",
            target.full_path.display(),
            files.len()
        );

        Ok(Snapshot {
            date_key: target.date_key,
            time_key: target.time_key,
            path: target.full_path,
            files,
        })
    }

    pub async fn get_latest_snapshot(&self) -> Result<LatestSnapshot> {
        if !fs::try_exists(&self.root)
            .await
            .map_err(|err| BackupError::io_at("Failed to inspect", &self.root, err))?
        {
            return Err(BackupError::NotFound);
        }

        let date_dirs = list_entries(&self.root, EntryKind::Directory).await?;
        let latest_date = latest_name(date_dirs, DateKey::parse).ok_or(BackupError::NotFound)?;
        let date_path = self.root.join(latest_date);

        let time_dirs = list_entries(&date_path, EntryKind::Directory).await?;
        let latest_time = latest_name(time_dirs, TimeKey::parse).ok_or(BackupError::NotFound)?;
        let path = date_path.join(latest_time);

        let mut files = list_entries(&path, EntryKind::File).await?;
        files.sort();

        Ok(LatestSnapshot { path, files })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
}

/// Names of the immediate children of `dir` of the given kind. Symlinks are
/// followed when classifying. Names that are not UTF-8 cannot be reported
/// faithfully and are left out.
async fn list_entries(dir: &Path, kind: EntryKind) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|err| BackupError::io_at("Failed to list", dir, err))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| BackupError::io_at("Failed to list", dir, err))?
    {
        let entry_path = entry.path();
        let metadata = fs::metadata(&entry_path)
            .await
            .map_err(|err| BackupError::io_at("Failed to inspect", &entry_path, err))?;

        let matches = match kind {
            EntryKind::Directory => metadata.is_dir(),
            EntryKind::File => metadata.is_file(),
        };
        if !matches {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!(
                "[backup] Skipping non UTF-8 entry {:?} in {}",
                raw,
                dir.display()
            ),
        }
    }

    Ok(names)
}

fn latest_name<K: Ord>(
    names: Vec<String>,
    parse: impl Fn(&str) -> Option<K> + Copy,
) -> Option<String> {
    names.into_iter().max_by(|a, b| compare_names(a, b, parse))
}
