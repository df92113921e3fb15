//! Timestamp-addressed snapshots of the shell's own source artifacts.
//!
//! Layout on disk is `<root>/<DD-MM-YY>/<HHMM>/<file...>` with no index file;
//! the directory names are the only record.

mod manifest;
mod path;
mod store;

pub use manifest::{ArtifactManifest, ManifestEntry};
pub use path::{resolve_snapshot_path, SnapshotKey, SnapshotPath, DATE_KEY_LEN, TIME_KEY_LEN};
pub use store::{LatestSnapshot, Snapshot, SnapshotStore};
