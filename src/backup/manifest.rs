use std::path::{Path, PathBuf};

/// One artifact to copy into every snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub source: PathBuf,
    pub file_name: String,
}

impl ManifestEntry {
    pub fn new(source: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_name: file_name.into(),
        }
    }
}

/// The fixed list of artifacts a snapshot attempts to copy, in copy order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactManifest {
    entries: Vec<ManifestEntry>,
}

impl ArtifactManifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// The web shell's own sources, relative to the application root.
    pub fn for_app_root(app_root: &Path) -> Self {
        Self::new(vec![
            ManifestEntry::new(app_root.join("main.js"), "main.js"),
            ManifestEntry::new(app_root.join("preload.js"), "preload.js"),
            ManifestEntry::new(app_root.join("package.json"), "package.json"),
            ManifestEntry::new(app_root.join("app").join("index.html"), "index.html"),
        ])
    }

    /// Resolves relative sources against `base`.
    pub fn resolved_against(entries: Vec<ManifestEntry>, base: &Path) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| ManifestEntry {
                source: if entry.source.is_absolute() {
                    entry.source
                } else {
                    base.join(entry.source)
                },
                file_name: entry.file_name,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }
}
