use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use log::{info, warn};
use serde::Deserialize;
use tokio::fs;

use crate::backup::{ArtifactManifest, ManifestEntry};
use crate::gateway::{RouteRule, DEFAULT_PROXY_PREFIX, DEFAULT_UPSTREAM_ORIGIN};
use crate::path_utils::expand_tilde_path;

pub const DEFAULT_PORT: u16 = 9876;
pub const SETTINGS_PATH_ENV: &str = "MIND_SETTINGS";

/// `settings.json` as written by the user. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub port: Option<u16>,
    pub app_root: Option<String>,
    pub static_root: Option<String>,
    pub backup_root: Option<String>,
    pub upstream: UpstreamSettings,
    pub artifacts: Option<Vec<ArtifactSetting>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamSettings {
    pub prefix: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSetting {
    pub source: String,
    pub file_name: String,
}

/// Resolved gateway and backup configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub app_root: PathBuf,
    pub static_root: PathBuf,
    pub backup_root: PathBuf,
    pub route: RouteRule,
    pub manifest: ArtifactManifest,
}

impl GatewayConfig {
    /// Defaults for an application laid out as `<root>/app` (web UI) with
    /// backups in `<root>/app/Backups`.
    pub fn for_app_root(app_root: impl Into<PathBuf>) -> Self {
        let app_root = app_root.into();
        let static_root = app_root.join("app");
        Self {
            port: DEFAULT_PORT,
            backup_root: static_root.join("Backups"),
            static_root,
            manifest: ArtifactManifest::for_app_root(&app_root),
            route: RouteRule::ollama(),
            app_root,
        }
    }

    pub fn from_settings(settings: Settings, cwd: &Path) -> Result<Self> {
        let app_root = settings
            .app_root
            .as_deref()
            .map(|value| resolve_against(cwd, value))
            .unwrap_or_else(|| cwd.to_path_buf());

        let mut config = Self::for_app_root(&app_root);
        if let Some(port) = settings.port {
            config.port = port;
        }
        if let Some(value) = settings.static_root.as_deref() {
            config.static_root = resolve_against(&app_root, value);
        }
        if let Some(value) = settings.backup_root.as_deref() {
            config.backup_root = resolve_against(&app_root, value);
        } else if settings.static_root.is_some() {
            config.backup_root = config.static_root.join("Backups");
        }

        let prefix = settings
            .upstream
            .prefix
            .as_deref()
            .unwrap_or(DEFAULT_PROXY_PREFIX);
        let origin = settings
            .upstream
            .origin
            .as_deref()
            .unwrap_or(DEFAULT_UPSTREAM_ORIGIN);
        config.route = RouteRule::new(prefix, origin)?;

        if let Some(artifacts) = settings.artifacts {
            let mut entries = Vec::with_capacity(artifacts.len());
            for artifact in artifacts {
                validate_file_name(&artifact.file_name)?;
                entries.push(ManifestEntry::new(
                    expand_tilde_path(&artifact.source),
                    artifact.file_name,
                ));
            }
            config.manifest = ArtifactManifest::resolved_against(entries, &app_root);
        }

        Ok(config)
    }

    /// Loads from `$MIND_SETTINGS` or `~/.config/mind/settings.json`,
    /// resolving relative paths against the working directory.
    pub async fn load() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        match settings_path() {
            Some(path) => Self::load_from(&path, &cwd).await,
            None => {
                warn!("[config] No home directory; using defaults");
                Self::from_settings(Settings::default(), &cwd)
            }
        }
    }

    pub async fn load_from(path: &Path, cwd: &Path) -> Result<Self> {
        let settings = read_settings(path).await?;
        Self::from_settings(settings, cwd)
    }
}

pub fn settings_path() -> Option<PathBuf> {
    if let Ok(value) = std::env::var(SETTINGS_PATH_ENV) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(expand_tilde_path(trimmed));
        }
    }

    let mut path = dirs::home_dir()?;
    path.push(".config");
    path.push("mind");
    path.push("settings.json");
    Some(path)
}

/// Missing or malformed files fall back to defaults; other read errors fail.
async fn read_settings(path: &Path) -> Result<Settings> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(settings) => {
                info!("[config] Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(err) => {
                warn!(
                    "[config] Ignoring malformed settings {}: {err}",
                    path.display()
                );
                Ok(Settings::default())
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(err) => Err(anyhow!("Failed to read {}: {err}", path.display())),
    }
}

fn resolve_against(base: &Path, value: &str) -> PathBuf {
    let path = expand_tilde_path(value.trim());
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn validate_file_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
    {
        bail!("Artifact fileName must be a plain file name: {name:?}");
    }
    Ok(())
}
