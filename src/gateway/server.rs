use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Result;
use log::{error, info, warn};
use reqwest::{redirect, Client};
use tokio::{
    net::TcpListener,
    sync::{broadcast, Mutex},
    task::JoinHandle,
};

use super::router::build_router;
use crate::backup::SnapshotStore;
use crate::commands::backup::{
    backup_source_files, get_latest_backup, BackupResponse, LatestBackupResponse,
};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// The local HTTP gateway plus the snapshot operations the host triggers.
///
/// Owned by the host for its whole lifetime. `start` and `stop` may be called
/// in any order and any number of times.
pub struct GatewayServer {
    config: GatewayConfig,
    client: Client,
    snapshots: SnapshotStore,
    running: Mutex<Option<RunningServer>>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        // The upstream lives on loopback; system proxies must not intercept it.
        // Redirects go back to the caller untouched.
        let client = Client::builder()
            .no_proxy()
            .redirect(redirect::Policy::none())
            .build()?;
        let snapshots = SnapshotStore::new(config.backup_root.clone());

        Ok(Self {
            config,
            client,
            snapshots,
            running: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Binds `127.0.0.1:<port>` and starts serving. Returns the bound address;
    /// if already running, returns the existing one.
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            return Ok(server.local_addr);
        }

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.config.port));
        let bind_error = |source| GatewayError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        if !self.config.static_root.is_dir() {
            warn!(
                "[gateway:http] static root {} is not a directory; static requests will 404",
                self.config.static_root.display()
            );
        }

        let router = build_router(
            self.config.route.clone(),
            &self.config.static_root,
            self.client.clone(),
        );
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(error) = result {
                error!("[gateway:http] server stopped: {error:?}");
            }
        });

        info!("[gateway:http] listening on http://{local_addr}");
        *running = Some(RunningServer {
            local_addr,
            shutdown_tx,
            task,
        });
        Ok(local_addr)
    }

    /// Closes the listening socket and waits for in-flight requests to drain.
    /// No-op when not running.
    pub async fn stop(&self) {
        let Some(server) = self.running.lock().await.take() else {
            return;
        };

        info!("[gateway:http] shutting down {}", server.local_addr);
        let _ = server.shutdown_tx.send(());
        if let Err(err) = server.task.await {
            error!("[gateway:http] server task failed: {err}");
        }
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|server| server.local_addr)
    }

    pub async fn is_running(&self) -> bool {
        self.local_addr().await.is_some()
    }

    /// `backup-source-files`
    pub async fn backup_source_files(&self) -> BackupResponse {
        backup_source_files(&self.snapshots, &self.config.manifest).await
    }

    /// `get-latest-backup`
    pub async fn get_latest_backup(&self) -> LatestBackupResponse {
        get_latest_backup(&self.snapshots).await
    }
}

impl Drop for GatewayServer {
    fn drop(&mut self) {
        if let Some(server) = self.running.get_mut().take() {
            let _ = server.shutdown_tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> GatewayConfig {
        let mut config = GatewayConfig::for_app_root(tmp.path());
        config.port = 0;
        config
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let server = GatewayServer::new(config(&tmp)).unwrap();

        server.stop().await;
        server.stop().await;
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn start_twice_returns_same_address() {
        let tmp = TempDir::new().unwrap();
        let server = GatewayServer::new(config(&tmp)).unwrap();

        let first = server.start().await.unwrap();
        let second = server.start().await.unwrap();
        assert_eq!(first, second);
        assert!(first.ip().is_loopback());

        server.stop().await;
        server.stop().await;
        assert_eq!(server.local_addr().await, None);
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let tmp = TempDir::new().unwrap();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config(&tmp);
        config.port = taken.local_addr().unwrap().port();

        let server = GatewayServer::new(config).unwrap();
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, GatewayError::Bind { .. }));
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn snapshot_operations_use_configured_roots() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("main.js"), "main").unwrap();
        let server = GatewayServer::new(config(&tmp)).unwrap();

        let missing = server.get_latest_backup().await;
        assert!(!missing.success);
        assert_eq!(missing.error.as_deref(), Some("No backups found"));

        let created = server.backup_source_files().await;
        assert!(created.success, "{created:?}");

        let latest = server.get_latest_backup().await;
        assert!(latest.success);
        assert_eq!(latest.path, created.path);
        assert_eq!(latest.files, Some(vec!["main.js".to_string()]));
    }
}
