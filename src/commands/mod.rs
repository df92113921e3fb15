pub mod backup;

use anyhow::{bail, Result};
use serde_json::Value;

use crate::gateway::GatewayServer;

/// Runs a host-triggered operation by its channel name and returns the JSON
/// payload the host sees.
pub async fn invoke(server: &GatewayServer, command: &str) -> Result<Value> {
    let payload = match command {
        backup::BACKUP_SOURCE_FILES => serde_json::to_value(server.backup_source_files().await)?,
        backup::GET_LATEST_BACKUP => serde_json::to_value(server.get_latest_backup().await)?,
        other => bail!("Unknown command: {other}"),
    };
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn dispatches_by_channel_name() {
        let tmp = TempDir::new().unwrap();
        let server = GatewayServer::new(GatewayConfig::for_app_root(tmp.path())).unwrap();

        let latest = invoke(&server, "get-latest-backup").await.unwrap();
        assert_eq!(latest["success"], Value::Bool(false));

        let created = invoke(&server, "backup-source-files").await.unwrap();
        assert_eq!(created["success"], Value::Bool(true));

        assert!(invoke(&server, "delete-backups").await.is_err());
    }
}
