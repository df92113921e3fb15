//! Desktop shell core for MIND: the local gateway that serves the bundled web
//! UI and proxies the inference service, and timestamped snapshots of the
//! shell's own sources.

pub mod backup;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
mod path_utils;

pub use config::GatewayConfig;
pub use error::{BackupError, GatewayError};
pub use gateway::GatewayServer;
