use anyhow::Result;
use log::info;
use mind_desktop::{commands, logging, GatewayConfig, GatewayServer};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = GatewayConfig::load().await?;
    let server = GatewayServer::new(config)?;

    // `mind-desktop backup-source-files` / `mind-desktop get-latest-backup`
    if let Some(command) = std::env::args().nth(1) {
        let payload = commands::invoke(&server, &command).await?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let addr = server.start().await?;
    info!("MIND server running at http://localhost:{}", addr.port());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down MIND server...");
    server.stop().await;

    Ok(())
}
