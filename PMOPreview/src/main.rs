use pmorelay::RelayExt;
use pmoserver::ServerBuilder;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = pmoconfig::get_config();

    let mut server = ServerBuilder::new_configured().build();
    server.init_logging().await;
    info!("Configuration loaded from {}", config.directory());

    server
        .add_route("/info", || async {
            serde_json::json!({
                "name": "PMOPreview",
                "version": env!("CARGO_PKG_VERSION"),
            })
        })
        .await;

    let (app_id, _) = config.get_catalog_credentials()?;
    if app_id.is_empty() {
        warn!("No catalog app_id configured: /api/relay/preview will be refused upstream");
    }

    server.init_stream_relay().await?;
    info!(
        "Relay ready: /api/relay/stream?url=... (content type {})",
        config.get_relay_content_type()?
    );

    server.start().await;
    server.wait().await;

    info!("PMOPreview stopped");
    Ok(())
}
