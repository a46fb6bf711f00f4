use miniopg_bridge::{BridgeConfig, BridgeServer};
use miniopg_core::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development builds.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    let config = BridgeConfig::from_env()?;
    let log_dir = config.log_dir.clone().or_else(logging::default_log_dir);
    logging::init("miniopg_bridge=info,miniopg_core=info", log_dir.as_deref());
    tracing::info!("Starting miniopg-bridge with config: {:?}", config);

    let server = BridgeServer::from_config(config)?;
    let addr = server.start().await?;
    println!("MinioPG upload bridge listening on http://{addr}/upload");
    server.wait_for_shutdown().await;
    Ok(())
}
