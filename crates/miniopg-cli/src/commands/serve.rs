use std::net::SocketAddr;
use std::path::Path;

use miniopg_bridge::{require_loopback, BridgeConfig, BridgeServer};

use crate::error::CliError;

/// Run the upload bridge in the foreground until Ctrl-C or a takeover.
pub async fn run_serve(
    bind: Option<SocketAddr>,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    let config = bridge_config(BridgeConfig::from_env()?, bind, config_path)?;
    let server = BridgeServer::from_config(config)?;
    let addr = server.start().await?;
    println!("MinioPG upload bridge listening on http://{addr}/upload");
    server.wait_for_shutdown().await;
    Ok(())
}

/// Command-line flags take precedence over the environment. `--bind` is held
/// to the same loopback rule as `MINIOPG_BRIDGE_ADDR`.
pub fn bridge_config(
    mut config: BridgeConfig,
    bind: Option<SocketAddr>,
    config_path: Option<&Path>,
) -> Result<BridgeConfig, CliError> {
    if let Some(bind) = bind {
        config.bind_addr = require_loopback(bind)?;
    }
    if let Some(path) = config_path {
        config.config_path = Some(path.to_path_buf());
    }
    Ok(config)
}
