//! console-bridge-spawn: singleton-spawn protocol entry point (C8) for
//! tool-server processes that need a broker running before they can talk
//! to it.

use console_bridge_broker::config::Config;
use console_bridge_broker::spawner::{ensure_running, SpawnerPaths};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();
    let paths = SpawnerPaths::new();

    let server_id = ensure_running(&config, &paths).await?;
    println!("{}", serde_json::json!({ "serverId": server_id, "wsUrl": config.ws_url() }));
    Ok(())
}
