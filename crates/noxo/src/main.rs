use std::path::Path;

use noxo::{NoxoServer, ServerConfig, ServerError};
use tracing_subscriber::EnvFilter;

/// Flat key=value configuration file, looked up in the working
/// directory. Missing file means defaults.
const CONFIG_PATH: &str = "server.conf";

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::load(Path::new(CONFIG_PATH));
    if let Some(arg) = std::env::args().nth(1) {
        config.port = arg
            .parse()
            .map_err(|_| ServerError::Config(format!("invalid port `{arg}`")))?;
    }

    let server = NoxoServer::builder().config(config).build().await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "noxo listening");
    }
    server.run().await
}
