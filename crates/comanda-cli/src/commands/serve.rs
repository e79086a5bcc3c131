//! `comanda serve` — start the HTTP execution layer and block until it is
//! interrupted.

use anyhow::{Context, Result};
use comanda_core::Config;
use comanda_server::ServerConfig;

pub async fn run(host: String, port: Option<u16>, password: Option<String>) -> Result<()> {
    let config_path = Config::default_path();
    let port = match port {
        Some(p) => p,
        None => {
            let config = Config::load(&config_path, password.as_deref()).context("loading config store")?;
            config.server.port
        }
    };

    let server_config = ServerConfig { host, port, config_path, config_password: password };
    let addr = comanda_server::start_server(server_config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("starting server")?;

    println!("comanda server listening on {addr}");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    println!("shutting down");
    Ok(())
}
