use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::info;

use dhcplet::{AllocationPool, Config, LeaseHandler, server};

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(Path::new(&path))?;
    config.validate().context("invalid configuration")?;

    let pool = AllocationPool::from_cidr(config.pool_net()?);
    info!("pool {} holds {} addresses", config.pool, pool.len());

    let handler = Arc::new(Mutex::new(LeaseHandler::new(
        config.subnet_net()?,
        config.gateway,
        config.dns,
        config.server_ip,
        pool,
    )));

    let listen = SocketAddr::new(config.listen_address.into(), config.port);

    tokio::select! {
        result = server::run(listen, handler) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, stopping server");
            Ok(())
        }
    }
}
