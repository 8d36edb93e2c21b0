use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use line_relay::{cli::Cli, event::TracingEventSink, server::Server};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Cli::parse().into_config();
    let server = Server::bind(config, Arc::new(TracingEventSink)).await?;
    info!("publisher endpoint listening on {}", server.publisher_addr()?);
    info!("subscriber endpoint listening on {}", server.subscriber_addr()?);

    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("relay exited with error: {err:?}");
        return Err(err);
    }

    Ok(())
}
