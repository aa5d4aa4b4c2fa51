use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use trigger_notify::{
    config::Config,
    server::Server,
    sinks::StdoutSink,
    store::create_store,
    tickets::JiraClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);

    // Initialize store
    let store = create_store(&config.database).await?;
    store.init().await?;

    let tracker = Arc::new(JiraClient::new(&config.tickets.jira));
    let sink = Arc::new(StdoutSink::new(&config.sink));

    let server = Server::new(&config, store, tracker, sink);

    info!("Starting server on {}", config.server.addr);
    server.start(&config.server.addr).await?;

    Ok(())
}
