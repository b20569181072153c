use tokio::net::TcpListener;
use tracing::info;

use parkfit::config::Config;
use parkfit::model::CatalogEntry;
use parkfit::server::{DRAIN_TIMEOUT, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    parkfit::observability::init(config.metrics_port)?;

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("parkfit listening on {addr}");
    info!("  max_connections: {}", config.max_connections);
    info!("  catalog: {}", describe_catalog(&config.catalog));
    if let Some(port) = config.metrics_port {
        info!("  metrics: http://0.0.0.0:{port}/metrics");
    }

    Server::new(listener, config.catalog, config.max_connections)
        .run(shutdown_signal(), DRAIN_TIMEOUT)
        .await;

    info!("parkfit stopped");
    Ok(())
}

fn describe_catalog(catalog: &[CatalogEntry]) -> String {
    if catalog.is_empty() {
        return "derived per request".into();
    }
    catalog
        .iter()
        .map(|c| if c.reservable { c.name.clone() } else { format!("{} (fixed)", c.name) })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolves on ctrl-c, or SIGTERM where there is one.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
