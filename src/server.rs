//! Accept loop with a connection cap and a bounded drain on shutdown.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::model::CatalogEntry;
use crate::observability::{CONNECTIONS_ACTIVE, CONNECTIONS_REJECTED_TOTAL, CONNECTIONS_TOTAL};
use crate::wire;

/// Grace period open connections get once shutdown starts.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Server {
    listener: TcpListener,
    catalog: Arc<Vec<CatalogEntry>>,
    permits: Arc<Semaphore>,
    max_connections: usize,
}

impl Server {
    pub fn new(listener: TcpListener, catalog: Vec<CatalogEntry>, max_connections: usize) -> Self {
        Self {
            listener,
            catalog: Arc::new(catalog),
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves, then wait up to `drain` for open
    /// connections to finish.
    pub async fn run(self, shutdown: impl Future<Output = ()>, drain: Duration) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => self.admit(socket, peer),
                    Err(e) => error!("accept error: {e}"),
                },
                _ = &mut shutdown => break,
            }
        }
        info!("shutdown signal received, draining connections");
        self.drain(drain).await;
    }

    /// Hand the socket to its own task, or drop it when the cap is reached.
    fn admit(&self, socket: TcpStream, peer: SocketAddr) {
        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            warn!("connection limit reached, rejecting {peer}");
            metrics::counter!(CONNECTIONS_REJECTED_TOTAL).increment(1);
            return;
        };

        info!("connection from {peer}");
        metrics::counter!(CONNECTIONS_TOTAL).increment(1);
        metrics::gauge!(CONNECTIONS_ACTIVE).increment(1.0);

        let catalog = self.catalog.clone();
        tokio::spawn(async move {
            if let Err(e) = wire::process_connection(socket, catalog).await {
                error!("connection error from {peer}: {e}");
            }
            metrics::gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
            drop(permit);
        });
    }

    /// Every permit back means every connection task has finished.
    async fn drain(&self, timeout: Duration) {
        let all = u32::try_from(self.max_connections).unwrap_or(u32::MAX);
        match tokio::time::timeout(timeout, self.permits.acquire_many(all)).await {
            Ok(_) => info!("all connections drained"),
            Err(_) => {
                let open = self.max_connections - self.permits.available_permits();
                warn!("drain timeout, {open} connections still open");
            }
        }
    }
}
