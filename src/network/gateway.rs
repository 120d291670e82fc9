//! Gateway - TCP listener that accepts incoming connections.
//!
//! The Gateway binds to a socket and spawns a Connection task for each
//! incoming client, handing it a fresh connection id. The accept loop
//! stops when the shutdown token fires; draining the sessions that are
//! already inside is the registry's job.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::network::Connection;
use crate::state::{ConnIdGenerator, Pbx};

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    pbx: Arc<Pbx>,
    conn_ids: ConnIdGenerator,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        pbx: Arc<Pbx>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Listener bound");
        Ok(Self {
            listener,
            pbx,
            conn_ids: ConnIdGenerator::new(),
            shutdown,
        })
    }

    /// Run the gateway until shutdown is requested.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Listener stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let conn = self.conn_ids.next();
                            info!(conn, %addr, "Connection accepted");

                            let pbx = Arc::clone(&self.pbx);
                            tokio::spawn(async move {
                                let connection = Connection::new(conn, stream, addr, pbx);
                                if let Err(e) = connection.run().await {
                                    warn!(conn, %addr, error = %e, "Connection error");
                                }
                                info!(conn, %addr, "Connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }
    }
}
