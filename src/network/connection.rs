//! Connection - handles an individual client session.
//!
//! Each connection runs in its own tokio task. It creates a telephone
//! unit, plugs it into the exchange under its connection id, then drives
//! a unified `tokio::select!` loop:
//!
//! - framed line input → parsed command → unit/registry operation;
//! - queued replies (the unit's own notifications plus anything a peer
//!   pushed at us) → framed write;
//! - session teardown token → exchange shutdown forced us closed.
//!
//! On exit the unit is unregistered exactly once, which cancels any call
//! in progress before the task ends.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use pbx_proto::codec::PbxCodec;
use pbx_proto::{Command, Reply, TuState};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, warn};

use crate::state::{ConnId, Pbx, SessionHandle, TelephoneUnit};
use crate::{metrics, telemetry};

/// A client connection handler.
pub struct Connection {
    conn: ConnId,
    stream: TcpStream,
    addr: SocketAddr,
    pbx: Arc<Pbx>,
}

impl Connection {
    /// Create a new connection handler.
    pub fn new(conn: ConnId, stream: TcpStream, addr: SocketAddr, pbx: Arc<Pbx>) -> Self {
        Self {
            conn,
            stream,
            addr,
            pbx,
        }
    }

    /// Run the connection until the client goes away or the exchange
    /// shuts down.
    #[instrument(skip(self), fields(conn = self.conn, addr = %self.addr), name = "connection")]
    pub async fn run(self) -> anyhow::Result<()> {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Reply>();
        let session = SessionHandle::new(self.conn, reply_tx);
        let teardown = session.teardown_token();
        let connected_at = session.connected_at();
        let tu = TelephoneUnit::new(session);

        // The connection id doubles as the extension, the way the
        // original exchange numbered jacks by socket.
        if let Err(e) = self.pbx.register(&tu, tu.id()) {
            warn!(error = %e, "Registration refused");
            metrics::record_registration_refused(e.error_code());
            return Ok(());
        }

        let (read_half, write_half) = self.stream.into_split();
        let mut reader = FramedRead::new(read_half, PbxCodec::new());
        let mut writer = FramedWrite::new(write_half, PbxCodec::new());

        loop {
            tokio::select! {
                line = reader.next() => {
                    match line {
                        Some(Ok(line)) => Self::dispatch(&self.pbx, &tu, &line),
                        Some(Err(e)) => {
                            warn!(error = %e, "Read error");
                            break;
                        }
                        None => {
                            info!("Client disconnected");
                            break;
                        }
                    }
                }
                Some(reply) = reply_rx.recv() => {
                    // A stalled client must not be able to outlive the
                    // exchange: teardown interrupts even a blocked write.
                    tokio::select! {
                        result = writer.send(reply) => {
                            if let Err(e) = result {
                                warn!(error = %e, "Write error");
                                break;
                            }
                        }
                        _ = teardown.cancelled() => {
                            info!("Session torn down by exchange shutdown");
                            break;
                        }
                    }
                }
                _ = teardown.cancelled() => {
                    info!("Session torn down by exchange shutdown");
                    break;
                }
            }
        }

        if let Err(e) = self.pbx.unregister(&tu) {
            debug!(error = %e, "Unregister after close failed");
        }

        // Best-effort flush of anything still queued, including the
        // forced on-hook notification from unregistration.
        let flush = async {
            while let Ok(reply) = reply_rx.try_recv() {
                if writer.send(reply).await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), flush).await;

        let connected_for = chrono::Utc::now() - connected_at;
        info!(
            connected_secs = connected_for.num_seconds(),
            "Session finished"
        );
        Ok(())
    }

    /// Parse one input line and run the matching core operation.
    fn dispatch(pbx: &Arc<Pbx>, tu: &Arc<TelephoneUnit>, line: &str) {
        let Some(command) = Command::parse(line) else {
            if !line.is_empty() {
                debug!(line, "Ignoring unrecognized command");
            }
            return;
        };

        let name = command.name();
        let _timer = telemetry::CommandTimer::new(name);
        match command {
            Command::Pickup => {
                if tu.pickup() == TuState::Connected {
                    metrics::record_call_connected();
                }
            }
            Command::Hangup => {
                tu.hangup();
            }
            Command::Dial(extension) => {
                let was_dialing = tu.state() == TuState::DialTone;
                if pbx.dial(tu, extension) == TuState::Error && was_dialing {
                    metrics::record_command_error("dial", "no_route");
                }
            }
            Command::Chat(message) => match tu.chat(&message) {
                Ok(()) => metrics::record_chat_relayed(),
                Err(e) => metrics::record_command_error("chat", e.error_code()),
            },
        }
        debug!(command = name, state = %tu.state(), peer = ?tu.peer_id(), "Command handled");
    }
}
