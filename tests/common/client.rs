//! Test client.
//!
//! Drives the exchange's text protocol over TCP and parses reply lines,
//! so tests can assert on exact notification sequences.

use pbx_proto::{Reply, TuState};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A test client plugged into one extension.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    extension: u32,
}

impl TestClient {
    /// Connect to a test server and consume the registration
    /// notification, which carries the assigned extension.
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            extension: 0,
        };
        match client.recv().await? {
            Reply::State {
                state: TuState::OnHook,
                param: Some(extension),
            } => client.extension = extension,
            other => anyhow::bail!("unexpected registration reply: {other:?}"),
        }
        Ok(client)
    }

    /// The extension this client registered under.
    pub fn extension(&self) -> u32 {
        self.extension
    }

    /// Send a raw protocol line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn pickup(&mut self) -> anyhow::Result<()> {
        self.send_raw("pickup").await
    }

    pub async fn hangup(&mut self) -> anyhow::Result<()> {
        self.send_raw("hangup").await
    }

    pub async fn dial(&mut self, extension: u32) -> anyhow::Result<()> {
        self.send_raw(&format!("dial {extension}")).await
    }

    pub async fn chat(&mut self, message: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("chat {message}")).await
    }

    /// Receive a single reply line from the server.
    pub async fn recv(&mut self) -> anyhow::Result<Reply> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a reply with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Reply> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed by server");
        }
        line.trim_end_matches(['\r', '\n'])
            .parse::<Reply>()
            .map_err(|e| anyhow::anyhow!("parse error: {e}"))
    }

    /// Wait for the server to close the connection, tolerating any
    /// final notifications still in flight.
    pub async fn expect_disconnect(&mut self, dur: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| anyhow::anyhow!("server did not close the connection"))?;
            let mut line = String::new();
            let n = timeout(remaining, self.reader.read_line(&mut line)).await??;
            if n == 0 {
                return Ok(());
            }
        }
    }
}
