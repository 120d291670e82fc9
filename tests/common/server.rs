//! Test server management.
//!
//! Spawns and manages pbxd instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tokio::time::sleep;

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    _data_dir: tempfile::TempDir,
}

impl TestServer {
    /// Spawn a new test server with the default capacity.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(port, 1024).await
    }

    /// Spawn a new test server with a specific extension capacity.
    pub async fn spawn_with(port: u16, max_extensions: usize) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let config_path = data_dir.path().join("pbxd.toml");
        let config_content = format!(
            r#"
[server]
name = "test.exchange"
listen = "127.0.0.1:{port}"
max_extensions = {max_extensions}
metrics_port = 0
"#
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_pbxd"))
            .arg(&config_path)
            .spawn()?;

        let server = Self {
            child,
            port,
            _data_dir: data_dir,
        };

        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Wait until the server is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..30 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                // The probe connection briefly held an extension; give
                // the server a moment to unregister it.
                sleep(Duration::from_millis(100)).await;
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 3 seconds")
    }

    /// Get the server address.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.address()).await
    }

    /// Ask the server to shut down cleanly, the way an operator would.
    pub fn signal_shutdown(&self) -> anyhow::Result<()> {
        let status = Command::new("kill")
            .args(["-HUP", &self.child.id().to_string()])
            .status()?;
        if !status.success() {
            anyhow::bail!("kill -HUP failed");
        }
        Ok(())
    }

    /// Wait for the server process to exit on its own.
    pub async fn wait_for_exit(&mut self, dur: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("server did not exit within {dur:?}");
            }
            sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process; the temp dir cleans itself up.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
