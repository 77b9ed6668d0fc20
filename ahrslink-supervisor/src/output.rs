//! Output backends for emitting status frames.

use std::path::PathBuf;

use ahrslink_types::StatusFrame;

#[cfg(feature = "prometheus")]
use std::sync::Arc;

#[cfg(feature = "prometheus")]
use crate::prometheus::{PrometheusConfig, PrometheusExporter};

/// Destination for published status frames.
#[derive(Debug)]
pub enum Output {
    /// Write each frame to a JSON file, overwriting the previous one.
    File(PathBuf),

    /// Send each frame to a TCP server as newline-delimited JSON.
    ///
    /// Best effort: an unreachable server is skipped until the next emission.
    Tcp(String),

    /// Send frames through a channel. Never blocks: frames are dropped if
    /// the channel is full.
    Channel(tokio::sync::mpsc::Sender<StatusFrame>),

    /// Serve frames as Prometheus metrics.
    #[cfg(feature = "prometheus")]
    Prometheus(Arc<PrometheusExporter>),
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ahrslink_supervisor::Output;
    ///
    /// let output = Output::file("ahrs-status.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return it with the receiving end.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ahrslink_supervisor::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    /// assert!(rx.try_recv().is_err());
    /// ```
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<StatusFrame>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Create a Prometheus output. The HTTP server starts with the emitter.
    #[cfg(feature = "prometheus")]
    pub fn prometheus(config: PrometheusConfig) -> Self {
        Output::Prometheus(Arc::new(PrometheusExporter::new(config)))
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Output::File(_) => "file",
            Output::Tcp(_) => "tcp",
            Output::Channel(_) => "channel",
            #[cfg(feature = "prometheus")]
            Output::Prometheus(_) => "prometheus",
        }
    }

    /// Emit a frame to this output.
    pub(crate) async fn emit(&self, frame: &StatusFrame) -> std::io::Result<()> {
        match self {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(frame)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Tcp(addr) => {
                use tokio::io::AsyncWriteExt;
                use tokio::net::TcpStream;

                if let Ok(mut stream) = TcpStream::connect(addr).await {
                    let mut line = serde_json::to_vec(frame)?;
                    line.push(b'\n');
                    let _ = stream.write_all(&line).await;
                }
            }
            Output::Channel(tx) => {
                let _ = tx.try_send(*frame);
            }
            #[cfg(feature = "prometheus")]
            Output::Prometheus(exporter) => {
                exporter.record(frame);
            }
        }
        Ok(())
    }
}
