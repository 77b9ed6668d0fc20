//! Periodic emission of the latest status frame to configured outputs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::board::StatusReader;
use crate::output::Output;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Sends the latest published [`ahrslink_types::StatusFrame`] to every
/// configured output on a fixed interval.
///
/// The emitter only reads from the status board; nothing it does feeds back
/// into the supervisor.
///
/// # Example
///
/// ```rust,no_run
/// use ahrslink_supervisor::{Output, StatusBoard, TelemetryEmitter};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let board = StatusBoard::new();
///
///     let emitter = TelemetryEmitter::builder()
///         .output(Output::file("ahrs-status.json"))
///         .interval(Duration::from_millis(500))
///         .build();
///
///     let handle = emitter.start(board.subscribe());
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     handle.stop();
/// }
/// ```
#[derive(Debug)]
pub struct TelemetryEmitter {
    outputs: Arc<Vec<Output>>,
    interval: Duration,
}

impl TelemetryEmitter {
    /// An emitter with no outputs and a one second interval.
    pub fn new() -> Self {
        Self {
            outputs: Arc::new(Vec::new()),
            interval: DEFAULT_INTERVAL,
        }
    }

    /// Create a builder.
    pub fn builder() -> TelemetryEmitterBuilder {
        TelemetryEmitterBuilder::new()
    }

    /// Time between emissions.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of configured outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Start background emission on the current tokio runtime.
    ///
    /// Ticks before the first frame is published emit nothing. Prometheus
    /// outputs also start their HTTP server here.
    pub fn start(&self, reader: StatusReader) -> EmissionHandle {
        use tokio::sync::watch;

        let (stop_tx, stop_rx) = watch::channel(false);
        let outputs = self.outputs.clone();
        let interval = self.interval;

        #[cfg(feature = "prometheus")]
        for output in outputs.iter() {
            if let Output::Prometheus(exporter) = output {
                exporter.start_server();
            }
        }

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            let mut stop_rx = stop_rx;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        emit_latest(&outputs, &reader).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            debug!("telemetry emission stopped");
                            break;
                        }
                    }
                }
            }
        });

        EmissionHandle { stop_tx }
    }

    /// Emit the latest frame to all outputs immediately.
    ///
    /// Returns false if nothing has been published yet.
    pub async fn emit_now(&self, reader: &StatusReader) -> bool {
        emit_latest(&self.outputs, reader).await
    }
}

impl Default for TelemetryEmitter {
    fn default() -> Self {
        Self::new()
    }
}

async fn emit_latest(outputs: &[Output], reader: &StatusReader) -> bool {
    let Some(frame) = reader.latest() else {
        return false;
    };
    for output in outputs {
        if let Err(e) = output.emit(&frame).await {
            warn!(output = output.kind(), error = %e, "failed to emit status frame");
        }
    }
    true
}

/// Builder for [`TelemetryEmitter`].
#[derive(Debug, Default)]
pub struct TelemetryEmitterBuilder {
    outputs: Vec<Output>,
    interval: Option<Duration>,
}

impl TelemetryEmitterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output. Frames go to every output added.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Emission interval. Defaults to one second; raised to at least 1 ms.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Build the emitter.
    pub fn build(self) -> TelemetryEmitter {
        TelemetryEmitter {
            outputs: Arc::new(self.outputs),
            interval: self.interval.unwrap_or(DEFAULT_INTERVAL).max(MIN_INTERVAL),
        }
    }
}

/// Handle for background emission.
///
/// Call [`EmissionHandle::stop`], or drop the handle, to stop emitting.
#[derive(Debug)]
pub struct EmissionHandle {
    stop_tx: tokio::sync::watch::Sender<bool>,
}

impl EmissionHandle {
    /// Stop background emission.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}
