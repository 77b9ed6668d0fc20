//! Prometheus exposition format support.
//!
//! Serves the latest status frame as Prometheus text metrics so the AHRS
//! link can be scraped alongside the rest of the vehicle's telemetry.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ahrslink_supervisor::prometheus::PrometheusConfig;
//! use ahrslink_supervisor::{Output, StatusBoard, TelemetryEmitter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PrometheusConfig::builder()
//!         .listen_addr("0.0.0.0:9464")
//!         .namespace("vehicle")
//!         .build();
//!
//!     let board = StatusBoard::new();
//!     let emitter = TelemetryEmitter::builder()
//!         .output(Output::prometheus(config))
//!         .build();
//!
//!     emitter.start(board.subscribe());
//!     // Metrics available at http://localhost:9464/metrics
//! }
//! ```

use std::convert::Infallible;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use ahrslink_types::StatusFrame;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9464";
const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Configuration for the metrics endpoint.
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Address to listen on (e.g., "0.0.0.0:9464")
    pub listen_addr: String,
    /// Path for the metrics endpoint
    pub metrics_path: String,
    /// Optional prefix for all metric names
    pub namespace: Option<String>,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            namespace: None,
        }
    }
}

impl PrometheusConfig {
    /// Create a new builder.
    pub fn builder() -> PrometheusConfigBuilder {
        PrometheusConfigBuilder::default()
    }
}

/// Builder for [`PrometheusConfig`].
#[derive(Debug, Default)]
pub struct PrometheusConfigBuilder {
    listen_addr: Option<String>,
    metrics_path: Option<String>,
    namespace: Option<String>,
}

impl PrometheusConfigBuilder {
    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the metrics path.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    /// Set the metric name prefix.
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(ns.into());
        self
    }

    /// Build the config.
    pub fn build(self) -> PrometheusConfig {
        PrometheusConfig {
            listen_addr: self
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            metrics_path: self
                .metrics_path
                .unwrap_or_else(|| DEFAULT_METRICS_PATH.to_string()),
            namespace: self.namespace,
        }
    }
}

type FrameStorage = Arc<RwLock<Option<StatusFrame>>>;

/// Holds the latest frame and serves it over HTTP.
#[derive(Debug)]
pub struct PrometheusExporter {
    config: PrometheusConfig,
    latest_frame: FrameStorage,
}

impl PrometheusExporter {
    /// Create an exporter. Nothing is served until the server starts.
    pub fn new(config: PrometheusConfig) -> Self {
        Self {
            config,
            latest_frame: Arc::new(RwLock::new(None)),
        }
    }

    /// The exporter's configuration.
    pub fn config(&self) -> &PrometheusConfig {
        &self.config
    }

    /// Replace the frame served on the next scrape.
    pub fn record(&self, frame: &StatusFrame) {
        *self.latest_frame.write() = Some(*frame);
    }

    /// Current metrics in exposition format. Empty until a frame is recorded.
    pub fn render(&self) -> String {
        render_stored(&self.latest_frame, self.config.namespace.as_deref())
    }

    /// Spawn the HTTP server on the current tokio runtime.
    pub fn start_server(&self) -> tokio::task::JoinHandle<()> {
        let config = self.config.clone();
        let storage = self.latest_frame.clone();

        tokio::spawn(async move {
            if let Err(e) = run_server(config, storage).await {
                error!(error = %e, "prometheus server stopped");
            }
        })
    }
}

async fn run_server(
    config: PrometheusConfig,
    storage: FrameStorage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, path = %config.metrics_path, "serving prometheus metrics");

    let config = Arc::new(config);
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let config = config.clone();
        let storage = storage.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let config = config.clone();
                let storage = storage.clone();
                async move { handle_request(req, &config, &storage) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(error = %e, "prometheus connection error");
            }
        });
    }
}

fn handle_request(
    req: Request<hyper::body::Incoming>,
    config: &PrometheusConfig,
    storage: &FrameStorage,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();

    let response = if path == config.metrics_path {
        text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            render_stored(storage, config.namespace.as_deref()),
        )
    } else if path == "/health" || path == "/healthz" {
        text_response(StatusCode::OK, "text/plain", "OK".to_string())
    } else {
        text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string())
    };
    Ok(response)
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn render_stored(storage: &FrameStorage, namespace: Option<&str>) -> String {
    match storage.read().as_ref() {
        Some(frame) => format_prometheus(frame, namespace),
        None => String::new(),
    }
}

/// Format a status frame in Prometheus exposition format.
///
/// Counters carry a `side` label: `ahrs` for errors seen by the AHRS, `op`
/// for errors seen locally.
pub fn format_prometheus(frame: &StatusFrame, namespace: Option<&str>) -> String {
    let prefix = namespace.map(|n| format!("{}_", n)).unwrap_or_default();
    let status = &frame.status;
    let mut out = String::new();

    family(&mut out, &prefix, "ahrslink_link_running", "gauge", "1 if the AHRS link is up");
    sample(&mut out, &prefix, "ahrslink_link_running", "", u64::from(status.link_running));

    family(
        &mut out,
        &prefix,
        "ahrslink_alarm_level",
        "gauge",
        "AHRS comms alarm level (0 ok, 1 warning, 2 critical)",
    );
    sample(&mut out, &prefix, "ahrslink_alarm_level", "", u64::from(frame.alarm.severity()));

    family(&mut out, &prefix, "ahrslink_kickstarts", "counter", "Link restarts performed by the AHRS");
    sample(&mut out, &prefix, "ahrslink_kickstarts", "side=\"ahrs\"", u64::from(status.ahrs_kickstarts));

    family(&mut out, &prefix, "ahrslink_crc_errors", "counter", "Frames rejected for a CRC mismatch");
    sample(&mut out, &prefix, "ahrslink_crc_errors", "side=\"ahrs\"", u64::from(status.ahrs_crc_errors));
    sample(&mut out, &prefix, "ahrslink_crc_errors", "side=\"op\"", u64::from(status.op_crc_errors));

    family(&mut out, &prefix, "ahrslink_retries", "counter", "Frames retransmitted");
    sample(&mut out, &prefix, "ahrslink_retries", "side=\"ahrs\"", u64::from(status.ahrs_retries));
    sample(&mut out, &prefix, "ahrslink_retries", "side=\"op\"", u64::from(status.op_retries));

    family(&mut out, &prefix, "ahrslink_invalid_packets", "counter", "Malformed frames received");
    sample(
        &mut out,
        &prefix,
        "ahrslink_invalid_packets",
        "side=\"ahrs\"",
        u64::from(status.ahrs_invalid_packets),
    );
    sample(
        &mut out,
        &prefix,
        "ahrslink_invalid_packets",
        "side=\"op\"",
        u64::from(status.op_invalid_packets),
    );

    family(&mut out, &prefix, "ahrslink_cycle", "counter", "Supervisor cycle that produced this frame");
    sample(&mut out, &prefix, "ahrslink_cycle", "", frame.cycle);

    family(
        &mut out,
        &prefix,
        "ahrslink_frame_timestamp_seconds",
        "gauge",
        "Unix timestamp of the frame",
    );
    let _ = writeln!(
        out,
        "{}ahrslink_frame_timestamp_seconds {:.3}",
        prefix,
        frame.timestamp_ms as f64 / 1000.0
    );

    out
}

fn family(out: &mut String, prefix: &str, name: &str, kind: &str, help: &str) {
    let _ = writeln!(out, "# HELP {prefix}{name} {help}");
    let _ = writeln!(out, "# TYPE {prefix}{name} {kind}");
}

fn sample(out: &mut String, prefix: &str, name: &str, labels: &str, value: u64) {
    if labels.is_empty() {
        let _ = writeln!(out, "{prefix}{name} {value}");
    } else {
        let _ = writeln!(out, "{prefix}{name}{{{labels}}} {value}");
    }
}
