use std::path::PathBuf;
use std::time::Duration;

use ahrslink::{summary_line, App, AppConfig, SimulatedTransport};
use ahrslink_supervisor::{task, AlarmRegistry, CycleReport};
use ahrslink_types::{AlarmKey, StatusFrame};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often the configuration file is checked for changes.
const CONFIG_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "ahrslink")]
#[command(about = "Supervise the link to an AHRS coprocessor and publish its health")]
struct Args {
    /// Configuration file (TOML). AHRSLINK__* environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Supervisor update period in milliseconds
    #[arg(short, long)]
    period_ms: Option<u32>,

    /// Run this many cycles and exit instead of running forever
    #[arg(short = 'n', long)]
    cycles: Option<usize>,

    /// Write the latest status frame to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Send status frames to a TCP endpoint (host:port) as JSON lines
    #[arg(long)]
    tcp: Option<String>,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9464)
    #[cfg(feature = "prometheus")]
    #[arg(long)]
    prometheus: Option<String>,

    /// Do not print status lines to stdout
    #[arg(short, long)]
    quiet: bool,

    /// Log filter used when AHRSLINK_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = load_config(&args)?;
    let mut app = App::new(config);
    if let Some(path) = &args.config {
        app = app.with_config_path(path);
    }
    if args.period_ms.is_some() {
        app = app.pin_update_period();
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("ahrslink-io")
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(run(app, args.cycles))
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_env("AHRSLINK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("invalid configuration in {}", path.display()),
        None => "invalid configuration from environment".to_string(),
    })?;

    if let Some(period) = args.period_ms {
        config.supervisor.update_period_ms = period;
    }
    if let Some(path) = &args.output {
        config.telemetry.file = Some(path.clone());
    }
    if let Some(addr) = &args.tcp {
        config.telemetry.tcp = Some(addr.clone());
    }
    #[cfg(feature = "prometheus")]
    if let Some(addr) = &args.prometheus {
        config.telemetry.prometheus_addr = Some(addr.clone());
    }
    if args.quiet {
        config.telemetry.stdout = false;
    }

    config.validate().context("invalid command line overrides")?;
    Ok(config)
}

async fn run(app: App, cycles: Option<usize>) -> Result<()> {
    let config = app.config().clone();
    info!(
        period_ms = config.supervisor.update_period_ms,
        watchdog_ms = config.watchdog.enabled.then_some(config.watchdog.timeout_ms),
        "starting AHRS link supervisor"
    );

    let (emitter, stdout_rx) = app.emitter();
    let emission = emitter.start(app.board().subscribe());
    if let Some(rx) = stdout_rx {
        tokio::spawn(print_frames(rx));
    }

    if let Some(watcher) = app.config_watcher() {
        tokio::spawn(watcher.run(CONFIG_POLL_INTERVAL));
    }

    let transport = SimulatedTransport::new(config.sim.clone());

    let result = match cycles {
        Some(n) => match app.run_cycles(transport, n).await {
            Ok(reports) => {
                log_summary(&reports);
                emitter.emit_now(&app.board().subscribe()).await;
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        None => {
            let watchdog = app.watchdog_monitor().map(|monitor| monitor.spawn());
            let watchdog_expired = async {
                match watchdog {
                    Some(handle) => handle.await,
                    None => std::future::pending().await,
                }
            };

            task::spawn(app.supervisor(transport)).context("failed to spawn supervisor thread")?;
            tokio::select! {
                expired = watchdog_expired => Err(anyhow::Error::new(expired?)),
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for ctrl-c")?;
                    info!(
                        alarm = ?app.alarms().get(AlarmKey::AHRS_COMMS),
                        "interrupted, shutting down"
                    );
                    Ok(())
                }
            }
        }
    };

    emission.stop();
    result
}

async fn print_frames(mut rx: mpsc::Receiver<StatusFrame>) {
    while let Some(frame) = rx.recv().await {
        println!("{}", summary_line(&frame));
    }
}

fn log_summary(reports: &[CycleReport]) {
    let Some(last) = reports.last() else {
        warn!("no cycles were run");
        return;
    };
    let overruns = reports.iter().filter(|r| r.overrun.is_some()).count();
    let exchange_errors = reports.iter().filter(|r| r.exchange_error.is_some()).count();
    info!(
        cycles = last.cycle,
        alarm = %last.alarm,
        link_running = last.status.link_running,
        overruns,
        exchange_errors,
        "finished"
    );
}
