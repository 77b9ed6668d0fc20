//! Composition root: owns the process-wide tables and wires them together.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahrslink_supervisor::{
    spawn_cycles, AlarmTable, Clock, CycleReport, LinkSupervisor, Output, SharedSettings,
    StatusBoard, SystemClock, TelemetryEmitter, Transport, WatchdogFlag, WatchdogTable,
};
use ahrslink_types::{AlarmKey, StatusFrame};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{AppConfig, ConfigWatcher};
use crate::watchdog::{WatchdogExpired, WatchdogMonitor};

/// Why a finite run ended early.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Watchdog(#[from] WatchdogExpired),

    #[error("failed to spawn supervisor thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("supervisor thread exited without reporting")]
    Lost,
}

/// The process-wide state shared by the supervisor and its observers.
///
/// Exactly one alarm table, watchdog table, settings store and status board
/// exist per process; the supervisor and every consumer get handles to the
/// same instances from here.
#[derive(Debug)]
pub struct App {
    config: AppConfig,
    config_path: Option<PathBuf>,
    period_pinned: bool,
    alarms: Arc<AlarmTable>,
    watchdog: Arc<WatchdogTable>,
    settings: SharedSettings,
    board: Arc<StatusBoard>,
}

impl App {
    /// Create the process state from a validated configuration.
    pub fn new(config: AppConfig) -> Self {
        let settings = SharedSettings::new(config.supervisor.update_period());
        Self {
            config,
            config_path: None,
            period_pinned: false,
            alarms: Arc::new(AlarmTable::new()),
            watchdog: Arc::new(WatchdogTable::new()),
            settings,
            board: Arc::new(StatusBoard::new()),
        }
    }

    /// Remember where the configuration came from so it can be watched.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Keep the configured period fixed even if the config file changes,
    /// e.g. because it was given on the command line.
    pub fn pin_update_period(mut self) -> Self {
        self.period_pinned = true;
        self
    }

    /// The configuration the process started with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Path of the configuration file, if one was given.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// The vehicle-wide alarm table.
    pub fn alarms(&self) -> &Arc<AlarmTable> {
        &self.alarms
    }

    /// The watchdog flag table.
    pub fn watchdog(&self) -> &Arc<WatchdogTable> {
        &self.watchdog
    }

    /// Live settings read by the supervisor every cycle.
    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Where status frames are published.
    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    /// Build the supervisor for `transport` on the system clock.
    pub fn supervisor<T: Transport>(&self, transport: T) -> LinkSupervisor<T, SystemClock> {
        self.supervisor_with_clock(transport, SystemClock)
    }

    /// Build the supervisor with an explicit clock.
    ///
    /// Registers the supervisor's watchdog flag.
    pub fn supervisor_with_clock<T: Transport, C: Clock>(
        &self,
        transport: T,
        clock: C,
    ) -> LinkSupervisor<T, C> {
        self.watchdog.register_flag(WatchdogFlag::AHRS);

        LinkSupervisor::builder(transport)
            .alarms(self.alarms.clone())
            .watchdog(self.watchdog.clone())
            .settings(Arc::new(self.settings.clone()))
            .board(self.board.clone())
            .alarm_key(AlarmKey::AHRS_COMMS)
            .watchdog_flag(WatchdogFlag::AHRS)
            .min_period(self.config.supervisor.min_period())
            .clock(clock)
            .build()
    }

    /// Telemetry emitter for the configured outputs.
    ///
    /// When stdout reporting is enabled the returned receiver yields every
    /// emitted frame.
    pub fn emitter(&self) -> (TelemetryEmitter, Option<mpsc::Receiver<StatusFrame>>) {
        let telemetry = &self.config.telemetry;
        let mut builder = TelemetryEmitter::builder().interval(telemetry.interval());

        if let Some(path) = &telemetry.file {
            builder = builder.output(Output::file(path));
        }
        if let Some(addr) = &telemetry.tcp {
            builder = builder.output(Output::tcp(addr));
        }
        #[cfg(feature = "prometheus")]
        if let Some(addr) = &telemetry.prometheus_addr {
            let mut config = ahrslink_supervisor::PrometheusConfig::builder().listen_addr(addr);
            if let Some(ns) = &telemetry.prometheus_namespace {
                config = config.namespace(ns);
            }
            builder = builder.output(Output::prometheus(config.build()));
        }

        let mut stdout_rx = None;
        if telemetry.stdout {
            let (output, rx) = Output::channel(16);
            builder = builder.output(output);
            stdout_rx = Some(rx);
        }

        (builder.build(), stdout_rx)
    }

    /// Watchdog monitor, unless disabled.
    pub fn watchdog_monitor(&self) -> Option<WatchdogMonitor> {
        self.config
            .watchdog
            .enabled
            .then(|| WatchdogMonitor::new(self.watchdog.clone(), self.config.watchdog.timeout()))
    }

    /// Config file watcher, if the configuration came from a file.
    pub fn config_watcher(&self) -> Option<ConfigWatcher> {
        self.config_path
            .as_ref()
            .map(|path| {
                let watcher =
                    ConfigWatcher::new(path, self.settings.clone(), self.config.watchdog.clone());
                if self.period_pinned {
                    watcher.pin_period()
                } else {
                    watcher
                }
            })
    }

    /// Run `cycles` supervisor cycles on their own thread under the watchdog.
    ///
    /// Returns as soon as the watchdog expires, without waiting for the
    /// supervisor thread; a hung exchange cannot keep the caller alive.
    pub async fn run_cycles<T: Transport + 'static>(
        &self,
        transport: T,
        cycles: usize,
    ) -> Result<Vec<CycleReport>, RunError> {
        let watchdog = self.watchdog_monitor();
        let reports = spawn_cycles(self.supervisor(transport), cycles)?;

        let expired = async move {
            match watchdog {
                Some(monitor) => monitor.run().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            reports = reports => reports.map_err(|_| RunError::Lost),
            expired = expired => Err(expired.into()),
        }
    }
}

/// One-line human summary of a frame.
pub fn summary_line(frame: &StatusFrame) -> String {
    let s = &frame.status;
    format!(
        "#{:<6} {:<4} link={} kick={} ahrs[crc={} retry={} inv={}] op[crc={} retry={} inv={}]",
        frame.cycle,
        frame.alarm.symbol(),
        if s.link_running { "up" } else { "down" },
        s.ahrs_kickstarts,
        s.ahrs_crc_errors,
        s.ahrs_retries,
        s.ahrs_invalid_packets,
        s.op_crc_errors,
        s.op_retries,
        s.op_invalid_packets,
    )
}
