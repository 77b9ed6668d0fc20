//! Application configuration.
//!
//! Loaded from an optional TOML file, then overridden by `AHRSLINK__*`
//! environment variables (double underscore separates sections, e.g.
//! `AHRSLINK__SUPERVISOR__UPDATE_PERIOD_MS=50`).
//!
//! ```toml
//! [supervisor]
//! update_period_ms = 20
//!
//! [watchdog]
//! timeout_ms = 250
//!
//! [telemetry]
//! interval_ms = 1000
//! file = "ahrs-status.json"
//!
//! [sim]
//! lost_frame_every = 50
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use ahrslink_supervisor::SharedSettings;
use ahrslink_types::UpdatePeriod;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "AHRSLINK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("watchdog timeout ({timeout_ms} ms) must be longer than the update period ({period_ms} ms)")]
    WatchdogTooShort { timeout_ms: u64, period_ms: u32 },

    #[error("telemetry interval must be greater than zero")]
    ZeroTelemetryInterval,
}

/// Everything the `ahrslink` process can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub supervisor: SupervisorConfig,
    pub watchdog: WatchdogConfig,
    pub telemetry: TelemetryConfig,
    pub sim: SimConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Cycle period. May be changed at runtime through the config file.
    pub update_period_ms: u32,
    /// Periods below this are raised to it.
    pub min_period_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            update_period_ms: UpdatePeriod::DEFAULT.as_millis(),
            min_period_ms: 1,
        }
    }
}

impl SupervisorConfig {
    /// Configured period as an [`UpdatePeriod`].
    pub fn update_period(&self) -> UpdatePeriod {
        UpdatePeriod::from_millis(self.update_period_ms)
    }

    pub fn min_period(&self) -> Duration {
        Duration::from_millis(self.min_period_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub enabled: bool,
    /// Every registered flag must be updated within this window.
    pub timeout_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 250,
        }
    }
}

impl WatchdogConfig {
    /// Length of one watchdog window.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject a period this watchdog would flag as a hang.
    pub fn check_period(&self, period: UpdatePeriod) -> Result<(), ConfigError> {
        let period_ms = period.as_millis();
        if self.enabled && self.timeout_ms <= u64::from(period_ms) {
            return Err(ConfigError::WatchdogTooShort {
                timeout_ms: self.timeout_ms,
                period_ms,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub interval_ms: u64,
    /// JSON file overwritten with the latest status frame.
    pub file: Option<PathBuf>,
    /// TCP endpoint receiving newline-delimited JSON frames.
    pub tcp: Option<String>,
    /// Listen address for the Prometheus endpoint.
    pub prometheus_addr: Option<String>,
    pub prometheus_namespace: Option<String>,
    /// Print a one-line summary of each frame to stdout.
    pub stdout: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            file: None,
            tcp: None,
            prometheus_addr: None,
            prometheus_namespace: None,
            stdout: true,
        }
    }
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Fault injection for the simulated AHRS link. Zero disables a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Every Nth response from the AHRS is lost and retried locally.
    pub lost_frame_every: u32,
    /// Every Nth request arrives at the AHRS corrupted and is retried.
    pub crc_error_every: u32,
    /// Every Nth response fails to parse locally.
    pub invalid_packet_every: u32,
    /// Exchange index at which a full outage starts.
    pub outage_at: u64,
    /// Number of exchanges the outage lasts.
    pub outage_len: u64,
    /// Consecutive failed exchanges before the link is declared down.
    pub losses_before_down: u32,
    /// Time each exchange spends on the wire.
    pub latency_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            lost_frame_every: 0,
            crc_error_every: 0,
            invalid_packet_every: 0,
            outage_at: 0,
            outage_len: 0,
            losses_before_down: 3,
            latency_ms: 0,
        }
    }
}

impl AppConfig {
    /// Load from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Parse a TOML string without consulting the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would trip the watchdog in normal operation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watchdog.check_period(self.supervisor.update_period())?;
        if self.telemetry.interval_ms == 0 {
            return Err(ConfigError::ZeroTelemetryInterval);
        }
        Ok(())
    }
}

/// Applies update-period changes from the config file while the supervisor runs.
///
/// Polls the file's modification time; a changed, valid file updates the
/// shared settings, which the supervisor picks up on its next cycle. Invalid
/// edits are logged and ignored.
///
/// Only `update_period_ms` is live. The new period is checked against the
/// watchdog the process is actually running with, not the one in the file.
/// A period pinned on the command line is never replaced.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    settings: SharedSettings,
    watchdog: WatchdogConfig,
    period_pinned: bool,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Watch `path`, validating periods against the running `watchdog`.
    pub fn new(path: impl Into<PathBuf>, settings: SharedSettings, watchdog: WatchdogConfig) -> Self {
        let path = path.into();
        let last_modified = modified_time(&path);
        Self {
            path,
            settings,
            watchdog,
            period_pinned: false,
            last_modified,
        }
    }

    /// Keep the current period regardless of file edits.
    pub fn pin_period(mut self) -> Self {
        self.period_pinned = true;
        self
    }

    /// The watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the file once. Returns the new period if one was applied.
    pub fn poll(&mut self) -> Option<UpdatePeriod> {
        let current = modified_time(&self.path);
        let changed = match (self.last_modified, current) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(last), Some(current)) => current != last,
        };
        if !changed {
            return None;
        }
        self.last_modified = current;

        if self.period_pinned {
            debug!(path = %self.path.display(), "configuration changed, update period pinned");
            return None;
        }

        let period = match self.read_period() {
            Ok(period) => period,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring invalid configuration change");
                return None;
            }
        };

        let previous = self.settings.set_update_period(period);
        if previous == period {
            debug!(path = %self.path.display(), "configuration touched, update period unchanged");
            return None;
        }
        info!(
            from_ms = previous.as_millis(),
            to_ms = period.as_millis(),
            "update period changed"
        );
        Some(period)
    }

    fn read_period(&self) -> Result<UpdatePeriod, ConfigError> {
        let period = AppConfig::read(Some(&self.path))?.supervisor.update_period();
        self.watchdog.check_period(period)?;
        Ok(period)
    }

    /// Poll every `interval` until the task is dropped.
    pub async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.poll();
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahrslink_supervisor::SettingsSource;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.supervisor.update_period_ms, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [supervisor]
            update_period_ms = 50

            [telemetry]
            file = "out.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.supervisor.update_period_ms, 50);
        assert_eq!(config.supervisor.min_period_ms, 1);
        assert_eq!(config.watchdog, WatchdogConfig::default());
        assert_eq!(config.telemetry.file, Some(PathBuf::from("out.json")));
        assert_eq!(config.telemetry.interval_ms, 1000);
    }

    #[test]
    fn sim_section_parses() {
        let config = AppConfig::from_toml(
            r#"
            [sim]
            lost_frame_every = 7
            outage_at = 100
            outage_len = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.sim.lost_frame_every, 7);
        assert_eq!(config.sim.outage_at, 100);
        assert_eq!(config.sim.outage_len, 10);
        assert_eq!(config.sim.losses_before_down, 3);
    }

    #[test]
    fn watchdog_must_outlast_the_period() {
        let err = AppConfig::from_toml(
            r#"
            [supervisor]
            update_period_ms = 300
            "#,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::WatchdogTooShort {
                timeout_ms: 250,
                period_ms: 300
            }
        ));
    }

    #[test]
    fn disabled_watchdog_skips_timeout_check() {
        let config = AppConfig::from_toml(
            r#"
            [supervisor]
            update_period_ms = 300

            [watchdog]
            enabled = false
            "#,
        );
        assert!(config.is_ok());
    }

    #[test]
    fn zero_telemetry_interval_rejected() {
        let err = AppConfig::from_toml("[telemetry]\ninterval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTelemetryInterval));
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[watchdog]\ntimeout_ms = 400").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.watchdog.timeout_ms, 400);
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[supervisor]\nupdate_period_ms = \"fast\"").unwrap();

        assert!(matches!(
            AppConfig::load(Some(file.path())),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn watcher_applies_changed_period() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[supervisor]\nupdate_period_ms = 20").unwrap();

        let settings = SharedSettings::default();
        let mut watcher = ConfigWatcher::new(file.path(), settings.clone(), WatchdogConfig::default());
        assert_eq!(watcher.poll(), None);

        rewrite(&mut file, "[supervisor]\nupdate_period_ms = 40\n");

        assert_eq!(watcher.poll(), Some(UpdatePeriod::from_millis(40)));
        assert_eq!(settings.update_period().as_millis(), 40);
        assert_eq!(watcher.poll(), None);
    }

    #[test]
    fn watcher_ignores_invalid_edit() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[supervisor]\nupdate_period_ms = 20").unwrap();

        let settings = SharedSettings::default();
        let mut watcher = ConfigWatcher::new(file.path(), settings.clone(), WatchdogConfig::default());

        // Longer than the default watchdog timeout.
        rewrite(&mut file, "[supervisor]\nupdate_period_ms = 900\n");

        assert_eq!(watcher.poll(), None);
        assert_eq!(settings.update_period().as_millis(), 20);
    }

    #[test]
    fn pinned_period_survives_file_touch() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[supervisor]\nupdate_period_ms = 20").unwrap();

        let settings = SharedSettings::new(UpdatePeriod::from_millis(10));
        let mut watcher =
            ConfigWatcher::new(file.path(), settings.clone(), WatchdogConfig::default()).pin_period();

        rewrite(&mut file, "[supervisor]\nupdate_period_ms = 20\n");
        assert_eq!(watcher.poll(), None);
        assert_eq!(settings.update_period().as_millis(), 10);

        rewrite(&mut file, "[supervisor]\nupdate_period_ms = 40\n");
        assert_eq!(watcher.poll(), None);
        assert_eq!(settings.update_period().as_millis(), 10);
    }

    #[test]
    fn period_is_checked_against_running_watchdog() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[supervisor]\nupdate_period_ms = 20").unwrap();

        let settings = SharedSettings::default();
        let running = WatchdogConfig {
            enabled: true,
            timeout_ms: 250,
        };
        let mut watcher = ConfigWatcher::new(file.path(), settings.clone(), running);

        // Valid on its own, but the live monitor still uses 250 ms.
        rewrite(
            &mut file,
            "[supervisor]\nupdate_period_ms = 300\n\n[watchdog]\ntimeout_ms = 400\n",
        );
        assert_eq!(watcher.poll(), None);
        assert_eq!(settings.update_period().as_millis(), 20);

        rewrite(
            &mut file,
            "[supervisor]\nupdate_period_ms = 200\n\n[watchdog]\ntimeout_ms = 100\n",
        );
        assert_eq!(watcher.poll(), Some(UpdatePeriod::from_millis(200)));
    }

    #[test]
    fn watcher_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = ConfigWatcher::new(
            dir.path().join("absent.toml"),
            SharedSettings::default(),
            WatchdogConfig::default(),
        );
        assert_eq!(watcher.poll(), None);
    }

    fn rewrite(file: &mut NamedTempFile, content: &str) {
        let before = modified_time(file.path());
        // Some filesystems have coarse mtime resolution.
        loop {
            std::fs::write(file.path(), content).unwrap();
            if modified_time(file.path()) != before {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}
