//! Process-level watchdog owner.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ahrslink_supervisor::{WatchdogFlag, WatchdogTable};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A watchdog window closed with registered flags still missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogExpired {
    pub missing: Vec<WatchdogFlag>,
    pub timeout: Duration,
}

impl fmt::Display for WatchdogExpired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watchdog expired after {:?}, missing:", self.timeout)?;
        for flag in &self.missing {
            write!(f, " {flag}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WatchdogExpired {}

/// Checks the watchdog table once per timeout window.
///
/// Stands in for the hardware watchdog: a window in which any registered
/// task failed to check in ends the monitor with [`WatchdogExpired`], and
/// the caller is expected to take the process down.
#[derive(Debug)]
pub struct WatchdogMonitor {
    table: Arc<WatchdogTable>,
    timeout: Duration,
}

impl WatchdogMonitor {
    /// Monitor `table`, requiring every registered flag once per `timeout`.
    pub fn new(table: Arc<WatchdogTable>, timeout: Duration) -> Self {
        Self { table, timeout }
    }

    /// Run until a window expires.
    pub async fn run(self) -> WatchdogExpired {
        let start = tokio::time::Instant::now() + self.timeout;
        let mut ticker = tokio::time::interval_at(start, self.timeout);

        loop {
            ticker.tick().await;
            let missing = self.table.missing();
            if self.table.check_and_clear() {
                debug!("watchdog window passed");
                continue;
            }
            error!(
                timeout_ms = self.timeout.as_millis() as u64,
                missing = ?missing,
                "watchdog expired"
            );
            return WatchdogExpired {
                missing,
                timeout: self.timeout,
            };
        }
    }

    /// Run on the current tokio runtime. The handle resolves when a window expires.
    pub fn spawn(self) -> JoinHandle<WatchdogExpired> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahrslink_supervisor::Watchdog;

    fn table() -> Arc<WatchdogTable> {
        let table = Arc::new(WatchdogTable::new());
        table.register_flag(WatchdogFlag::AHRS);
        table
    }

    #[tokio::test(start_paused = true)]
    async fn expires_when_flag_never_updated() {
        let table = table();
        let expired = WatchdogMonitor::new(table, Duration::from_millis(100))
            .run()
            .await;

        assert_eq!(expired.missing, vec![WatchdogFlag::AHRS]);
        assert_eq!(expired.timeout, Duration::from_millis(100));
        assert_eq!(expired.to_string(), "watchdog expired after 100ms, missing: wdg#3");
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_running_while_flag_is_updated() {
        let table = table();
        let updater = {
            let table = table.clone();
            tokio::spawn(async move {
                loop {
                    table.update_flag(WatchdogFlag::AHRS);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        let monitor = WatchdogMonitor::new(table, Duration::from_millis(50));
        let outcome = tokio::time::timeout(Duration::from_millis(500), monitor.run()).await;

        assert!(outcome.is_err(), "watchdog expired while the flag was being updated");
        updater.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn expires_once_updates_stop() {
        let table = table();
        let updater = {
            let table = table.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    table.update_flag(WatchdogFlag::AHRS);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        let started = tokio::time::Instant::now();
        let expired = WatchdogMonitor::new(table, Duration::from_millis(50))
            .spawn()
            .await
            .unwrap();

        assert_eq!(expired.missing, vec![WatchdogFlag::AHRS]);
        assert!(started.elapsed() >= Duration::from_millis(100));
        updater.await.unwrap();
    }
}
