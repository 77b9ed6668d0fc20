//! The link health supervisor.

use std::sync::Arc;
use std::time::Duration;

use ahrslink_types::{AhrsStatus, AlarmKey, AlarmLevel, LinkStatusSnapshot, StatusFrame};
use tracing::{debug, info, warn};

use crate::alarms::AlarmRegistry;
use crate::board::StatusBoard;
use crate::clock::{Clock, SystemClock};
use crate::schedule::DeadlineSchedule;
use crate::settings::SettingsSource;
use crate::task::PeriodicTask;
use crate::transport::{Transport, TransportError};
use crate::watchdog::{Watchdog, WatchdogFlag};

/// Lower bound on the cycle period unless configured otherwise.
pub const DEFAULT_MIN_PERIOD: Duration = Duration::from_millis(1);

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle index.
    pub cycle: u64,
    /// Alarm level written this cycle.
    pub alarm: AlarmLevel,
    /// Record published this cycle.
    pub status: AhrsStatus,
    /// Period used to schedule the next cycle.
    pub period: Duration,
    /// Set if this cycle finished after its deadline.
    pub overrun: Option<Duration>,
    /// Error returned by the exchange, if any. Logged, never acted on.
    pub exchange_error: Option<TransportError>,
}

/// Periodically exchanges data with the AHRS and reports link health.
///
/// Each cycle refreshes the watchdog flag, reads the update period, runs one
/// transport exchange, derives the alarm from `link_ok`, publishes the status
/// record and sleeps until the next absolute deadline.
///
/// The alarm starts at [`AlarmLevel::Critical`] on activation and from then
/// on only alternates between `Ok` and `Warning`. A link that has never
/// completed a cycle is distinguished from one that was up and degraded.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ahrslink_supervisor::{
///     AlarmRegistry, AlarmTable, LinkSupervisor, ManualClock, SharedSettings, StatusBoard,
///     Transport, TransportError, WatchdogTable,
/// };
/// use ahrslink_types::{AlarmKey, AlarmLevel, LinkStatusSnapshot};
///
/// struct AlwaysUp;
///
/// impl Transport for AlwaysUp {
///     fn exchange(&mut self) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn status(&self) -> LinkStatusSnapshot {
///         LinkStatusSnapshot::builder().link_ok(true).build()
///     }
/// }
///
/// let alarms = Arc::new(AlarmTable::new());
/// let board = Arc::new(StatusBoard::new());
///
/// let mut supervisor = LinkSupervisor::builder(AlwaysUp)
///     .alarms(alarms.clone())
///     .watchdog(Arc::new(WatchdogTable::new()))
///     .settings(Arc::new(SharedSettings::default()))
///     .board(board.clone())
///     .clock(ManualClock::new())
///     .build();
///
/// supervisor.activate();
/// assert_eq!(alarms.get(AlarmKey::AHRS_COMMS), Some(AlarmLevel::Critical));
///
/// let report = supervisor.run_once();
/// assert_eq!(report.alarm, AlarmLevel::Ok);
/// assert!(board.latest().unwrap().status.link_running);
/// ```
pub struct LinkSupervisor<T, C = SystemClock> {
    transport: T,
    clock: C,
    alarms: Arc<dyn AlarmRegistry>,
    watchdog: Arc<dyn Watchdog>,
    settings: Arc<dyn SettingsSource>,
    board: Arc<StatusBoard>,
    alarm_key: AlarmKey,
    watchdog_flag: WatchdogFlag,
    min_period: Duration,
    schedule: DeadlineSchedule,
    cycle: u64,
    alarm: Option<AlarmLevel>,
    last_snapshot: Option<LinkStatusSnapshot>,
}

impl<T: Transport> LinkSupervisor<T, SystemClock> {
    /// Start building a supervisor around `transport`.
    pub fn builder(transport: T) -> LinkSupervisorBuilder<T, SystemClock> {
        LinkSupervisorBuilder::new(transport)
    }
}

impl<T: Transport, C: Clock> LinkSupervisor<T, C> {
    /// Mark the link as presumed down.
    ///
    /// Sets the alarm to `Critical` and anchors the schedule. Only the first
    /// call has any effect; [`LinkSupervisor::run_once`] calls it implicitly.
    pub fn activate(&mut self) {
        if self.alarm.is_some() {
            return;
        }
        self.alarms.set(self.alarm_key, AlarmLevel::Critical);
        self.alarm = Some(AlarmLevel::Critical);
        self.schedule.start(self.clock.now());
        info!(key = %self.alarm_key, "link supervisor active, alarm CRITICAL until first exchange");
    }

    /// Run one exchange-and-evaluate cycle, then sleep until the next deadline.
    pub fn run_once(&mut self) -> CycleReport {
        self.activate();

        self.watchdog.update_flag(self.watchdog_flag);
        let period = self.current_period();

        let exchange_error = self.transport.exchange().err();
        if let Some(err) = &exchange_error {
            warn!(cycle = self.cycle + 1, error = %err, "AHRS exchange reported an error");
        }

        let snapshot = self.transport.status();
        let alarm = self.apply_alarm(snapshot.link_ok);
        self.note_counter_regression(&snapshot);

        let status = AhrsStatus::from(&snapshot);
        self.cycle += 1;
        self.board.publish(StatusFrame::new(self.cycle, alarm, status));

        let deadline = self.schedule.next_deadline(period, self.clock.now());
        if let Some(overrun) = deadline.overrun {
            debug!(
                cycle = self.cycle,
                overrun_us = overrun.as_micros() as u64,
                period_ms = period.as_millis() as u64,
                "cycle overran its period, next cycle starts immediately"
            );
        }
        self.clock.sleep_until(deadline.wake_at);

        CycleReport {
            cycle: self.cycle,
            alarm,
            status,
            period,
            overrun: deadline.overrun,
            exchange_error,
        }
    }

    /// Run forever.
    pub fn run(mut self) -> ! {
        loop {
            self.run_once();
        }
    }

    /// Alarm level currently held by this supervisor, `None` before activation.
    pub fn alarm(&self) -> Option<AlarmLevel> {
        self.alarm
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// The transport this supervisor drives.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport, e.g. to reconfigure it between cycles.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn current_period(&self) -> Duration {
        self.settings
            .update_period()
            .to_duration()
            .max(self.min_period)
    }

    fn apply_alarm(&mut self, link_ok: bool) -> AlarmLevel {
        let level = AlarmLevel::from_link_ok(link_ok);
        if level.is_ok() {
            self.alarms.clear(self.alarm_key);
        } else {
            self.alarms.set(self.alarm_key, level);
        }

        let previous = self.alarm.replace(level);
        if previous != Some(level) {
            let from = previous.map_or("NONE", |p| p.symbol());
            match level {
                AlarmLevel::Ok => info!(key = %self.alarm_key, from, "AHRS link up"),
                _ => warn!(key = %self.alarm_key, from, to = %level, "AHRS link down"),
            }
        }
        level
    }

    fn note_counter_regression(&mut self, snapshot: &LinkStatusSnapshot) {
        if let Some(previous) = self.last_snapshot.replace(*snapshot) {
            if !snapshot.is_monotonic_since(&previous) {
                info!(
                    cycle = self.cycle + 1,
                    "AHRS link counters went backwards, transport was re-initialised"
                );
            }
        }
    }
}

impl<T: Transport, C: Clock> PeriodicTask for LinkSupervisor<T, C> {
    type Output = CycleReport;

    fn name(&self) -> &str {
        self.alarm_key.name()
    }

    fn run_once(&mut self) -> CycleReport {
        LinkSupervisor::run_once(self)
    }
}

impl<T, C> std::fmt::Debug for LinkSupervisor<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSupervisor")
            .field("alarm_key", &self.alarm_key)
            .field("watchdog_flag", &self.watchdog_flag)
            .field("cycle", &self.cycle)
            .field("alarm", &self.alarm)
            .finish()
    }
}

/// Builder for [`LinkSupervisor`].
///
/// The alarm registry, watchdog, settings and status board default to fresh
/// private instances; a real process injects its shared ones.
pub struct LinkSupervisorBuilder<T, C> {
    transport: T,
    clock: C,
    alarms: Option<Arc<dyn AlarmRegistry>>,
    watchdog: Option<Arc<dyn Watchdog>>,
    settings: Option<Arc<dyn SettingsSource>>,
    board: Option<Arc<StatusBoard>>,
    alarm_key: AlarmKey,
    watchdog_flag: WatchdogFlag,
    min_period: Duration,
}

impl<T: Transport> LinkSupervisorBuilder<T, SystemClock> {
    /// Create a builder on the system clock with default key and flag.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            clock: SystemClock,
            alarms: None,
            watchdog: None,
            settings: None,
            board: None,
            alarm_key: AlarmKey::AHRS_COMMS,
            watchdog_flag: WatchdogFlag::AHRS,
            min_period: DEFAULT_MIN_PERIOD,
        }
    }
}

impl<T: Transport, C: Clock> LinkSupervisorBuilder<T, C> {
    /// Use a different clock (e.g. [`crate::ManualClock`] in tests).
    pub fn clock<C2: Clock>(self, clock: C2) -> LinkSupervisorBuilder<T, C2> {
        LinkSupervisorBuilder {
            transport: self.transport,
            clock,
            alarms: self.alarms,
            watchdog: self.watchdog,
            settings: self.settings,
            board: self.board,
            alarm_key: self.alarm_key,
            watchdog_flag: self.watchdog_flag,
            min_period: self.min_period,
        }
    }

    /// Set the alarm registry the supervisor writes to.
    pub fn alarms(mut self, alarms: Arc<dyn AlarmRegistry>) -> Self {
        self.alarms = Some(alarms);
        self
    }

    /// Set the watchdog whose flag is refreshed every cycle.
    pub fn watchdog(mut self, watchdog: Arc<dyn Watchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Set where the update period is read from.
    pub fn settings(mut self, settings: Arc<dyn SettingsSource>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set the board the status frames are published on.
    pub fn board(mut self, board: Arc<StatusBoard>) -> Self {
        self.board = Some(board);
        self
    }

    /// Alarm key to write. Defaults to [`AlarmKey::AHRS_COMMS`].
    pub fn alarm_key(mut self, key: AlarmKey) -> Self {
        self.alarm_key = key;
        self
    }

    /// Watchdog flag to refresh. Defaults to [`WatchdogFlag::AHRS`].
    pub fn watchdog_flag(mut self, flag: WatchdogFlag) -> Self {
        self.watchdog_flag = flag;
        self
    }

    /// Shortest allowed period. Configured periods below it are raised to it.
    pub fn min_period(mut self, min_period: Duration) -> Self {
        self.min_period = min_period;
        self
    }

    /// Build the supervisor. It is not activated until the first
    /// [`LinkSupervisor::activate`] or [`LinkSupervisor::run_once`].
    pub fn build(self) -> LinkSupervisor<T, C> {
        LinkSupervisor {
            transport: self.transport,
            clock: self.clock,
            alarms: self
                .alarms
                .unwrap_or_else(|| Arc::new(crate::alarms::AlarmTable::new())),
            watchdog: self
                .watchdog
                .unwrap_or_else(|| Arc::new(crate::watchdog::WatchdogTable::new())),
            settings: self
                .settings
                .unwrap_or_else(|| Arc::new(crate::settings::SharedSettings::default())),
            board: self.board.unwrap_or_default(),
            alarm_key: self.alarm_key,
            watchdog_flag: self.watchdog_flag,
            min_period: self.min_period,
            schedule: DeadlineSchedule::new(),
            cycle: 0,
            alarm: None,
            last_snapshot: None,
        }
    }
}
