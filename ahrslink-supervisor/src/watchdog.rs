//! Liveness flags for the process watchdog.
//!
//! Each periodic task owns one flag and sets it once per cycle. The watchdog
//! owner checks periodically that every registered flag was set since the
//! previous check; if one was not, the process is considered hung.

use std::fmt;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

/// One bit in the watchdog flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchdogFlag(u8);

impl WatchdogFlag {
    /// Slot of the AHRS communications task.
    pub const AHRS: WatchdogFlag = WatchdogFlag(3);

    /// Number of available slots.
    pub const SLOTS: u8 = 16;

    /// Create a flag for bit `slot`. Returns `None` past [`Self::SLOTS`].
    pub const fn new(slot: u8) -> Option<Self> {
        if slot < Self::SLOTS {
            Some(Self(slot))
        } else {
            None
        }
    }

    /// Bit index of this flag.
    pub const fn slot(&self) -> u8 {
        self.0
    }

    const fn mask(&self) -> u16 {
        1 << self.0
    }
}

impl fmt::Display for WatchdogFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wdg#{}", self.0)
    }
}

/// Per-cycle "I am alive" signal.
pub trait Watchdog: Send + Sync {
    /// Mark `flag` as updated for the current watchdog window.
    fn update_flag(&self, flag: WatchdogFlag);
}

impl<T: Watchdog + ?Sized> Watchdog for Arc<T> {
    fn update_flag(&self, flag: WatchdogFlag) {
        (**self).update_flag(flag)
    }
}

/// Lock-free table of registered and pending watchdog flags.
///
/// # Example
///
/// ```rust
/// use ahrslink_supervisor::{Watchdog, WatchdogFlag, WatchdogTable};
///
/// let table = WatchdogTable::new();
/// table.register_flag(WatchdogFlag::AHRS);
///
/// assert!(!table.check_and_clear()); // nothing updated yet
/// table.update_flag(WatchdogFlag::AHRS);
/// assert!(table.check_and_clear());
/// assert!(!table.check_and_clear()); // flags were cleared by the check
/// ```
#[derive(Debug, Default)]
pub struct WatchdogTable {
    registered: AtomicU16,
    pending: AtomicU16,
    updates: AtomicU64,
}

impl WatchdogTable {
    /// Create a table with no registered flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flag. Returns false if it was already registered.
    pub fn register_flag(&self, flag: WatchdogFlag) -> bool {
        let previous = self.registered.fetch_or(flag.mask(), Ordering::AcqRel);
        previous & flag.mask() == 0
    }

    /// Whether `flag` takes part in the check.
    pub fn is_registered(&self, flag: WatchdogFlag) -> bool {
        self.registered.load(Ordering::Acquire) & flag.mask() != 0
    }

    /// Returns true iff every registered flag was updated since the last
    /// check, and starts a new window by clearing the pending flags.
    ///
    /// With no registered flags there is nothing to wait for and this
    /// returns true.
    ///
    /// Taking the window is a single atomic swap of the registered bits, so
    /// an update that lands during the check counts toward the next window.
    pub fn check_and_clear(&self) -> bool {
        let registered = self.registered.load(Ordering::Acquire);
        let seen = self.pending.fetch_and(!registered, Ordering::AcqRel) & registered;
        if seen == registered {
            return true;
        }
        // Failed window: flags that did check in stay pending.
        self.pending.fetch_or(seen, Ordering::AcqRel);
        false
    }

    /// Registered flags that have not been updated in the current window.
    pub fn missing(&self) -> Vec<WatchdogFlag> {
        let registered = self.registered.load(Ordering::Acquire);
        let pending = self.pending.load(Ordering::Acquire);
        let missing = registered & !pending;
        (0..WatchdogFlag::SLOTS)
            .map(WatchdogFlag)
            .filter(|flag| missing & flag.mask() != 0)
            .collect()
    }

    /// Total accepted updates since creation.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

impl Watchdog for WatchdogTable {
    fn update_flag(&self, flag: WatchdogFlag) {
        if !self.is_registered(flag) {
            debug!(%flag, "ignoring update for unregistered watchdog flag");
            return;
        }
        self.pending.fetch_or(flag.mask(), Ordering::AcqRel);
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
}
