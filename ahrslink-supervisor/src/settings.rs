//! Where the supervisor reads its update period from.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ahrslink_types::UpdatePeriod;

/// Read-only view of the supervisor's configuration.
///
/// Queried at the top of every cycle; implementations must return the
/// current value rather than one cached at construction.
pub trait SettingsSource: Send + Sync {
    /// The period to use for the cycle about to run.
    fn update_period(&self) -> UpdatePeriod;
}

impl<T: SettingsSource + ?Sized> SettingsSource for Arc<T> {
    fn update_period(&self) -> UpdatePeriod {
        (**self).update_period()
    }
}

/// Settings shared between the supervisor and whoever updates them.
///
/// Clones share the same value, so a configuration task can hold one clone
/// and change the period while the supervisor runs.
///
/// # Example
///
/// ```rust
/// use ahrslink_supervisor::{SettingsSource, SharedSettings};
/// use ahrslink_types::UpdatePeriod;
///
/// let settings = SharedSettings::new(UpdatePeriod::from_millis(20));
/// let writer = settings.clone();
///
/// writer.set_update_period(UpdatePeriod::from_millis(50));
/// assert_eq!(settings.update_period().as_millis(), 50);
/// ```
#[derive(Debug, Clone)]
pub struct SharedSettings {
    update_period_ms: Arc<AtomicU32>,
}

impl SharedSettings {
    /// Create settings starting at `period`.
    pub fn new(period: UpdatePeriod) -> Self {
        Self {
            update_period_ms: Arc::new(AtomicU32::new(period.as_millis())),
        }
    }

    /// Replace the update period. Returns the previous one.
    pub fn set_update_period(&self, period: UpdatePeriod) -> UpdatePeriod {
        UpdatePeriod::from_millis(
            self.update_period_ms
                .swap(period.as_millis(), Ordering::AcqRel),
        )
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(UpdatePeriod::DEFAULT)
    }
}

impl SettingsSource for SharedSettings {
    fn update_period(&self) -> UpdatePeriod {
        UpdatePeriod::from_millis(self.update_period_ms.load(Ordering::Acquire))
    }
}
