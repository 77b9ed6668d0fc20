//! The vehicle-wide alarm table.
//!
//! The supervisor never touches a global: it writes through an injected
//! [`AlarmRegistry`] handle owned by the process's composition root.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahrslink_types::{AlarmKey, AlarmLevel};
use parking_lot::RwLock;

/// Write access to the alarm table.
pub trait AlarmRegistry: Send + Sync {
    /// Set the level for `key`.
    fn set(&self, key: AlarmKey, level: AlarmLevel);

    /// Clear the alarm for `key`, leaving it at [`AlarmLevel::Ok`].
    fn clear(&self, key: AlarmKey) {
        self.set(key, AlarmLevel::Ok);
    }

    /// Current level for `key`, or `None` if it was never set.
    fn get(&self, key: AlarmKey) -> Option<AlarmLevel>;
}

impl<T: AlarmRegistry + ?Sized> AlarmRegistry for Arc<T> {
    fn set(&self, key: AlarmKey, level: AlarmLevel) {
        (**self).set(key, level)
    }

    fn clear(&self, key: AlarmKey) {
        (**self).clear(key)
    }

    fn get(&self, key: AlarmKey) -> Option<AlarmLevel> {
        (**self).get(key)
    }
}

/// Thread-safe in-process alarm table.
///
/// # Example
///
/// ```rust
/// use ahrslink_supervisor::{AlarmRegistry, AlarmTable};
/// use ahrslink_types::{AlarmKey, AlarmLevel};
///
/// let table = AlarmTable::new();
/// table.set(AlarmKey::AHRS_COMMS, AlarmLevel::Warning);
/// assert_eq!(table.worst(), AlarmLevel::Warning);
///
/// table.clear(AlarmKey::AHRS_COMMS);
/// assert!(table.active().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct AlarmTable {
    alarms: RwLock<BTreeMap<AlarmKey, AlarmLevel>>,
}

impl AlarmTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry, including cleared ones.
    pub fn snapshot(&self) -> BTreeMap<AlarmKey, AlarmLevel> {
        self.alarms.read().clone()
    }

    /// Entries that are not OK, most severe first.
    pub fn active(&self) -> Vec<(AlarmKey, AlarmLevel)> {
        let mut active: Vec<_> = self
            .alarms
            .read()
            .iter()
            .filter(|(_, level)| !level.is_ok())
            .map(|(key, level)| (*key, *level))
            .collect();
        active.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        active
    }

    /// The most severe level in the table, OK if empty.
    pub fn worst(&self) -> AlarmLevel {
        self.alarms
            .read()
            .values()
            .copied()
            .max()
            .unwrap_or(AlarmLevel::Ok)
    }
}

impl AlarmRegistry for AlarmTable {
    fn set(&self, key: AlarmKey, level: AlarmLevel) {
        self.alarms.write().insert(key, level);
    }

    fn get(&self, key: AlarmKey) -> Option<AlarmLevel> {
        self.alarms.read().get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPS: AlarmKey = AlarmKey::new("GPS");

    #[test]
    fn unset_key_reads_none() {
        let table = AlarmTable::new();
        assert_eq!(table.get(AlarmKey::AHRS_COMMS), None);
        assert_eq!(table.worst(), AlarmLevel::Ok);
    }

    #[test]
    fn clear_sets_ok_rather_than_removing() {
        let table = AlarmTable::new();
        table.set(AlarmKey::AHRS_COMMS, AlarmLevel::Critical);
        table.clear(AlarmKey::AHRS_COMMS);

        assert_eq!(table.get(AlarmKey::AHRS_COMMS), Some(AlarmLevel::Ok));
        assert_eq!(table.snapshot().len(), 1);
    }

    #[test]
    fn active_lists_most_severe_first() {
        let table = AlarmTable::new();
        table.set(GPS, AlarmLevel::Warning);
        table.set(AlarmKey::AHRS_COMMS, AlarmLevel::Critical);
        table.set(AlarmKey::new("Battery"), AlarmLevel::Ok);

        let active = table.active();
        assert_eq!(
            active,
            vec![
                (AlarmKey::AHRS_COMMS, AlarmLevel::Critical),
                (GPS, AlarmLevel::Warning),
            ]
        );
        assert_eq!(table.worst(), AlarmLevel::Critical);
    }

    #[test]
    fn shared_handle_writes_through() {
        let table = Arc::new(AlarmTable::new());
        let registry: Arc<dyn AlarmRegistry> = table.clone();

        registry.set(GPS, AlarmLevel::Warning);
        assert_eq!(table.get(GPS), Some(AlarmLevel::Warning));

        registry.clear(GPS);
        assert_eq!(table.get(GPS), Some(AlarmLevel::Ok));
    }

    #[test]
    fn concurrent_writers_to_distinct_keys() {
        use std::thread;

        let table = Arc::new(AlarmTable::new());
        let names = ["a", "b", "c", "d"];

        let handles: Vec<_> = names
            .into_iter()
            .map(|name| {
                let table = table.clone();
                let key = AlarmKey::new(name);
                thread::spawn(move || {
                    for i in 0..100 {
                        let level = if i % 2 == 0 {
                            AlarmLevel::Warning
                        } else {
                            AlarmLevel::Ok
                        };
                        table.set(key, level);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        // Last write of each writer was OK.
        assert_eq!(table.snapshot().len(), 4);
        assert!(table.active().is_empty());
    }
}
