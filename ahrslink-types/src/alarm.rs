//! Alarm levels and keys for the vehicle-wide alarm table.

use core::fmt;

/// Severity of an alarm entry.
///
/// Ordered so that `max()` yields the most severe level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum AlarmLevel {
    /// No fault. Clearing an alarm sets this level.
    #[default]
    #[cfg_attr(feature = "minicbor", n(0))]
    Ok,
    /// Degraded: the link was established and is currently down.
    #[cfg_attr(feature = "minicbor", n(1))]
    Warning,
    /// Not yet proven healthy.
    #[cfg_attr(feature = "minicbor", n(2))]
    Critical,
}

impl AlarmLevel {
    /// Derive the link alarm from the transport's `link_ok` flag.
    ///
    /// Never returns [`AlarmLevel::Critical`]: that level only marks a link
    /// that has not completed a single cycle yet.
    pub const fn from_link_ok(link_ok: bool) -> Self {
        if link_ok {
            AlarmLevel::Ok
        } else {
            AlarmLevel::Warning
        }
    }

    /// Returns a short symbol for display.
    pub const fn symbol(&self) -> &'static str {
        match self {
            AlarmLevel::Ok => "OK",
            AlarmLevel::Warning => "WARN",
            AlarmLevel::Critical => "CRIT",
        }
    }

    /// Numeric severity (0 = OK) for gauges.
    pub const fn severity(&self) -> u8 {
        match self {
            AlarmLevel::Ok => 0,
            AlarmLevel::Warning => 1,
            AlarmLevel::Critical => 2,
        }
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self, AlarmLevel::Ok)
    }
}

impl fmt::Display for AlarmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Key of one entry in the alarm table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlarmKey(&'static str);

impl AlarmKey {
    /// The AHRS communications link.
    pub const AHRS_COMMS: AlarmKey = AlarmKey("AHRSComms");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Name of the alarm, as shown to operators.
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for AlarmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_ok_maps_to_ok_and_down_maps_to_warning() {
        assert_eq!(AlarmLevel::from_link_ok(true), AlarmLevel::Ok);
        assert_eq!(AlarmLevel::from_link_ok(false), AlarmLevel::Warning);
    }

    #[test]
    fn derivation_never_yields_critical() {
        for link_ok in [true, false] {
            assert_ne!(AlarmLevel::from_link_ok(link_ok), AlarmLevel::Critical);
        }
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(AlarmLevel::Ok < AlarmLevel::Warning);
        assert!(AlarmLevel::Warning < AlarmLevel::Critical);
        assert_eq!(
            [AlarmLevel::Warning, AlarmLevel::Critical, AlarmLevel::Ok]
                .into_iter()
                .max(),
            Some(AlarmLevel::Critical)
        );
    }

    #[test]
    fn symbols_and_severity() {
        assert_eq!(AlarmLevel::Ok.symbol(), "OK");
        assert_eq!(AlarmLevel::Warning.symbol(), "WARN");
        assert_eq!(AlarmLevel::Critical.symbol(), "CRIT");
        assert_eq!(AlarmLevel::Critical.severity(), 2);
    }

    #[test]
    fn ahrs_key_name() {
        assert_eq!(AlarmKey::AHRS_COMMS.name(), "AHRSComms");
        assert_eq!(AlarmKey::new("AHRSComms"), AlarmKey::AHRS_COMMS);
        assert_ne!(AlarmKey::new("Attitude"), AlarmKey::AHRS_COMMS);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_uppercase_names() {
        assert_eq!(serde_json::to_string(&AlarmLevel::Warning).unwrap(), "\"WARNING\"");
        assert_eq!(serde_json::to_string(&AlarmLevel::Ok).unwrap(), "\"OK\"");
    }
}
