//! StatusFrame - the telemetry envelope around one published record.

use crate::{AhrsStatus, AlarmLevel, SCHEMA_VERSION};

/// Schema version carried by every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct SchemaVersion {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub major: u32,
    #[cfg_attr(feature = "minicbor", n(1))]
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn current() -> Self {
        Self {
            major: SCHEMA_VERSION,
            minor: 0,
        }
    }

    /// Minor differences are compatible; a different major is not.
    pub fn is_compatible(&self) -> bool {
        self.major == SCHEMA_VERSION
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

/// One supervisor cycle's output as seen by telemetry consumers.
///
/// `status` is the verbatim [`AhrsStatus`] published that cycle; the other
/// fields are metadata added around it.
///
/// # Example
///
/// ```rust
/// use ahrslink_types::{AhrsStatus, AlarmLevel, LinkStatusSnapshot, StatusFrame};
///
/// let status = AhrsStatus::from(LinkStatusSnapshot::down());
/// let frame = StatusFrame::with_timestamp(1, AlarmLevel::Warning, status, 1_703_160_000_000);
///
/// assert_eq!(frame.cycle, 1);
/// assert!(!frame.status.link_running);
/// assert!(frame.version.is_compatible());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct StatusFrame {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when the record was published.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    /// 1-based index of the cycle that produced this record.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub cycle: u64,

    /// Alarm level set by the same cycle.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub alarm: AlarmLevel,

    #[cfg_attr(feature = "minicbor", n(4))]
    pub status: AhrsStatus,
}

impl StatusFrame {
    /// Create a frame stamped with the current wall-clock time.
    #[cfg(feature = "std")]
    pub fn new(cycle: u64, alarm: AlarmLevel, status: AhrsStatus) -> Self {
        Self::with_timestamp(cycle, alarm, status, current_timestamp_ms())
    }

    /// Create a frame with a specific timestamp.
    pub const fn with_timestamp(
        cycle: u64,
        alarm: AlarmLevel,
        status: AhrsStatus,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            version: SchemaVersion::current(),
            timestamp_ms,
            cycle,
            alarm,
            status,
        }
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinkStatusSnapshot;

    fn sample_frame() -> StatusFrame {
        let snapshot = LinkStatusSnapshot::builder()
            .link_ok(true)
            .remote(|c| c.kick_starts(1).crc_errors(12))
            .build();
        StatusFrame::with_timestamp(42, AlarmLevel::Ok, AhrsStatus::from(&snapshot), 1_703_160_000_000)
    }

    #[test]
    fn frame_carries_current_version() {
        let frame = sample_frame();
        assert_eq!(frame.version, SchemaVersion::current());
        assert!(frame.version.is_compatible());
    }

    #[test]
    fn future_major_is_incompatible() {
        let future = SchemaVersion {
            major: SCHEMA_VERSION + 1,
            minor: 0,
        };
        assert!(!future.is_compatible());

        let newer_minor = SchemaVersion {
            major: SCHEMA_VERSION,
            minor: 7,
        };
        assert!(newer_minor.is_compatible());
    }

    #[cfg(feature = "std")]
    #[test]
    fn new_stamps_wall_clock_time() {
        let before = current_timestamp_ms();
        let frame = StatusFrame::new(1, AlarmLevel::Warning, AhrsStatus::from(LinkStatusSnapshot::down()));
        let after = current_timestamp_ms();

        assert!(frame.timestamp_ms >= before);
        assert!(frame.timestamp_ms <= after);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_layout_nests_the_record() {
        let json = serde_json::to_value(sample_frame()).unwrap();
        assert_eq!(json["cycle"], 42);
        assert_eq!(json["alarm"], "OK");
        assert_eq!(json["status"]["AhrsCrcErrors"], 12);
        assert_eq!(json["version"]["major"], SCHEMA_VERSION);

        let parsed: StatusFrame = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, sample_frame());
    }

    #[cfg(feature = "minicbor")]
    #[test]
    fn cbor_frame_decodes() {
        let bytes = minicbor::to_vec(sample_frame()).unwrap();
        let parsed: StatusFrame = minicbor::decode(&bytes).unwrap();
        assert_eq!(parsed, sample_frame());
    }
}
