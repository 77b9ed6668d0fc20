//! The supervisor's update period.

use core::time::Duration;

/// Cadence of the supervisor loop, in milliseconds.
///
/// Supplied by configuration and read fresh at the top of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(transparent))]
pub struct UpdatePeriod(#[cfg_attr(feature = "minicbor", n(0))] pub u32);

impl UpdatePeriod {
    /// 50 Hz.
    pub const DEFAULT: UpdatePeriod = UpdatePeriod(20);

    /// Create a period of `millis` milliseconds.
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Period in milliseconds.
    pub const fn as_millis(&self) -> u32 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert to a standard Duration.
    pub const fn to_duration(&self) -> Duration {
        Duration::from_millis(self.0 as u64)
    }
}

impl Default for UpdatePeriod {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<UpdatePeriod> for Duration {
    fn from(p: UpdatePeriod) -> Self {
        p.to_duration()
    }
}

/// Saturates at `u32::MAX` milliseconds (about 49 days).
impl From<Duration> for UpdatePeriod {
    fn from(d: Duration) -> Self {
        Self(u32::try_from(d.as_millis()).unwrap_or(u32::MAX))
    }
}
