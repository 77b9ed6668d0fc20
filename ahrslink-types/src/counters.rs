//! Transport counters and the per-cycle link status snapshot.

/// Cumulative error counters for one side of the AHRS link.
///
/// Every counter is monotonically non-decreasing for the lifetime of one
/// transport session. Only re-initialising the transport resets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct LinkCounters {
    /// Number of link recoveries performed after a stalled exchange.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub kick_starts: u32,

    /// Frames rejected because their CRC did not match.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub crc_errors: u32,

    /// Frames that had to be sent again.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub retries: u32,

    /// Frames that were structurally malformed.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub invalid_packets: u32,
}

impl LinkCounters {
    /// Create counters with explicit values.
    pub const fn new(kick_starts: u32, crc_errors: u32, retries: u32, invalid_packets: u32) -> Self {
        Self {
            kick_starts,
            crc_errors,
            retries,
            invalid_packets,
        }
    }

    /// Set the kickstart count.
    pub const fn kick_starts(mut self, value: u32) -> Self {
        self.kick_starts = value;
        self
    }

    /// Set the CRC error count.
    pub const fn crc_errors(mut self, value: u32) -> Self {
        self.crc_errors = value;
        self
    }

    /// Set the retry count.
    pub const fn retries(mut self, value: u32) -> Self {
        self.retries = value;
        self
    }

    /// Set the invalid packet count.
    pub const fn invalid_packets(mut self, value: u32) -> Self {
        self.invalid_packets = value;
        self
    }

    /// Frames that arrived damaged, either by CRC or by structure.
    pub fn total_errors(&self) -> u64 {
        u64::from(self.crc_errors) + u64::from(self.invalid_packets)
    }

    /// Returns true if no counter went backwards relative to `earlier`.
    ///
    /// A `false` result means the transport was re-initialised in between.
    pub fn is_monotonic_since(&self, earlier: &LinkCounters) -> bool {
        self.kick_starts >= earlier.kick_starts
            && self.crc_errors >= earlier.crc_errors
            && self.retries >= earlier.retries
            && self.invalid_packets >= earlier.invalid_packets
    }
}

/// The result of one exchange cycle, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct LinkStatusSnapshot {
    /// True iff the most recent exchange completed without the transport
    /// declaring the link down.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub link_ok: bool,

    /// Counters attributed to the AHRS side of the link.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub remote: LinkCounters,

    /// Counters attributed to this side of the link.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub local: LinkCounters,
}

impl LinkStatusSnapshot {
    /// A link that is down with all counters at zero.
    ///
    /// This is what a transport reports before its first exchange.
    pub const fn down() -> Self {
        Self {
            link_ok: false,
            remote: LinkCounters::new(0, 0, 0, 0),
            local: LinkCounters::new(0, 0, 0, 0),
        }
    }

    /// Create a builder for snapshots.
    pub fn builder() -> LinkStatusBuilder {
        LinkStatusBuilder::default()
    }

    /// Returns true if neither side's counters went backwards.
    pub fn is_monotonic_since(&self, earlier: &LinkStatusSnapshot) -> bool {
        self.remote.is_monotonic_since(&earlier.remote)
            && self.local.is_monotonic_since(&earlier.local)
    }
}

/// Builder for [`LinkStatusSnapshot`].
#[derive(Debug, Default)]
pub struct LinkStatusBuilder {
    snapshot: LinkStatusSnapshot,
}

impl LinkStatusBuilder {
    /// Set whether the link is up.
    pub fn link_ok(mut self, link_ok: bool) -> Self {
        self.snapshot.link_ok = link_ok;
        self
    }

    /// Configure the AHRS-side counters.
    pub fn remote<F>(mut self, f: F) -> Self
    where
        F: FnOnce(LinkCounters) -> LinkCounters,
    {
        self.snapshot.remote = f(self.snapshot.remote);
        self
    }

    /// Configure this side's counters.
    pub fn local<F>(mut self, f: F) -> Self
    where
        F: FnOnce(LinkCounters) -> LinkCounters,
    {
        self.snapshot.local = f(self.snapshot.local);
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> LinkStatusSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_snapshot_is_default_with_link_down() {
        let down = LinkStatusSnapshot::down();
        assert!(!down.link_ok);
        assert_eq!(down, LinkStatusSnapshot::default());
    }

    #[test]
    fn builder_sets_both_sides() {
        let snapshot = LinkStatusSnapshot::builder()
            .link_ok(true)
            .remote(|c| c.kick_starts(2).crc_errors(7))
            .local(|c| c.retries(3).invalid_packets(1))
            .build();

        assert!(snapshot.link_ok);
        assert_eq!(snapshot.remote, LinkCounters::new(2, 7, 0, 0));
        assert_eq!(snapshot.local, LinkCounters::new(0, 0, 3, 1));
    }

    #[test]
    fn total_errors_does_not_overflow() {
        let counters = LinkCounters::new(0, u32::MAX, 0, u32::MAX);
        assert_eq!(counters.total_errors(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn monotonic_when_counters_grow_or_hold() {
        let earlier = LinkCounters::new(1, 5, 5, 0);
        let later = LinkCounters::new(1, 6, 5, 2);
        assert!(later.is_monotonic_since(&earlier));
        assert!(earlier.is_monotonic_since(&earlier));
    }

    #[test]
    fn regression_in_any_counter_breaks_monotonicity() {
        let earlier = LinkStatusSnapshot::builder()
            .remote(|c| c.retries(10))
            .build();
        let restarted = LinkStatusSnapshot::builder()
            .remote(|c| c.retries(0).crc_errors(50))
            .build();
        assert!(!restarted.is_monotonic_since(&earlier));
    }

    #[test]
    fn local_regression_is_detected() {
        let earlier = LinkStatusSnapshot::builder().local(|c| c.crc_errors(3)).build();
        let later = LinkStatusSnapshot::builder().local(|c| c.crc_errors(2)).build();
        assert!(!later.is_monotonic_since(&earlier));
    }
}
