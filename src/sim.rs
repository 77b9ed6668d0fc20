//! A simulated AHRS link.
//!
//! Stands in for the real serial transport when no coprocessor is attached.
//! Faults are injected on a fixed schedule so runs are reproducible.

use std::time::Duration;

use ahrslink_supervisor::{Transport, TransportError};
use ahrslink_types::{LinkCounters, LinkStatusSnapshot};
use tracing::{debug, trace};

use crate::config::SimConfig;

/// Deterministic in-process replacement for the AHRS transport.
///
/// Each call to [`Transport::exchange`] is one request/response round trip:
///
/// - a lost response is retried locally (`op` retries)
/// - a corrupted request is rejected by the AHRS (`ahrs` CRC error and retry)
/// - an unparseable response counts as a local invalid packet
///
/// During an outage no exchange succeeds. After `losses_before_down`
/// consecutive failures the link is reported down; the first successful
/// exchange afterwards counts as a kickstart and brings it back up.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    config: SimConfig,
    exchanges: u64,
    consecutive_losses: u32,
    link_ok: bool,
    ever_up: bool,
    remote: LinkCounters,
    local: LinkCounters,
}

impl SimulatedTransport {
    /// Create a link that starts down with zero counters.
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            exchanges: 0,
            consecutive_losses: 0,
            link_ok: false,
            ever_up: false,
            remote: LinkCounters::default(),
            local: LinkCounters::default(),
        }
    }

    /// Number of exchanges attempted so far.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    fn in_outage(&self, index: u64) -> bool {
        let start = self.config.outage_at;
        self.config.outage_len > 0 && index >= start && index < start + self.config.outage_len
    }

    fn record_loss(&mut self) {
        self.consecutive_losses = self.consecutive_losses.saturating_add(1);
        if self.link_ok && self.consecutive_losses >= self.config.losses_before_down.max(1) {
            self.link_ok = false;
            debug!(exchange = self.exchanges, "simulated link declared down");
        }
    }

    fn record_success(&mut self) {
        if !self.link_ok {
            // The first sync is not a restart.
            if self.ever_up {
                self.remote.kick_starts = self.remote.kick_starts.saturating_add(1);
            }
            self.link_ok = true;
            self.ever_up = true;
            debug!(exchange = self.exchanges, kickstarts = self.remote.kick_starts, "simulated link up");
        }
        self.consecutive_losses = 0;
    }
}

fn every(n: u32, index: u64) -> bool {
    n > 0 && index % u64::from(n) == 0
}

fn bump(counter: &mut u32) {
    *counter = counter.saturating_add(1);
}

impl Transport for SimulatedTransport {
    fn exchange(&mut self) -> Result<(), TransportError> {
        self.exchanges += 1;
        let index = self.exchanges;

        if self.config.latency_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.latency_ms));
        }

        if self.in_outage(index) {
            bump(&mut self.local.retries);
            self.record_loss();
            trace!(exchange = index, "no response from AHRS");
            return Err(TransportError::Timeout(Duration::from_millis(
                self.config.latency_ms,
            )));
        }

        if every(self.config.crc_error_every, index) {
            bump(&mut self.remote.crc_errors);
            bump(&mut self.remote.retries);
        }
        if every(self.config.lost_frame_every, index) {
            bump(&mut self.local.retries);
        }
        if every(self.config.invalid_packet_every, index) {
            bump(&mut self.local.invalid_packets);
            bump(&mut self.local.retries);
        }

        self.record_success();
        Ok(())
    }

    fn status(&self) -> LinkStatusSnapshot {
        LinkStatusSnapshot {
            link_ok: self.link_ok,
            remote: self.remote,
            local: self.local,
        }
    }
}
