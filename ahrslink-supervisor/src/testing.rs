//! Scripted transport for driving the supervisor deterministically.
//!
//! Enabled in this crate's own tests and, for downstream crates, with the
//! `testing` feature.

use std::collections::VecDeque;
use std::time::Duration;

use ahrslink_types::LinkStatusSnapshot;

use crate::clock::ManualClock;
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone)]
struct Step {
    status: LinkStatusSnapshot,
    blocks_for: Duration,
    error: Option<TransportError>,
}

/// A transport that plays back a fixed script, one step per exchange.
///
/// Before the first exchange it reports [`LinkStatusSnapshot::down`]. Once
/// the script runs out it keeps reporting the last status it played.
/// Blocking steps advance the attached [`ManualClock`] instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: VecDeque<Step>,
    current: Option<LinkStatusSnapshot>,
    clock: Option<ManualClock>,
    exchanges: u64,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step that completes instantly.
    pub fn then(self, status: LinkStatusSnapshot) -> Self {
        self.push(status, Duration::ZERO, None)
    }

    /// Append a step whose exchange takes `blocks_for`.
    pub fn then_blocking(self, status: LinkStatusSnapshot, blocks_for: Duration) -> Self {
        self.push(status, blocks_for, None)
    }

    /// Append a step whose exchange returns `error`, leaving `status` behind.
    pub fn then_error(self, status: LinkStatusSnapshot, error: TransportError) -> Self {
        self.push(status, Duration::ZERO, Some(error))
    }

    /// Advance `clock` while "blocking" in an exchange.
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Number of exchanges performed so far.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Steps not yet played.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn push(mut self, status: LinkStatusSnapshot, blocks_for: Duration, error: Option<TransportError>) -> Self {
        self.script.push_back(Step {
            status,
            blocks_for,
            error,
        });
        self
    }
}

impl Transport for ScriptedTransport {
    fn exchange(&mut self) -> Result<(), TransportError> {
        self.exchanges += 1;
        let Some(step) = self.script.pop_front() else {
            return Ok(());
        };

        if let Some(clock) = &self.clock {
            clock.advance(step.blocks_for);
        }
        self.current = Some(step.status);

        match step.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn status(&self) -> LinkStatusSnapshot {
        self.current.unwrap_or_else(LinkStatusSnapshot::down)
    }
}
