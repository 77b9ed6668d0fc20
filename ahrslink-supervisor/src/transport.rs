//! The contract the supervisor requires from the byte-level transport.

use std::time::Duration;

use ahrslink_types::LinkStatusSnapshot;
use thiserror::Error;

/// Errors a transport may surface from [`Transport::exchange`].
///
/// Malformed frames, CRC mismatches and dropped bytes are absorbed by the
/// transport and only show up in its counters. These variants cover the
/// cases where a transport still chooses to report a failed exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The exchange did not complete within the transport's bounded wait.
    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),

    /// The transport has declared the link down.
    #[error("link is down")]
    LinkDown,

    /// The underlying device failed.
    #[error("device I/O failed: {0}")]
    Io(String),
}

/// A byte-level link to the AHRS coprocessor.
///
/// Implementations own framing, CRC checking, retries and kickstart
/// recovery. The supervisor only triggers one exchange per cycle and reads
/// the resulting status.
///
/// # Example
///
/// ```rust
/// use ahrslink_supervisor::{Transport, TransportError};
/// use ahrslink_types::LinkStatusSnapshot;
///
/// struct Loopback {
///     exchanges: u32,
/// }
///
/// impl Transport for Loopback {
///     fn exchange(&mut self) -> Result<(), TransportError> {
///         self.exchanges += 1;
///         Ok(())
///     }
///
///     fn status(&self) -> LinkStatusSnapshot {
///         LinkStatusSnapshot::builder().link_ok(self.exchanges > 0).build()
///     }
/// }
/// ```
pub trait Transport: Send {
    /// Perform one full bidirectional exchange for the current cycle.
    ///
    /// May block, but must return within a bounded time that fits one
    /// supervisor period under normal operation.
    fn exchange(&mut self) -> Result<(), TransportError>;

    /// Cumulative counters and link state as of the most recent exchange.
    ///
    /// Must be cheap, non-blocking and free of side effects.
    fn status(&self) -> LinkStatusSnapshot;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self) -> Result<(), TransportError> {
        (**self).exchange()
    }

    fn status(&self) -> LinkStatusSnapshot {
        (**self).status()
    }
}
