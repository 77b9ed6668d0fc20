//! Status board: the single publication point for the latest status frame.
//!
//! Frames are swapped in whole through a `tokio::sync::watch` channel, so a
//! reader sees either the previous frame or the new one, never a mix.

use ahrslink_types::StatusFrame;
use tokio::sync::watch;

/// Holds the latest published [`StatusFrame`].
///
/// Empty until the supervisor completes its first cycle: nothing is
/// published that the transport did not report.
///
/// # Example
///
/// ```rust
/// use ahrslink_supervisor::StatusBoard;
/// use ahrslink_types::{AhrsStatus, AlarmLevel, LinkStatusSnapshot, StatusFrame};
///
/// let board = StatusBoard::new();
/// let reader = board.subscribe();
/// assert!(reader.latest().is_none());
///
/// let status = AhrsStatus::from(LinkStatusSnapshot::down());
/// board.publish(StatusFrame::with_timestamp(1, AlarmLevel::Warning, status, 0));
///
/// assert_eq!(reader.latest().map(|f| f.cycle), Some(1));
/// ```
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<Option<StatusFrame>>,
}

impl StatusBoard {
    /// Create an empty board. Readers see `None` until the first publish.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the published frame.
    ///
    /// Succeeds whether or not anyone is subscribed.
    pub fn publish(&self, frame: StatusFrame) {
        self.tx.send_replace(Some(frame));
    }

    /// The latest frame, if any cycle has completed.
    pub fn latest(&self) -> Option<StatusFrame> {
        *self.tx.borrow()
    }

    /// Create a reader that can observe the board from any thread or task.
    pub fn subscribe(&self) -> StatusReader {
        StatusReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live readers.
    pub fn reader_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Read handle for a [`StatusBoard`].
#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<Option<StatusFrame>>,
}

impl StatusReader {
    /// The latest frame, without marking it as seen.
    pub fn latest(&self) -> Option<StatusFrame> {
        *self.rx.borrow()
    }

    /// Returns true if a frame was published since this reader last
    /// consumed one via [`StatusReader::changed`] or [`StatusReader::take_if_changed`].
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Non-blocking: the latest frame if it is new to this reader.
    pub fn take_if_changed(&mut self) -> Option<StatusFrame> {
        if self.has_changed() {
            *self.rx.borrow_and_update()
        } else {
            None
        }
    }

    /// Wait for the next publication.
    ///
    /// Returns `None` once the board has been dropped.
    pub async fn changed(&mut self) -> Option<StatusFrame> {
        self.rx.changed().await.ok()?;
        *self.rx.borrow_and_update()
    }
}
