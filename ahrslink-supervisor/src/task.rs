//! Periodic task abstraction.
//!
//! A periodic task does one unit of work per call and is responsible for its
//! own pacing. Drivers here decide only how often and on which thread it runs.

use std::io;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;
use tracing::info;

/// A unit of work that runs once per period.
pub trait PeriodicTask: Send {
    /// Per-cycle result.
    type Output;

    /// Name used for the driver thread and in logs.
    fn name(&self) -> &str;

    /// Run one cycle, including the wait until the next one is due.
    fn run_once(&mut self) -> Self::Output;
}

/// Drive `task` forever on the current thread.
pub fn run_forever<T: PeriodicTask>(mut task: T) -> ! {
    info!(task = task.name(), "periodic task started");
    loop {
        task.run_once();
    }
}

/// Run exactly `cycles` cycles and collect their outputs.
///
/// # Example
///
/// ```rust
/// use ahrslink_supervisor::{run_cycles, PeriodicTask};
///
/// struct Counter(u32);
///
/// impl PeriodicTask for Counter {
///     type Output = u32;
///     fn name(&self) -> &str {
///         "counter"
///     }
///     fn run_once(&mut self) -> u32 {
///         self.0 += 1;
///         self.0
///     }
/// }
///
/// let mut task = Counter(0);
/// assert_eq!(run_cycles(&mut task, 3), vec![1, 2, 3]);
/// ```
pub fn run_cycles<T: PeriodicTask>(task: &mut T, cycles: usize) -> Vec<T::Output> {
    (0..cycles).map(|_| task.run_once()).collect()
}

/// Run `task` forever on a dedicated, named OS thread.
///
/// Periodic tasks block between cycles, so they must not share a thread with
/// an async runtime.
pub fn spawn<T: PeriodicTask + 'static>(task: T) -> io::Result<JoinHandle<()>> {
    let name = task.name().to_string();
    thread::Builder::new().name(name).spawn(move || {
        run_forever(task);
    })
}

/// Run `cycles` cycles on a dedicated, named OS thread.
///
/// The outputs arrive on the returned receiver once the last cycle ends. The
/// thread is detached: dropping the receiver does not wait for it, so a
/// caller can give up on a hung task and exit.
pub fn spawn_cycles<T>(mut task: T, cycles: usize) -> io::Result<oneshot::Receiver<Vec<T::Output>>>
where
    T: PeriodicTask + 'static,
    T::Output: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let name = task.name().to_string();
    thread::Builder::new().name(name).spawn(move || {
        let _ = tx.send(run_cycles(&mut task, cycles));
    })?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Ticker {
        ticks: Arc<AtomicU32>,
    }

    impl PeriodicTask for Ticker {
        type Output = u32;

        fn name(&self) -> &str {
            "ticker"
        }

        fn run_once(&mut self) -> u32 {
            thread::sleep(Duration::from_millis(1));
            self.ticks.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    #[test]
    fn run_cycles_runs_exactly_n() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut task = Ticker {
            ticks: ticks.clone(),
        };

        let outputs = run_cycles(&mut task, 4);

        assert_eq!(outputs, vec![1, 2, 3, 4]);
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn run_cycles_zero_does_nothing() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut task = Ticker {
            ticks: ticks.clone(),
        };
        assert!(run_cycles(&mut task, 0).is_empty());
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn spawn_uses_task_name_and_keeps_running() {
        let ticks = Arc::new(AtomicU32::new(0));
        let handle = spawn(Ticker {
            ticks: ticks.clone(),
        })
        .unwrap();

        assert_eq!(handle.thread().name(), Some("ticker"));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while ticks.load(Ordering::SeqCst) < 3 {
            assert!(std::time::Instant::now() < deadline, "task never ran");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!handle.is_finished());
    }

    #[tokio::test]
    async fn spawn_cycles_delivers_outputs() {
        let ticks = Arc::new(AtomicU32::new(0));
        let rx = spawn_cycles(
            Ticker {
                ticks: ticks.clone(),
            },
            3,
        )
        .unwrap();

        assert_eq!(rx.await.unwrap(), vec![1, 2, 3]);
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn spawn_cycles_does_not_hold_the_caller() {
        struct Stuck;

        impl PeriodicTask for Stuck {
            type Output = ();

            fn name(&self) -> &str {
                "stuck"
            }

            fn run_once(&mut self) -> Self::Output {
                thread::sleep(Duration::from_secs(2));
            }
        }

        let started = std::time::Instant::now();
        let rx = spawn_cycles(Stuck, 5).unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(50), rx).await;

        assert!(outcome.is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
