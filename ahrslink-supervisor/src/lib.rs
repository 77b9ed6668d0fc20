//! # ahrslink-supervisor
//!
//! Periodic health supervision of the link between the flight computer and
//! its AHRS coprocessor.
//!
//! Every cycle the [`LinkSupervisor`] refreshes its watchdog flag, runs one
//! exchange over the [`Transport`], derives the `AHRSComms` alarm from the
//! link state and publishes the link counters on the [`StatusBoard`]. It then
//! sleeps until the next absolute deadline.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ahrslink_supervisor::{
//!     task, AlarmTable, LinkSupervisor, SharedSettings, StatusBoard, Transport,
//!     TransportError, WatchdogTable,
//! };
//! use ahrslink_types::LinkStatusSnapshot;
//!
//! struct SerialLink;
//!
//! impl Transport for SerialLink {
//!     fn exchange(&mut self) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//!     fn status(&self) -> LinkStatusSnapshot {
//!         LinkStatusSnapshot::builder().link_ok(true).build()
//!     }
//! }
//!
//! let board = Arc::new(StatusBoard::new());
//! let supervisor = LinkSupervisor::builder(SerialLink)
//!     .alarms(Arc::new(AlarmTable::new()))
//!     .watchdog(Arc::new(WatchdogTable::new()))
//!     .settings(Arc::new(SharedSettings::default()))
//!     .board(board.clone())
//!     .build();
//!
//! // Runs on its own thread; read the board from anywhere.
//! task::spawn(supervisor).unwrap();
//! let reader = board.subscribe();
//! ```
//!
//! ## Features
//!
//! - `testing`: [`testing::ScriptedTransport`] for deterministic tests
//! - `prometheus`: serve status frames as Prometheus metrics

mod alarms;
mod board;
mod clock;
mod emitter;
mod output;
mod schedule;
mod settings;
mod supervisor;
pub mod task;
mod transport;
mod watchdog;

#[cfg(feature = "prometheus")]
pub mod prometheus;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use alarms::{AlarmRegistry, AlarmTable};
pub use board::{StatusBoard, StatusReader};
pub use clock::{Clock, ManualClock, SystemClock};
pub use emitter::{EmissionHandle, TelemetryEmitter, TelemetryEmitterBuilder};
pub use output::Output;
pub use schedule::{Deadline, DeadlineSchedule};
pub use settings::{SettingsSource, SharedSettings};
pub use supervisor::{CycleReport, LinkSupervisor, LinkSupervisorBuilder, DEFAULT_MIN_PERIOD};
pub use task::{run_cycles, spawn_cycles, PeriodicTask};
pub use transport::{Transport, TransportError};
pub use watchdog::{Watchdog, WatchdogFlag, WatchdogTable};

#[cfg(feature = "prometheus")]
pub use prometheus::{PrometheusConfig, PrometheusExporter};

pub use ahrslink_types::{
    AhrsStatus, AlarmKey, AlarmLevel, LinkCounters, LinkStatusSnapshot, StatusFrame, UpdatePeriod,
};
