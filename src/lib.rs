//! # ahrslink
//!
//! Link health supervisor for a flight controller and its AHRS coprocessor.
//!
//! This crate is the process around [`ahrslink_supervisor::LinkSupervisor`]:
//! it loads configuration, owns the shared alarm and watchdog tables, runs
//! the supervisor on a dedicated thread and sends status frames to
//! telemetry outputs from a tokio runtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── ahrslink process ─────────────────────────────┐
//! │                                                                            │
//! │  config ──▶ SharedSettings ──┐                                             │
//! │                              ▼                                             │
//! │  Transport ◀── LinkSupervisor (own thread) ──▶ AlarmTable                  │
//! │                   │          │                                             │
//! │                   │          └──▶ WatchdogTable ◀── WatchdogMonitor        │
//! │                   ▼                                                        │
//! │              StatusBoard ──▶ TelemetryEmitter ──▶ file | tcp | prometheus  │
//! └────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`config`]**: TOML + environment configuration and the file watcher
//!   that applies update-period changes at runtime
//! - **[`sim`]**: a deterministic simulated AHRS link
//! - **[`watchdog`]**: the process-level watchdog owner
//! - **[`app`]**: the composition root
//!
//! ## Usage
//!
//! ```bash
//! # Run against the simulated link, writing the latest status to a file
//! ahrslink --output ahrs-status.json
//!
//! # 500 cycles at 10 ms, then exit
//! ahrslink --period-ms 10 --cycles 500
//!
//! # Configuration file, overridable from the environment
//! AHRSLINK__SUPERVISOR__UPDATE_PERIOD_MS=50 ahrslink --config ahrslink.toml
//! ```
//!
//! ### As a library
//!
//! ```rust
//! use ahrslink::{App, AppConfig, SimulatedTransport};
//! use ahrslink_supervisor::ManualClock;
//!
//! let config = AppConfig::default();
//! let app = App::new(config.clone());
//! let mut supervisor =
//!     app.supervisor_with_clock(SimulatedTransport::new(config.sim), ManualClock::new());
//!
//! let report = supervisor.run_once();
//! assert!(report.status.link_running);
//! ```

pub mod app;
pub mod config;
pub mod sim;
pub mod watchdog;

pub use app::{summary_line, App, RunError};
pub use config::{AppConfig, ConfigError, ConfigWatcher};
pub use sim::SimulatedTransport;
pub use watchdog::{WatchdogExpired, WatchdogMonitor};
