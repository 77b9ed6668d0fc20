//! # ahrslink-types
//!
//! Core types shared between the AHRS link supervisor, its transport and the
//! telemetry consumers that read what it publishes.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: every type is plain `Copy` data
//! - **`no_std` capable**: the same types can live on the flight controller
//! - **Optional serialization**: enable `serde` and/or `minicbor` as needed
//! - **Stable external names**: the published record serializes with the
//!   field names ground tooling already knows (`LinkRunning`, `AhrsKickstarts`, ...)
//!
//! ## Features
//!
//! - `std` (default): Standard library support (wall-clock timestamps)
//! - `serde`: JSON/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use ahrslink_types::{AhrsStatus, AlarmLevel, LinkStatusSnapshot};
//!
//! let snapshot = LinkStatusSnapshot::builder()
//!     .link_ok(true)
//!     .remote(|c| c.kick_starts(1).crc_errors(4))
//!     .local(|c| c.retries(2))
//!     .build();
//!
//! let status = AhrsStatus::from(&snapshot);
//! assert!(status.link_running);
//! assert_eq!(status.ahrs_kickstarts, 1);
//! assert_eq!(status.op_retries, 2);
//! assert_eq!(AlarmLevel::from_link_ok(snapshot.link_ok), AlarmLevel::Ok);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

mod alarm;
mod counters;
mod frame;
mod period;
mod status;

pub use alarm::*;
pub use counters::*;
pub use frame::*;
pub use period::*;
pub use status::*;

/// Current schema version of [`StatusFrame`].
///
/// Increment this when the serialized frame changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;
