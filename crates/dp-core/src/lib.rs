//! eDP/DP source link layer
//!
//! Drives a SoC DisplayPort transmitter through the [`platform`] traits:
//! link training, Panel Self-Refresh entry/exit, the enable/disable
//! lifecycle with retries, and hot-plug storm recovery.
//!
//! # Modules
//!
//! - [`device`] - [`DpDevice`]: the locked device context and its public operations
//! - [`training`] - clock-recovery / channel-equalisation state machine
//! - [`psr`] - Panel Self-Refresh flags and transitions
//! - [`edid`] - sink capabilities and EDID over I2C-over-AUX
//! - [`bringup`] - reset, HPD, framing and scrambling steps
//! - [`video`] - stream clock and lock handshake
//! - [`lane`] - per-lane DPCD field decoding and link negotiation
//! - [`io`] - [`LinkIo`] handle bundle and bounded polling
//! - [`events`] - async workers for power events and interrupts
//!
//! # Features
//!
//! - `std`: `std::error::Error` for [`DpError`], platform mocks
//! - `defmt`: defmt logging and `defmt::Format` on public types
//! - `tracing`: route log output through `tracing` on host builds

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)]
#![allow(clippy::doc_markdown)] // DPCD register names in doc comments
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

#[macro_use]
mod log;

pub mod bringup;
pub mod config;
pub mod device;
pub mod edid;
pub mod error;
pub mod events;
pub mod io;
pub mod lane;
pub mod psr;
pub mod training;
pub mod video;

pub use config::{DeviceConfig, FrameMode, PsrSupport};
pub use device::{DpDevice, LinkStatus};
pub use edid::{Edid, SinkCaps};
pub use error::{DpError, PollTarget};
pub use io::LinkIo;
pub use lane::{LaneState, LinkConfig};
pub use psr::{PsrEnterState, PsrExitState, PsrOutcome, PsrState};
pub use training::{TrainingMode, TrainingSession, TrainingState};
