//! Hardware Abstraction Layer (HAL) for the eDP link driver
//!
//! This crate provides trait-based abstractions for the hardware the link
//! layer talks to, enabling development and testing without a panel.
//!
//! # Architecture Layers
//!
//! ```text
//! Board integration (clocks, IRQ wiring, panel GPIOs)
//!         ↓
//! Link layer (dp-core: training, PSR, device lifecycle)
//!         ↓
//! Platform HAL (this crate - trait abstractions + DPCD register map)
//!         ↓
//! Hardware Layer (SoC DP controller registers + AUX engine)
//! ```
//!
//! # Abstractions
//!
//! - [`AuxChannel`] - DPCD register access and I2C-over-AUX (EDID)
//! - [`Transmitter`] - Source controller: PHY, PLL, lanes, video, PSR
//! - [`PanelPower`] - Panel supply and backlight
//! - [`dpcd`] - DPCD register addresses and field values
//! - [`video`] - Link rate / lane count / pixel format descriptors
//!
//! Delays use [`embedded_hal::delay::DelayNs`] directly.
//!
//! # Features
//!
//! - `std`: Enable standard library support (mocks for host testing)
//! - `defmt`: Enable defmt formatting of public enums

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
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod aux;
pub mod dpcd;
pub mod event;
pub mod mocks;
pub mod panel;
pub mod transmitter;
pub mod video;

// Re-export main traits
pub use aux::AuxChannel;
pub use panel::PanelPower;
pub use transmitter::{AnalogBlock, PsrStatus, TrainingPattern, Transmitter};

// Re-export descriptor types
pub use event::PowerEvent;
pub use video::{
    ColorDepth, ColorSpace, DynamicRange, LaneCount, LinkRate, VideoInfo, YcbcrCoeff,
};
