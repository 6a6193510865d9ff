//! DisplayPort transmitter (source controller) abstraction
//!
//! Everything on the SoC side of the link: controller reset, analog PHY
//! power, PLL, clock gating, per-lane drive registers, pattern generator,
//! video capture and the PSR state machine of the controller.
//!
//! These are memory-mapped register accesses and cannot fail; status
//! getters take `&mut self` because reading a status register may have
//! side effects on real hardware (and advances scripted mocks).

use crate::video::VideoInfo;

/// Training pattern driven by the source pattern generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrainingPattern {
    /// Normal video (pattern generator off).
    None,
    /// TPS1, clock recovery.
    Pattern1,
    /// TPS2, channel equalisation.
    Pattern2,
}

/// Analog PHY blocks that can be powered down independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogBlock {
    /// All analog modules including the PLL (bring-up / shutdown).
    All,
    /// Every lane driver and the AUX block (PSR entry / exit).
    Total,
}

/// Controller-side PSR state as reported by the PSR status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PsrStatus {
    /// Link active, not in self-refresh.
    Inactive,
    /// Self-refresh active; main link may be powered down.
    Active,
    /// Transitioning between states.
    Transition,
}

/// Source-side DP controller.
pub trait Transmitter {
    // ── Bring-up ────────────────────────────────────────────────────────────

    /// Reset the controller to its power-on register state.
    fn reset(&mut self);

    /// Select SW-defined function (normal operation).
    fn enable_sw_function(&mut self);

    /// Program the interrupt masks the driver relies on.
    fn config_interrupt(&mut self);

    /// Initialise the analog PHY (PLL filters, termination).
    fn init_analog_func(&mut self);

    /// (Re-)arm hot-plug detection.
    fn init_hpd(&mut self);

    /// Initialise the AUX channel controller.
    fn init_aux(&mut self);

    /// Hot-plug detect line asserted.
    fn hpd_asserted(&mut self) -> bool;

    /// Pulse the PHY macro reset. Must follow PLL lock by at least 10 µs.
    fn reset_macro(&mut self);

    // ── Clocks and power ────────────────────────────────────────────────────

    /// Ungate the controller clock.
    fn enable_clock(&mut self);

    /// Gate the controller clock.
    fn disable_clock(&mut self);

    /// Take a runtime power reference on the controller.
    fn runtime_get(&mut self);

    /// Release the runtime power reference.
    fn runtime_put(&mut self);

    /// Power analog blocks down (`true`) or up (`false`).
    fn set_analog_power_down(&mut self, block: AnalogBlock, power_down: bool);

    /// Power the link PLL down (`true`) or up (`false`).
    fn set_pll_power_down(&mut self, power_down: bool);

    /// Link PLL locked.
    fn pll_locked(&mut self) -> bool;

    /// Enable or disable spread-spectrum clocking.
    fn enable_ssc(&mut self, enable: bool);

    // ── Link ────────────────────────────────────────────────────────────────

    /// Program the link rate (DPCD `LINK_BW_SET` code).
    fn set_link_bandwidth(&mut self, code: u8);

    /// Link rate currently programmed (DPCD code).
    fn link_bandwidth(&self) -> u8;

    /// Program the active lane count.
    fn set_lane_count(&mut self, count: u8);

    /// Active lane count currently programmed.
    fn lane_count(&self) -> u8;

    /// Set the pre-emphasis field of one lane's drive register.
    fn set_lane_pre_emphasis(&mut self, lane: usize, level: u8);

    /// Write one lane's drive register (`TRAINING_LANEx_SET` encoding).
    fn set_lane_link_training(&mut self, lane: usize, value: u8);

    /// Read one lane's drive register (`TRAINING_LANEx_SET` encoding).
    fn lane_link_training(&self, lane: usize) -> u8;

    /// Select the pattern generator output.
    fn set_training_pattern(&mut self, pattern: TrainingPattern);

    /// Enable or disable the source scrambler.
    fn enable_scrambling(&mut self, enable: bool);

    /// Enable or disable enhanced framing on the source.
    fn enable_enhanced_mode(&mut self, enable: bool);

    // ── Video ───────────────────────────────────────────────────────────────

    /// Reset the video capture block to defaults.
    fn init_video(&mut self);

    /// Slave-mode capture plus colour format from `info`.
    fn configure_video(&mut self, info: &VideoInfo);

    /// Slave video stream clock present.
    fn slave_video_clock_on(&mut self) -> bool;

    /// Calculated M/N, timing from capture, unmute, slave mode, start.
    fn start_video(&mut self);

    /// Sink reports a locked video stream.
    fn video_stream_on(&mut self) -> bool;

    // ── Panel Self-Refresh ──────────────────────────────────────────────────

    /// Reset scrambler counters and program controller PSR timing.
    fn configure_psr(&mut self);

    /// Ask the controller to enter PSR.
    fn enable_psr(&mut self);

    /// Ask the controller to leave PSR.
    fn exit_psr(&mut self);

    /// Controller PSR state.
    fn psr_status(&mut self) -> PsrStatus;

    /// Hold the link FIFO in reset.
    fn set_fifo_reset(&mut self);

    /// Release the link FIFO reset.
    fn clear_fifo_reset(&mut self);

    /// Enable idle pattern insertion after resync.
    fn set_idle_en(&mut self);

    /// Force the video stream valid flag during resync.
    fn set_force_stream_valid(&mut self);

    /// Block until the controller's self-refresh timing signal fires.
    ///
    /// Used as the settle point of PSR-resume link training.
    fn wait_self_refresh(&mut self);
}
