//! Protocol constants and device configuration
//!
//! Loop bounds and delays follow the VESA DisplayPort v1.1a link training
//! rules and the eDP v1.3 PSR entry/exit sequence. [`DeviceConfig`] carries
//! the integration choices the protocol cannot make on its own.

use platform::VideoInfo;

// ── Loop bounds ──────────────────────────────────────────────────────────────

/// Iteration budget of every bounded poll.
pub const DP_TIMEOUT_LOOP_COUNT: u32 = 100;

/// Unchanged-adjustment clock-recovery polls tolerated per lane.
pub const MAX_CR_LOOP: u8 = 4;

/// Equalisation polls tolerated per session.
pub const MAX_EQ_LOOP: u8 = 5;

/// Full bring-up retries after the first failed attempt.
pub const MAX_ENABLE_RETRIES: u8 = 3;

/// Whole-sequence EDID read attempts.
pub const EDID_READ_ATTEMPTS: u8 = 3;

/// Consecutive "stream on" polls that must be exceeded to declare video lock.
pub const VIDEO_LOCK_DEBOUNCE: u32 = 10;

/// Hot-plug interrupts that trigger a full disable/enable cycle.
pub const ESD_RECOVERY_THRESHOLD: u8 = 3;

// ── Settle delays ────────────────────────────────────────────────────────────

/// Before reading clock-recovery status.
pub const CR_SETTLE_US: u32 = 100;

/// Before reading equalisation status.
pub const EQ_SETTLE_US: u32 = 400;

/// After re-arming hot-plug detection.
pub const HPD_SETTLE_US: u32 = 200;

/// Between asserting and releasing the link FIFO reset on PSR exit.
pub const FIFO_SETTLE_NS: u32 = 600;

/// After the controller reports PSR active, before powering the PHY down.
pub const PSR_ENTER_SETTLE_US: u32 = 2_000;

// ── Poll intervals ───────────────────────────────────────────────────────────

/// Hot-plug detect.
pub const HPD_POLL_US: u32 = 10;

/// PLL lock after PSR exit.
pub const PLL_POLL_US: u32 = 10;

/// Slave video stream clock.
pub const VIDEO_CLOCK_POLL_US: u32 = 2;

/// Debounced video stream lock during bring-up.
pub const VIDEO_LOCK_POLL_US: u32 = 1_000;

/// Controller PSR status "active" on entry.
pub const PSR_ACTIVE_POLL_US: u32 = 1_000;

/// Controller PSR status "inactive" on exit.
pub const PSR_INACTIVE_POLL_US: u32 = 100;

/// Video stream lock on PSR exit.
pub const PSR_STREAM_POLL_US: u32 = 1_000;

/// Sink PSR status register on PSR exit.
pub const SINK_PSR_POLL_US: u32 = 100;

// ── Device configuration ─────────────────────────────────────────────────────

/// Framing mode negotiated with the sink before training.
///
/// No default: which mode a given panel needs is an integration decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameMode {
    /// Enhanced framing off on both ends.
    Normal,
    /// Enhanced framing on both ends when the sink advertises it.
    Enhanced,
}

/// Panel Self-Refresh capability of the integration.
///
/// No default: PSR needs panel and controller support plus the vendor
/// tuning writes, so it must be chosen explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PsrSupport {
    /// Power events are ignored; no PSR link configuration.
    Disabled,
    /// PSR link configuration on enable; power events drive the PSR machine.
    Enabled,
}

impl PsrSupport {
    /// `true` for [`PsrSupport::Enabled`].
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Everything the integrator supplies at device construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    /// Source maxima and pixel format.
    pub video: VideoInfo,
    /// Framing mode.
    pub frame_mode: FrameMode,
    /// PSR capability.
    pub psr: PsrSupport,
    /// Read sink capabilities and EDID during bring-up.
    pub read_edid: bool,
    /// Wait for hot-plug before touching the AUX channel.
    pub detect_hpd: bool,
}

impl DeviceConfig {
    /// Configuration with EDID and hot-plug detection off.
    #[must_use]
    pub const fn new(video: VideoInfo, frame_mode: FrameMode, psr: PsrSupport) -> Self {
        Self {
            video,
            frame_mode,
            psr,
            read_edid: false,
            detect_hpd: false,
        }
    }

    /// Enable or disable the EDID read during bring-up.
    #[must_use]
    pub const fn with_edid(mut self, read_edid: bool) -> Self {
        self.read_edid = read_edid;
        self
    }

    /// Enable or disable hot-plug detection during bring-up.
    #[must_use]
    pub const fn with_hpd(mut self, detect_hpd: bool) -> Self {
        self.detect_hpd = detect_hpd;
        self
    }
}
