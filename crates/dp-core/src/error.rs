//! Error types for the link layer

use core::fmt;

/// Condition a bounded poll was waiting for when it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollTarget {
    /// Hot-plug detect line.
    HotPlug,
    /// Link PLL lock.
    PllLock,
    /// Controller PSR status "active".
    PsrActive,
    /// Controller PSR status "inactive".
    PsrInactive,
    /// Slave video stream clock.
    VideoClock,
    /// Sink video stream lock.
    VideoStream,
    /// Sink PSR status register back in an inactive encoding.
    SinkPsrInactive,
}

impl PollTarget {
    /// Short name for log output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HotPlug => "hot-plug",
            Self::PllLock => "PLL lock",
            Self::PsrActive => "PSR active",
            Self::PsrInactive => "PSR inactive",
            Self::VideoClock => "video stream clock",
            Self::VideoStream => "video stream",
            Self::SinkPsrInactive => "sink PSR inactive",
        }
    }
}

/// Link-layer error, generic over the AUX bus error `E`.
///
/// | Variant | Retried by |
/// |---------|------------|
/// | `Transport` | nobody inside this crate |
/// | `Checksum` | the 3-attempt EDID loop |
/// | `Timeout` | caller, after state reset |
/// | `LinkTraining` | the enable loop (panel power-cycle + rate downgrade) |
/// | `PllUnlocked` | the enable loop |
/// | `Busy` | caller |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DpError<E> {
    /// AUX or I2C-over-AUX transaction failed.
    Transport(E),
    /// EDID block sum is not 0 mod 256.
    Checksum,
    /// A bounded poll exhausted its iteration budget.
    Timeout(PollTarget),
    /// Link training ended in the FAILED state.
    LinkTraining,
    /// Video configuration attempted while the link PLL is unlocked.
    PllUnlocked,
    /// Device context already borrowed by an operation in progress.
    Busy,
}

impl<E> DpError<E> {
    /// Short name for log output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport(_) => "AUX transport",
            Self::Checksum => "EDID checksum",
            Self::Timeout(_) => "timeout",
            Self::LinkTraining => "link training",
            Self::PllUnlocked => "PLL unlocked",
            Self::Busy => "busy",
        }
    }
}

impl<E: embedded_hal::i2c::Error> fmt::Display for DpError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "AUX transaction failed: {}", e.kind()),
            Self::Checksum => write!(f, "EDID block checksum mismatch"),
            Self::Timeout(target) => write!(f, "Timed out waiting for {}", target.as_str()),
            Self::LinkTraining => write!(f, "Link training failed"),
            Self::PllUnlocked => write!(f, "Link PLL is not locked"),
            Self::Busy => write!(f, "Link device is busy"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: embedded_hal::i2c::Error> std::error::Error for DpError<E> {}
