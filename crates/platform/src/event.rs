//! Display power-state notifications

/// Framebuffer power-state event.
///
/// The display driver publishes the first three; the link layer answers a
/// completed entry with [`PowerEvent::PsrDone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerEvent {
    /// Panel is about to enter self-refresh; send the pre-entry flag.
    PsrPreEntry,
    /// Enter self-refresh now.
    PsrEnter,
    /// Leave self-refresh and resume the link.
    PsrExit,
    /// Self-refresh entry completed.
    PsrDone,
}

impl PowerEvent {
    /// Short name for log output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PsrPreEntry => "PSR_PRE_ENTRY",
            Self::PsrEnter => "PSR_ENTER",
            Self::PsrExit => "PSR_EXIT",
            Self::PsrDone => "PSR_DONE",
        }
    }
}
