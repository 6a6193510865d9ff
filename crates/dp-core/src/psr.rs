//! Panel Self-Refresh entry and exit
//!
//! Two small state flags, both owned by the device context and only touched
//! under its lock:
//!
//! ```text
//! enter:  NONE ──pre_entry──▶ PRE_ENTRY_DONE
//!         NONE/PRE_ENTRY_DONE ──enter──▶ PRE_ENTER ──PSR active──▶ ENTER_DONE
//!                                           └──timeout──▶ NONE
//!         ENTER_DONE ──exit ok──▶ NONE
//!
//! exit:   NONE ──request──▶ PRE_EXIT ──exit ok──▶ EXIT_DONE
//!                              └──any failure──▶ NONE
//! ```
//!
//! Every entry point is idempotent: a repeated call in the target state is
//! reported as [`PsrOutcome::Skipped`] and touches no register.

use embedded_hal::delay::DelayNs;
use platform::dpcd::{
    DPCD_ADDR_PRE_ENTRY, DPCD_ADDR_SINK_POWER_STATE, DPCD_ADDR_SINK_PSR_STATUS,
    DPCD_PRE_ENTRY_REQUEST, DPCD_SET_POWER_STATE_D0, SINK_PSR_INACTIVE_STATE,
    SINK_PSR_RESYNC_STATE,
};
use platform::{AnalogBlock, AuxChannel, PsrStatus, Transmitter};

use crate::config::{
    FIFO_SETTLE_NS, PLL_POLL_US, PSR_ACTIVE_POLL_US, PSR_ENTER_SETTLE_US, PSR_INACTIVE_POLL_US,
    PSR_STREAM_POLL_US, SINK_PSR_POLL_US,
};
use crate::error::{DpError, PollTarget};
use crate::io::LinkIo;
use crate::lane::LinkConfig;
use crate::training::{train, TrainingMode};

/// Entry-side PSR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PsrEnterState {
    /// Not in self-refresh.
    #[default]
    None,
    /// Entry in progress.
    PreEnter,
    /// In self-refresh; link clock gated.
    EnterDone,
    /// Pre-entry flag sent to the sink.
    PreEntryDone,
}

impl PsrEnterState {
    /// Short name for log output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::PreEnter => "PRE_ENTER",
            Self::EnterDone => "ENTER_DONE",
            Self::PreEntryDone => "PRE_ENTRY_DONE",
        }
    }
}

/// Exit-side PSR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PsrExitState {
    /// No exit requested.
    #[default]
    None,
    /// Exit requested; entry requests are ignored.
    PreExit,
    /// Last exit completed.
    ExitDone,
}

impl PsrExitState {
    /// Short name for log output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::PreExit => "PRE_EXIT",
            Self::ExitDone => "EXIT_DONE",
        }
    }
}

/// Both PSR flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PsrState {
    /// Entry side.
    pub enter: PsrEnterState,
    /// Exit side.
    pub exit: PsrExitState,
}

impl PsrState {
    fn set_enter(&mut self, next: PsrEnterState) {
        debug!("PSR enter {} -> {}", self.enter.as_str(), next.as_str());
        self.enter = next;
    }

    fn set_exit(&mut self, next: PsrExitState) {
        debug!("PSR exit {} -> {}", self.exit.as_str(), next.as_str());
        self.exit = next;
    }

    /// Mark an exit as requested so that entry requests are skipped until
    /// the exit has run.
    pub fn request_exit(&mut self) {
        self.set_exit(PsrExitState::PreExit);
    }
}

/// Result of a PSR operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PsrOutcome {
    /// The transition ran.
    Done,
    /// Already in the target state (or blocked by a pending exit); nothing
    /// was written.
    Skipped,
}

/// Tell the sink self-refresh is imminent. Sent once per entry cycle.
pub fn pre_entry<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    state: &mut PsrState,
) -> Result<PsrOutcome, DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    if matches!(state.enter, PsrEnterState::PreEntryDone | PsrEnterState::EnterDone) {
        debug!("PSR pre-entry already sent");
        return Ok(PsrOutcome::Skipped);
    }
    io.write_dpcd_byte(DPCD_ADDR_PRE_ENTRY, DPCD_PRE_ENTRY_REQUEST)?;
    state.set_enter(PsrEnterState::PreEntryDone);
    Ok(PsrOutcome::Done)
}

/// Put the link into self-refresh.
///
/// Waits for the controller to report PSR active, then powers the PHY down
/// and gates the link clock. On timeout the entry state returns to `NONE`.
pub fn enter<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    state: &mut PsrState,
) -> Result<PsrOutcome, DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    if state.enter == PsrEnterState::EnterDone {
        info!("already in PSR");
        return Ok(PsrOutcome::Skipped);
    }
    if state.exit == PsrExitState::PreExit {
        info!("PSR exit pending, not entering");
        return Ok(PsrOutcome::Skipped);
    }

    state.set_enter(PsrEnterState::PreEnter);
    io.tx.enable_psr();
    if let Err(e) = io.poll(PollTarget::PsrActive, PSR_ACTIVE_POLL_US, |_, tx| {
        Ok(tx.psr_status() == PsrStatus::Active)
    }) {
        state.set_enter(PsrEnterState::None);
        return Err(e);
    }

    io.delay.delay_us(PSR_ENTER_SETTLE_US);
    io.tx.set_analog_power_down(AnalogBlock::Total, true);
    io.tx.disable_clock();
    state.set_enter(PsrEnterState::EnterDone);
    info!("PSR entered");
    Ok(PsrOutcome::Done)
}

/// Bring the link out of self-refresh and resume video.
///
/// Skipped when the link is not in (or entering) self-refresh; a stale
/// `PRE_EXIT` mark is cleared in that case. Any failure leaves the exit
/// state at `NONE` so the call can be repeated.
///
/// `link` is retrained as-is and replaced by the rate and lane count read
/// back from the transmitter once equalisation succeeds.
pub fn exit<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    state: &mut PsrState,
    link: &mut LinkConfig,
    enhanced_frame: bool,
) -> Result<PsrOutcome, DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    if state.enter == PsrEnterState::None {
        if state.exit == PsrExitState::PreExit {
            state.set_exit(PsrExitState::None);
        }
        debug!("not in PSR, nothing to exit");
        return Ok(PsrOutcome::Skipped);
    }

    match resume_link(io, *link, enhanced_frame) {
        Ok(trained) => {
            if let Some(trained) = trained {
                *link = trained;
            }
            state.set_enter(PsrEnterState::None);
            state.set_exit(PsrExitState::ExitDone);
            info!("PSR exited");
            Ok(PsrOutcome::Done)
        }
        Err(e) => {
            error!("PSR exit failed: {}", e.as_str());
            state.set_exit(PsrExitState::None);
            Err(e)
        }
    }
}

fn resume_link<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    link: LinkConfig,
    enhanced_frame: bool,
) -> Result<Option<LinkConfig>, DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    io.tx.enable_clock();
    io.tx.exit_psr();

    io.tx.set_fifo_reset();
    io.tx.set_analog_power_down(AnalogBlock::Total, false);
    io.poll(PollTarget::PllLock, PLL_POLL_US, |_, tx| Ok(tx.pll_locked()))?;
    io.delay.delay_ns(FIFO_SETTLE_NS);
    io.tx.clear_fifo_reset();

    io.write_dpcd_byte(DPCD_ADDR_SINK_POWER_STATE, DPCD_SET_POWER_STATE_D0)?;
    let trained = train(io, TrainingMode::PSR_RESUME, link, enhanced_frame)?;
    if trained.is_none() {
        warn!("resuming video on an untrained link");
    }
    io.tx.set_idle_en();

    io.poll(PollTarget::PsrInactive, PSR_INACTIVE_POLL_US, |_, tx| {
        Ok(tx.psr_status() == PsrStatus::Inactive)
    })?;
    io.tx.set_force_stream_valid();
    io.poll(PollTarget::VideoStream, PSR_STREAM_POLL_US, |_, tx| {
        Ok(tx.video_stream_on())
    })?;
    io.poll(PollTarget::SinkPsrInactive, SINK_PSR_POLL_US, |aux, _| {
        let status = aux.read_dpcd_byte(DPCD_ADDR_SINK_PSR_STATUS).map_err(DpError::Transport)?;
        Ok(matches!(status, SINK_PSR_INACTIVE_STATE | SINK_PSR_RESYNC_STATE))
    })?;
    Ok(trained)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::dpcd::{DPCD_ADDR_LANE0_1_STATUS, DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED};
    use platform::mocks::{MockAux, MockDelay, MockTransmitter, TxCall};
    use platform::{LaneCount, LinkRate};

    const LINK: LinkConfig = LinkConfig::new(LaneCount::Two, LinkRate::Hbr);

    fn trainable_sink() -> MockAux {
        let mut aux = MockAux::new();
        aux.set(DPCD_ADDR_LANE0_1_STATUS, 0x77).set(DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED, 0x01);
        aux
    }

    #[test]
    fn pre_entry_writes_flag_once() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        let mut state = PsrState::default();
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(pre_entry(&mut io, &mut state), Ok(PsrOutcome::Done));
        assert_eq!(pre_entry(&mut io, &mut state), Ok(PsrOutcome::Skipped));
        assert_eq!(aux.writes_to(DPCD_ADDR_PRE_ENTRY).len(), 1);
        assert_eq!(state.enter, PsrEnterState::PreEntryDone);
    }

    #[test]
    fn enter_gates_clock_after_psr_active() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        let mut state = PsrState::default();
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(enter(&mut io, &mut state), Ok(PsrOutcome::Done));
        assert_eq!(state.enter, PsrEnterState::EnterDone);
        assert_eq!(
            tx.calls(),
            &[
                TxCall::EnablePsr,
                TxCall::AnalogPowerDown(AnalogBlock::Total, true),
                TxCall::DisableClock,
            ]
        );
        assert_eq!(delay.total_ns(), u64::from(PSR_ENTER_SETTLE_US) * 1_000);
    }

    #[test]
    fn enter_timeout_reverts_to_none() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        tx.script_psr_status(&[PsrStatus::Transition]);
        let mut state = PsrState::default();
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(
            enter(&mut io, &mut state),
            Err(DpError::Timeout(PollTarget::PsrActive))
        );
        assert_eq!(state.enter, PsrEnterState::None);
        assert_eq!(tx.count(TxCall::DisableClock), 0);
    }

    #[test]
    fn enter_skipped_while_exit_pending() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        let mut state = PsrState::default();
        state.request_exit();
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(enter(&mut io, &mut state), Ok(PsrOutcome::Skipped));
        assert!(tx.calls().is_empty());
    }

    #[test]
    fn exit_without_entry_clears_stale_request() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        let mut link = LINK;
        let mut state = PsrState::default();
        state.request_exit();
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(exit(&mut io, &mut state, &mut link, false), Ok(PsrOutcome::Skipped));
        assert_eq!(state.exit, PsrExitState::None);
        assert!(tx.calls().is_empty());
    }

    #[test]
    fn exit_retrains_and_resumes() {
        let (mut aux, mut tx, mut delay) = (trainable_sink(), MockTransmitter::new(), MockDelay::new());
        let mut link = LINK;
        tx.set_link_bandwidth(LinkRate::Hbr.code());
        tx.set_lane_count(2);
        let mut state = PsrState {
            enter: PsrEnterState::EnterDone,
            exit: PsrExitState::PreExit,
        };
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(exit(&mut io, &mut state, &mut link, false), Ok(PsrOutcome::Done));
        assert_eq!(state.enter, PsrEnterState::None);
        assert_eq!(state.exit, PsrExitState::ExitDone);

        assert_eq!(aux.reg(DPCD_ADDR_SINK_POWER_STATE), DPCD_SET_POWER_STATE_D0);
        assert!(tx.clock_enabled());
        assert_eq!(tx.count(TxCall::WaitSelfRefresh), 1);
        let calls = tx.calls();
        let fifo_set = calls.iter().position(|c| *c == TxCall::SetFifoReset).unwrap();
        let fifo_clear = calls.iter().position(|c| *c == TxCall::ClearFifoReset).unwrap();
        let idle = calls.iter().position(|c| *c == TxCall::SetIdleEn).unwrap();
        assert!(fifo_set < fifo_clear && fifo_clear < idle);
    }

    #[test]
    fn exit_records_read_back_link() {
        let (mut aux, mut tx, mut delay) = (trainable_sink(), MockTransmitter::new(), MockDelay::new());
        let mut link = LINK;
        tx.set_link_bandwidth(LinkRate::Rbr.code());
        tx.set_lane_count(1);
        let mut state = PsrState {
            enter: PsrEnterState::EnterDone,
            exit: PsrExitState::PreExit,
        };
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(exit(&mut io, &mut state, &mut link, false), Ok(PsrOutcome::Done));
        assert_eq!(link, LinkConfig::new(LaneCount::One, LinkRate::Rbr));
    }

    #[test]
    fn exit_accepts_resync_encoding() {
        let (mut aux, mut tx, mut delay) = (trainable_sink(), MockTransmitter::new(), MockDelay::new());
        let mut link = LINK;
        aux.script(DPCD_ADDR_SINK_PSR_STATUS, &[0x02, 0x02, SINK_PSR_RESYNC_STATE]);
        let mut state = PsrState {
            enter: PsrEnterState::EnterDone,
            exit: PsrExitState::None,
        };
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(exit(&mut io, &mut state, &mut link, false), Ok(PsrOutcome::Done));
        assert_eq!(aux.read_count(DPCD_ADDR_SINK_PSR_STATUS), 3);
    }

    #[test]
    fn exit_timeout_resets_exit_state_only() {
        let (mut aux, mut tx, mut delay) = (trainable_sink(), MockTransmitter::new(), MockDelay::new());
        let mut link = LINK;
        tx.script_stream(&[false]);
        let mut state = PsrState {
            enter: PsrEnterState::EnterDone,
            exit: PsrExitState::PreExit,
        };
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(
            exit(&mut io, &mut state, &mut link, false),
            Err(DpError::Timeout(PollTarget::VideoStream))
        );
        assert_eq!(state.exit, PsrExitState::None);
        assert_eq!(state.enter, PsrEnterState::EnterDone);
    }

    #[test]
    fn exit_pll_relock_timeout() {
        let (mut aux, mut tx, mut delay) = (trainable_sink(), MockTransmitter::new(), MockDelay::new());
        let mut link = LINK;
        tx.script_pll(&[false]);
        let mut state = PsrState {
            enter: PsrEnterState::EnterDone,
            exit: PsrExitState::PreExit,
        };
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(
            exit(&mut io, &mut state, &mut link, false),
            Err(DpError::Timeout(PollTarget::PllLock))
        );
        assert_eq!(tx.count(TxCall::ClearFifoReset), 0);
    }
}
