//! Link training engine
//!
//! One state machine serves both bring-up and PSR resume:
//!
//! ```text
//! START ──link_start──▶ CLOCK_RECOVERY ──all CR_DONE──▶ EQUALIZER_TRAINING ──eq ok──▶ FINISHED
//!                        │    ▲                            │    ▲
//!                        │    └── retry (new levels)       │    └── retry (eq_loop ≤ MAX)
//!                        └── stuck ──▶ FAILED ◀── CR lost / eq_loop > MAX
//! ```
//!
//! A [`TrainingMode`] selects how the engine waits before sampling status
//! ([`WaitStrategy`]), how many whole sessions [`train`] runs and whether
//! exhausting them is an error ([`RetryPolicy`]).
//!
//! Stuck conditions never surface as errors from the step functions: they
//! move the session to FAILED through [`TrainingSession::reduce_link_rate`].
//! AUX transport errors always abort the session.

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use platform::dpcd::{
    DPCD_ADDR_ADJUST_REQUEST_LANE0_1, DPCD_ADDR_CONFIGURATION_SET, DPCD_ADDR_LANE0_1_STATUS,
    DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED, DPCD_ADDR_LANE_COUNT_SET, DPCD_ADDR_LINK_BW_SET,
    DPCD_ADDR_MAX_LANE_COUNT, DPCD_ADDR_MAX_LINK_RATE, DPCD_ADDR_SINK_POWER_STATE,
    DPCD_ADDR_TRAINING_LANE0_SET, DPCD_ADDR_TRAINING_PATTERN_SET, DPCD_EDP_FRAMING_CHANGE_EN,
    DPCD_ENHANCED_FRAME_EN, DPCD_LANE_COUNT_MASK, DPCD_SCRAMBLING_DISABLED,
    DPCD_SET_POWER_STATE_D0, DPCD_TRAINING_PATTERN_1, DPCD_TRAINING_PATTERN_2,
    DPCD_TRAINING_PATTERN_DISABLED,
};
use platform::{AnalogBlock, AuxChannel, LaneCount, LinkRate, TrainingPattern, Transmitter};

use crate::config::{
    PsrSupport, CR_SETTLE_US, DP_TIMEOUT_LOOP_COUNT, EQ_SETTLE_US, MAX_CR_LOOP, MAX_EQ_LOOP,
};
use crate::error::DpError;
use crate::io::LinkIo;
use crate::lane::{
    adjust_pre_emphasis, adjust_voltage_swing, channel_eq_ok, clock_recovery_ok, LaneState,
    LinkConfig, MAX_LEVEL,
};

/// Lanes the engine can track.
const MAX_LANES: usize = 4;

/// Pre-emphasis level programmed on every lane by [`TrainingSession::link_start`].
const START_PRE_EMPHASIS: u8 = 1;

// ── Modes ────────────────────────────────────────────────────────────────────

/// Training session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrainingState {
    /// Nothing programmed yet.
    Start,
    /// Adjusting voltage swing until every lane reports CR_DONE.
    ClockRecovery,
    /// Adjusting pre-emphasis until lanes are equalised and aligned.
    EqualizerTraining,
    /// Link trained; terminal.
    Finished,
    /// Session aborted; terminal.
    Failed,
}

impl TrainingState {
    /// Short name for log output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::ClockRecovery => "CLOCK_RECOVERY",
            Self::EqualizerTraining => "EQUALIZER_TRAINING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        }
    }

    /// `FINISHED` or `FAILED`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// How a session waits before sampling sink status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitStrategy {
    /// Fixed settle delay: 100 µs before CR status, 400 µs before EQ status.
    SettleDelay,
    /// Block on the controller's self-refresh timing before EQ status;
    /// CR status is sampled immediately.
    SelfRefreshSync,
}

/// Outer retry behaviour of [`train`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Whole sessions to run before giving up (at least one runs).
    pub attempts: u32,
    /// Exhausting the attempts is an error rather than a logged warning.
    pub fatal: bool,
}

/// Parameters that distinguish bring-up training from PSR-resume training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrainingMode {
    /// Status sampling discipline.
    pub wait: WaitStrategy,
    /// Outer retry behaviour.
    pub retry: RetryPolicy,
    /// Program sink power state, link rate, lane count and start
    /// pre-emphasis in `link_start`. PSR resume keeps what is already set.
    pub program_link: bool,
}

impl TrainingMode {
    /// Bring-up: settle delays, one session, failure is an error.
    pub const NORMAL: Self = Self {
        wait: WaitStrategy::SettleDelay,
        retry: RetryPolicy {
            attempts: 1,
            fatal: true,
        },
        program_link: true,
    };

    /// PSR resume: self-refresh sync, up to [`DP_TIMEOUT_LOOP_COUNT`]
    /// sessions, failure is logged and the exit sequence carries on.
    pub const PSR_RESUME: Self = Self {
        wait: WaitStrategy::SelfRefreshSync,
        retry: RetryPolicy {
            attempts: DP_TIMEOUT_LOOP_COUNT,
            fatal: false,
        },
        program_link: false,
    };
}

#[derive(Clone, Copy)]
enum Phase {
    ClockRecovery,
    Equalization,
}

// ── Session ──────────────────────────────────────────────────────────────────

/// One training session: per-lane state and loop counters.
///
/// Everything here is reset by [`link_start`](Self::link_start); only the
/// resulting [`LinkConfig`] outlives the session.
#[derive(Debug, Clone)]
pub struct TrainingSession {
    mode: TrainingMode,
    link: LinkConfig,
    enhanced_frame: bool,
    state: TrainingState,
    lanes: Vec<LaneState, MAX_LANES>,
    eq_loop: u8,
    rate_reductions: u8,
}

impl TrainingSession {
    /// New session in `START` for the given link.
    #[must_use]
    pub fn new(mode: TrainingMode, link: LinkConfig, enhanced_frame: bool) -> Self {
        Self {
            mode,
            link,
            enhanced_frame,
            state: TrainingState::Start,
            lanes: Vec::new(),
            eq_loop: 0,
            rate_reductions: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Per-lane state of the active lanes.
    #[must_use]
    pub fn lanes(&self) -> &[LaneState] {
        &self.lanes
    }

    /// Equalisation polls that did not succeed.
    #[must_use]
    pub fn eq_loop(&self) -> u8 {
        self.eq_loop
    }

    /// Times [`reduce_link_rate`](Self::reduce_link_rate) ran.
    #[must_use]
    pub fn rate_reductions(&self) -> u8 {
        self.rate_reductions
    }

    /// Link being trained; after `FINISHED`, as read back from the
    /// transmitter.
    #[must_use]
    pub fn link(&self) -> LinkConfig {
        self.link
    }

    fn set_state(&mut self, next: TrainingState) {
        if self.state != next {
            debug!("link training {} -> {}", self.state.as_str(), next.as_str());
        }
        self.state = next;
    }

    fn settle<A, T, D>(&self, io: &mut LinkIo<'_, A, T, D>, phase: Phase)
    where
        A: AuxChannel,
        T: Transmitter,
        D: DelayNs,
    {
        match (self.mode.wait, phase) {
            (WaitStrategy::SettleDelay, Phase::ClockRecovery) => io.delay.delay_us(CR_SETTLE_US),
            (WaitStrategy::SettleDelay, Phase::Equalization) => io.delay.delay_us(EQ_SETTLE_US),
            (WaitStrategy::SelfRefreshSync, Phase::ClockRecovery) => {}
            (WaitStrategy::SelfRefreshSync, Phase::Equalization) => io.tx.wait_self_refresh(),
        }
    }

    /// Program the link and start clock recovery with training pattern 1.
    ///
    /// Resets every lane's loop counter and the EQ counter. Lane levels are
    /// taken from the transmitter's drive registers afterwards.
    pub fn link_start<A, T, D>(&mut self, io: &mut LinkIo<'_, A, T, D>) -> Result<(), DpError<A::Error>>
    where
        A: AuxChannel,
        T: Transmitter,
        D: DelayNs,
    {
        self.set_state(TrainingState::ClockRecovery);
        self.eq_loop = 0;
        self.lanes.clear();
        let lanes = self.link.lane_count.lanes();

        if self.mode.program_link {
            io.write_dpcd_byte(DPCD_ADDR_SINK_POWER_STATE, DPCD_SET_POWER_STATE_D0)?;

            let rate = self.link.link_rate.code();
            let count = self.link.lane_count.get();
            io.tx.set_link_bandwidth(rate);
            io.tx.set_lane_count(count);
            let lane_count_set = if self.enhanced_frame {
                count | DPCD_ENHANCED_FRAME_EN
            } else {
                count
            };
            io.write_dpcd(DPCD_ADDR_LINK_BW_SET, &[rate, lane_count_set])?;

            for lane in 0..lanes {
                io.tx.set_lane_pre_emphasis(lane, START_PRE_EMPHASIS);
            }
        }

        io.tx.set_training_pattern(TrainingPattern::Pattern1);
        io.write_dpcd_byte(
            DPCD_ADDR_TRAINING_PATTERN_SET,
            DPCD_SCRAMBLING_DISABLED | DPCD_TRAINING_PATTERN_1,
        )?;
        let zeros = [0u8; MAX_LANES];
        io.write_dpcd(DPCD_ADDR_TRAINING_LANE0_SET, zeros.get(..lanes).unwrap_or(&zeros))?;

        for lane in 0..lanes {
            // Capacity equals the largest lane count.
            let _ = self
                .lanes
                .push(LaneState::from_training_set(io.tx.lane_link_training(lane)));
        }
        info!(
            "link training start: {} lanes at {}",
            self.link.lane_count.get(),
            self.link.link_rate.as_str()
        );
        Ok(())
    }

    /// Adopt the sink's requested levels on every lane and program them on
    /// the transmitter. Returns the `TRAINING_LANEx_SET` bytes.
    fn apply_adjustments<T: Transmitter>(&mut self, tx: &mut T, adjust: &[u8]) -> Vec<u8, MAX_LANES> {
        let mut sets = Vec::new();
        for (index, lane) in self.lanes.iter_mut().enumerate() {
            lane.apply(
                adjust_voltage_swing(adjust, index),
                adjust_pre_emphasis(adjust, index),
            );
            let set = lane.training_set();
            tx.set_lane_link_training(index, set);
            let _ = sets.push(set);
        }
        sets
    }

    /// One clock-recovery poll.
    ///
    /// All lanes CR_DONE: switch both ends to pattern 2 with the requested
    /// levels and move to `EQUALIZER_TRAINING`. Otherwise count unchanged
    /// requests per lane; a request for the highest level or a lane reaching
    /// [`MAX_CR_LOOP`] fails the session, anything else is applied and the
    /// session stays in `CLOCK_RECOVERY`.
    pub fn process_clock_recovery<A, T, D>(
        &mut self,
        io: &mut LinkIo<'_, A, T, D>,
    ) -> Result<(), DpError<A::Error>>
    where
        A: AuxChannel,
        T: Transmitter,
        D: DelayNs,
    {
        self.settle(io, Phase::ClockRecovery);

        let mut status = [0u8; 2];
        io.read_dpcd(DPCD_ADDR_LANE0_1_STATUS, &mut status)?;
        let mut adjust = [0u8; 2];
        io.read_dpcd(DPCD_ADDR_ADJUST_REQUEST_LANE0_1, &mut adjust)?;

        if clock_recovery_ok(&status, self.lanes.len()) {
            io.tx.set_training_pattern(TrainingPattern::Pattern2);
            let sets = self.apply_adjustments(io.tx, &adjust);
            io.write_dpcd_byte(
                DPCD_ADDR_TRAINING_PATTERN_SET,
                DPCD_SCRAMBLING_DISABLED | DPCD_TRAINING_PATTERN_2,
            )?;
            io.write_dpcd(DPCD_ADDR_TRAINING_LANE0_SET, &sets)?;
            info!("clock recovery done");
            self.set_state(TrainingState::EqualizerTraining);
            return Ok(());
        }

        let mut stuck = false;
        for (index, lane) in self.lanes.iter_mut().enumerate() {
            let swing = adjust_voltage_swing(&adjust, index);
            let pre = adjust_pre_emphasis(&adjust, index);
            if swing == MAX_LEVEL || pre == MAX_LEVEL {
                error!("lane {} requested maximum drive level", index);
                stuck = true;
            }
            if lane.matches(swing, pre) {
                lane.cr_loop_count = lane.cr_loop_count.saturating_add(1).min(MAX_CR_LOOP);
                if lane.cr_loop_count == MAX_CR_LOOP {
                    error!("lane {} stuck in clock recovery", index);
                    stuck = true;
                }
            }
        }
        if stuck {
            return self.reduce_link_rate(io);
        }

        let sets = self.apply_adjustments(io.tx, &adjust);
        io.write_dpcd(DPCD_ADDR_TRAINING_LANE0_SET, &sets)?;
        Ok(())
    }

    /// One equalisation poll.
    ///
    /// Clock recovery lost fails the session. Channel EQ ok (align bit plus
    /// every lane's EQ bits) disables the pattern, reads the trained link
    /// back from the transmitter and finishes. Otherwise the EQ counter is
    /// bumped; past [`MAX_EQ_LOOP`] the session fails, else the requested
    /// levels are applied.
    pub fn process_equalization<A, T, D>(
        &mut self,
        io: &mut LinkIo<'_, A, T, D>,
    ) -> Result<(), DpError<A::Error>>
    where
        A: AuxChannel,
        T: Transmitter,
        D: DelayNs,
    {
        self.settle(io, Phase::Equalization);

        let lanes = self.lanes.len();
        let mut status = [0u8; 2];
        io.read_dpcd(DPCD_ADDR_LANE0_1_STATUS, &mut status)?;
        if !clock_recovery_ok(&status, lanes) {
            error!("clock recovery lost during equalisation");
            return self.reduce_link_rate(io);
        }

        let align = io.read_dpcd_byte(DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED)?;
        let mut adjust = [0u8; 2];
        io.read_dpcd(DPCD_ADDR_ADJUST_REQUEST_LANE0_1, &mut adjust)?;

        if channel_eq_ok(&status, align, lanes) {
            training_pattern_disable(io)?;
            let rate = io.tx.link_bandwidth();
            let count = io.tx.lane_count();
            self.link = LinkConfig::new(
                LaneCount::from_count(count).unwrap_or(self.link.lane_count),
                LinkRate::from_code(rate).unwrap_or(self.link.link_rate),
            );
            info!(
                "link training done: {} lanes at {}",
                self.link.lane_count.get(),
                self.link.link_rate.as_str()
            );
            self.set_state(TrainingState::Finished);
            return Ok(());
        }

        self.eq_loop = self.eq_loop.saturating_add(1);
        if self.eq_loop > MAX_EQ_LOOP {
            error!("equalisation did not converge in {} polls", self.eq_loop);
            return self.reduce_link_rate(io);
        }
        let sets = self.apply_adjustments(io.tx, &adjust);
        io.write_dpcd(DPCD_ADDR_TRAINING_LANE0_SET, &sets)?;
        Ok(())
    }

    /// Disable the training pattern and fail the session.
    ///
    /// The rate itself is lowered by whoever retries the session.
    pub fn reduce_link_rate<A, T, D>(
        &mut self,
        io: &mut LinkIo<'_, A, T, D>,
    ) -> Result<(), DpError<A::Error>>
    where
        A: AuxChannel,
        T: Transmitter,
        D: DelayNs,
    {
        self.rate_reductions = self.rate_reductions.saturating_add(1);
        self.set_state(TrainingState::Failed);
        training_pattern_disable(io)
    }

    /// Run a whole session from `START` to a terminal state.
    ///
    /// The number of steps is bounded: a sink that keeps changing its
    /// requests without converging fails the session after
    /// [`DP_TIMEOUT_LOOP_COUNT`] steps.
    pub fn run<A, T, D>(&mut self, io: &mut LinkIo<'_, A, T, D>) -> Result<LinkConfig, DpError<A::Error>>
    where
        A: AuxChannel,
        T: Transmitter,
        D: DelayNs,
    {
        self.state = TrainingState::Start;
        self.rate_reductions = 0;
        let mut steps: u32 = 0;
        loop {
            match self.state {
                TrainingState::Start => self.link_start(io)?,
                TrainingState::ClockRecovery => self.process_clock_recovery(io)?,
                TrainingState::EqualizerTraining => self.process_equalization(io)?,
                TrainingState::Finished => return Ok(self.link),
                TrainingState::Failed => return Err(DpError::LinkTraining),
            }
            steps = steps.saturating_add(1);
            if steps > DP_TIMEOUT_LOOP_COUNT && !self.state.is_terminal() {
                error!("link training did not settle in {} steps", steps);
                self.reduce_link_rate(io)?;
            }
        }
    }
}

// ── Link helpers ─────────────────────────────────────────────────────────────

/// Pattern generator off on both ends.
fn training_pattern_disable<A, T, D>(io: &mut LinkIo<'_, A, T, D>) -> Result<(), DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    io.tx.set_training_pattern(TrainingPattern::None);
    io.write_dpcd_byte(DPCD_ADDR_TRAINING_PATTERN_SET, DPCD_TRAINING_PATTERN_DISABLED)
}

/// Prepare the PHY and negotiate the link to train.
///
/// Resets the PHY macro, applies the PSR framing setup when PSR is
/// supported, reads the sink maxima and negotiates them against `source`,
/// then powers the analog blocks up.
///
/// Returns the negotiated link and the framing the session must program
/// into `LANE_COUNT_SET`. The PSR setup switches the transmitter to
/// enhanced framing, so the sink is told the same whatever `enhanced_frame`
/// was on entry.
pub fn init_training<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    source: LinkConfig,
    psr: PsrSupport,
    enhanced_frame: bool,
) -> Result<(LinkConfig, bool), DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    io.tx.reset_macro();

    if psr.is_enabled() {
        io.update_dpcd_byte(DPCD_ADDR_LANE_COUNT_SET, |v| v & !DPCD_ENHANCED_FRAME_EN)?;
        io.update_dpcd_byte(DPCD_ADDR_CONFIGURATION_SET, |v| v | DPCD_EDP_FRAMING_CHANGE_EN)?;
        io.tx.enable_enhanced_mode(true);
    }

    let sink_rate = io.read_dpcd_byte(DPCD_ADDR_MAX_LINK_RATE)?;
    let sink_lanes = io.read_dpcd_byte(DPCD_ADDR_MAX_LANE_COUNT)? & DPCD_LANE_COUNT_MASK;
    let link = LinkConfig::negotiate(source, sink_rate, sink_lanes);

    if psr.is_enabled() {
        io.tx.enable_ssc(false);
    }
    io.tx.set_analog_power_down(AnalogBlock::All, false);
    Ok((link, enhanced_frame || psr.is_enabled()))
}

/// Run up to `mode.retry.attempts` sessions.
///
/// Returns the trained link, or `None` when a non-fatal policy ran out of
/// attempts. A fatal policy turns exhaustion into [`DpError::LinkTraining`].
/// Transport and timeout errors abort immediately in either case.
pub fn train<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    mode: TrainingMode,
    link: LinkConfig,
    enhanced_frame: bool,
) -> Result<Option<LinkConfig>, DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    let mut session = TrainingSession::new(mode, link, enhanced_frame);
    let attempts = mode.retry.attempts.max(1);
    for attempt in 1..=attempts {
        match session.run(io) {
            Ok(trained) => return Ok(Some(trained)),
            Err(DpError::LinkTraining) => {
                debug!("training session {} of {} failed", attempt, attempts);
            }
            Err(e) => return Err(e),
        }
    }
    if mode.retry.fatal {
        error!("link training failed");
        Err(DpError::LinkTraining)
    } else {
        warn!("link training failed after {} sessions, continuing", attempts);
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::{MockAux, MockDelay, MockTransmitter, TxCall};

    const HBR_X2: LinkConfig = LinkConfig::new(LaneCount::Two, LinkRate::Hbr);

    struct Rig {
        aux: MockAux,
        tx: MockTransmitter,
        delay: MockDelay,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                aux: MockAux::new(),
                tx: MockTransmitter::new(),
                delay: MockDelay::new(),
            }
        }

        fn io(&mut self) -> LinkIo<'_, MockAux, MockTransmitter, MockDelay> {
            LinkIo::new(&mut self.aux, &mut self.tx, &mut self.delay)
        }
    }

    #[test]
    fn link_start_enters_clock_recovery_with_fresh_lanes() {
        let mut rig = Rig::new();
        let mut session = TrainingSession::new(TrainingMode::NORMAL, HBR_X2, false);
        session.link_start(&mut rig.io()).unwrap();

        assert_eq!(session.state(), TrainingState::ClockRecovery);
        assert_eq!(session.lanes().len(), 2);
        for lane in session.lanes() {
            assert_eq!(lane.cr_loop_count, 0);
            assert_eq!(lane.pre_emphasis, START_PRE_EMPHASIS);
            assert_eq!(lane.voltage_swing, 0);
        }
        assert_eq!(rig.aux.writes_to(DPCD_ADDR_LINK_BW_SET), vec![vec![0x0A, 0x02]]);
        assert_eq!(rig.aux.reg(DPCD_ADDR_SINK_POWER_STATE), DPCD_SET_POWER_STATE_D0);
        assert_eq!(rig.aux.reg(DPCD_ADDR_TRAINING_PATTERN_SET), 0x21);
        assert_eq!(rig.aux.writes_to(DPCD_ADDR_TRAINING_LANE0_SET), vec![vec![0, 0]]);
    }

    #[test]
    fn link_start_sets_enhanced_frame_bit() {
        let mut rig = Rig::new();
        let mut session = TrainingSession::new(TrainingMode::NORMAL, HBR_X2, true);
        session.link_start(&mut rig.io()).unwrap();
        assert_eq!(rig.aux.writes_to(DPCD_ADDR_LINK_BW_SET), vec![vec![0x0A, 0x82]]);
    }

    #[test]
    fn psr_resume_start_leaves_link_programming_alone() {
        let mut rig = Rig::new();
        let mut session = TrainingSession::new(TrainingMode::PSR_RESUME, HBR_X2, false);
        session.link_start(&mut rig.io()).unwrap();
        assert!(rig.aux.writes_to(DPCD_ADDR_LINK_BW_SET).is_empty());
        assert!(rig.aux.writes_to(DPCD_ADDR_SINK_POWER_STATE).is_empty());
        assert_eq!(rig.tx.count(TxCall::SetLanePreEmphasis(0, 1)), 0);
        assert_eq!(rig.tx.count(TxCall::SetTrainingPattern(TrainingPattern::Pattern1)), 1);
    }

    #[test]
    fn clock_recovery_waits_for_lane_zero() {
        let mut rig = Rig::new();
        rig.aux.set(DPCD_ADDR_LANE0_1_STATUS, 0x10);
        let mut session = TrainingSession::new(TrainingMode::NORMAL, HBR_X2, false);
        session.link_start(&mut rig.io()).unwrap();
        session.process_clock_recovery(&mut rig.io()).unwrap();
        assert_eq!(session.state(), TrainingState::ClockRecovery);
        assert_eq!(rig.delay.total_ns(), u64::from(CR_SETTLE_US) * 1_000);
    }

    #[test]
    fn requested_max_swing_fails_session() {
        let mut rig = Rig::new();
        rig.aux.set(DPCD_ADDR_ADJUST_REQUEST_LANE0_1, 0x03);
        let mut session = TrainingSession::new(TrainingMode::NORMAL, HBR_X2, false);
        session.link_start(&mut rig.io()).unwrap();
        session.process_clock_recovery(&mut rig.io()).unwrap();
        assert_eq!(session.state(), TrainingState::Failed);
        assert_eq!(session.rate_reductions(), 1);
        assert_eq!(rig.aux.reg(DPCD_ADDR_TRAINING_PATTERN_SET), DPCD_TRAINING_PATTERN_DISABLED);
    }

    #[test]
    fn equalization_loss_of_clock_recovery_fails() {
        let mut rig = Rig::new();
        rig.aux.script(DPCD_ADDR_LANE0_1_STATUS, &[0x11, 0x01]);
        let mut session = TrainingSession::new(TrainingMode::NORMAL, HBR_X2, false);
        session.link_start(&mut rig.io()).unwrap();
        session.process_clock_recovery(&mut rig.io()).unwrap();
        session.process_equalization(&mut rig.io()).unwrap();
        assert_eq!(session.state(), TrainingState::Failed);
    }

    #[test]
    fn equalization_gives_up_after_max_eq_loop() {
        let mut rig = Rig::new();
        // CR ok, EQ never: status nibbles 0x1, align set
        rig.aux.set(DPCD_ADDR_LANE0_1_STATUS, 0x11);
        rig.aux.set(DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED, 0x01);
        let mut session = TrainingSession::new(TrainingMode::NORMAL, HBR_X2, false);
        assert_eq!(session.run(&mut rig.io()), Err(DpError::LinkTraining));
        assert_eq!(session.eq_loop(), MAX_EQ_LOOP + 1);
        assert_eq!(session.rate_reductions(), 1);
    }

    #[test]
    fn psr_resume_syncs_on_self_refresh_before_eq() {
        let mut rig = Rig::new();
        rig.aux.set(DPCD_ADDR_LANE0_1_STATUS, 0x77);
        rig.aux.set(DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED, 0x01);
        rig.tx.set_link_bandwidth(0x0A);
        rig.tx.set_lane_count(2);
        let mut session = TrainingSession::new(TrainingMode::PSR_RESUME, HBR_X2, false);
        assert_eq!(session.run(&mut rig.io()), Ok(HBR_X2));
        assert_eq!(rig.tx.count(TxCall::WaitSelfRefresh), 1);
        assert_eq!(rig.delay.calls(), 0);
    }

    #[test]
    fn non_fatal_policy_reports_none() {
        let mut rig = Rig::new();
        let mode = TrainingMode {
            retry: RetryPolicy {
                attempts: 2,
                fatal: false,
            },
            ..TrainingMode::NORMAL
        };
        rig.aux.set(DPCD_ADDR_ADJUST_REQUEST_LANE0_1, 0x33);
        assert_eq!(train(&mut rig.io(), mode, HBR_X2, false), Ok(None));
        assert_eq!(rig.aux.read_count(DPCD_ADDR_LANE0_1_STATUS), 2);
        assert_eq!(
            train(&mut rig.io(), TrainingMode::NORMAL, HBR_X2, false),
            Err(DpError::LinkTraining)
        );
    }

    #[test]
    fn transport_error_aborts_training() {
        let mut rig = Rig::new();
        rig.aux.fail_read_at(Some(DPCD_ADDR_LANE0_1_STATUS));
        let mode = TrainingMode::PSR_RESUME;
        let err = train(&mut rig.io(), mode, HBR_X2, false);
        assert!(matches!(err, Err(DpError::Transport(_))));
        assert_eq!(rig.tx.count(TxCall::SetTrainingPattern(TrainingPattern::Pattern1)), 1);
    }

    #[test]
    fn init_training_negotiates_with_sink() {
        let mut rig = Rig::new();
        rig.aux.set(DPCD_ADDR_MAX_LINK_RATE, 0x06).set(DPCD_ADDR_MAX_LANE_COUNT, 0x84);
        let source = LinkConfig::new(LaneCount::Two, LinkRate::Hbr);
        let (link, enhanced) =
            init_training(&mut rig.io(), source, PsrSupport::Disabled, false).unwrap();
        assert_eq!(link, LinkConfig::new(LaneCount::Two, LinkRate::Rbr));
        assert!(!enhanced);
        assert_eq!(rig.tx.count(TxCall::ResetMacro), 1);
        assert_eq!(rig.tx.count(TxCall::AnalogPowerDown(AnalogBlock::All, false)), 1);
        assert_eq!(rig.tx.count(TxCall::EnableSsc(false)), 0);
    }

    #[test]
    fn init_training_psr_framing_setup() {
        let mut rig = Rig::new();
        rig.aux
            .set(DPCD_ADDR_MAX_LINK_RATE, 0x0A)
            .set(DPCD_ADDR_MAX_LANE_COUNT, 0x02)
            .set(DPCD_ADDR_LANE_COUNT_SET, 0x82);
        let (_, enhanced) =
            init_training(&mut rig.io(), HBR_X2, PsrSupport::Enabled, false).unwrap();
        assert!(enhanced);
        assert_eq!(rig.aux.reg(DPCD_ADDR_LANE_COUNT_SET), 0x02);
        assert_eq!(rig.aux.reg(DPCD_ADDR_CONFIGURATION_SET), DPCD_EDP_FRAMING_CHANGE_EN);
        assert_eq!(rig.tx.count(TxCall::EnableEnhancedMode(true)), 1);
        assert_eq!(rig.tx.count(TxCall::EnableSsc(false)), 1);
    }
}
