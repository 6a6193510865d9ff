//! Per-lane link model and DPCD field decoding
//!
//! Status and adjustment-request registers pack two lanes per byte:
//!
//! ```text
//! byte n:  [ 7 6 5 4 | 3 2 1 0 ]
//!            lane 2n+1  lane 2n
//!
//! status nibble:   bit0 CR_DONE, bit1 CHANNEL_EQ_DONE, bit2 SYMBOL_LOCKED
//! adjust nibble:   bits1:0 voltage swing, bits3:2 pre-emphasis
//! ```
//!
//! The functions here are pure so the training engine can be tested
//! without a register layer. Lanes beyond the supplied bytes read as zero.

use platform::dpcd::{
    DPCD_CHANNEL_EQ_BITS, DPCD_INTERLANE_ALIGN_DONE, DPCD_LANE_CR_DONE, DPCD_LEVEL_MASK,
    DPCD_MAX_PRE_EMPHASIS_REACHED, DPCD_MAX_SWING_REACHED, DPCD_PRE_EMPHASIS_SHIFT,
};
use platform::{LaneCount, LinkRate};

/// Highest voltage-swing / pre-emphasis level.
pub const MAX_LEVEL: u8 = 3;

// ── Field extraction ─────────────────────────────────────────────────────────

fn nibble(bytes: &[u8], lane: usize) -> u8 {
    let byte = bytes.get(lane / 2).copied().unwrap_or(0);
    if lane % 2 == 0 {
        byte & 0x0F
    } else {
        byte >> 4
    }
}

/// Status nibble of `lane` from the `LANEx_y_STATUS` bytes.
#[must_use]
pub fn lane_status(status: &[u8], lane: usize) -> u8 {
    nibble(status, lane)
}

/// Requested voltage swing of `lane` from the `ADJUST_REQUEST` bytes.
#[must_use]
pub fn adjust_voltage_swing(adjust: &[u8], lane: usize) -> u8 {
    nibble(adjust, lane) & DPCD_LEVEL_MASK
}

/// Requested pre-emphasis of `lane` from the `ADJUST_REQUEST` bytes.
#[must_use]
pub fn adjust_pre_emphasis(adjust: &[u8], lane: usize) -> u8 {
    (nibble(adjust, lane) >> 2) & DPCD_LEVEL_MASK
}

/// Every active lane reports `CR_DONE`.
#[must_use]
pub fn clock_recovery_ok(status: &[u8], lanes: usize) -> bool {
    (0..lanes).all(|lane| lane_status(status, lane) & DPCD_LANE_CR_DONE != 0)
}

/// Interlane alignment is done and every active lane reports CR, EQ and
/// symbol lock. Per-lane bits alone are not enough.
#[must_use]
pub fn channel_eq_ok(status: &[u8], align: u8, lanes: usize) -> bool {
    align & DPCD_INTERLANE_ALIGN_DONE != 0
        && (0..lanes)
            .all(|lane| lane_status(status, lane) & DPCD_CHANNEL_EQ_BITS == DPCD_CHANNEL_EQ_BITS)
}

/// `TRAINING_LANEx_SET` byte for the given levels, max flags included.
#[must_use]
pub fn training_lane_set(voltage_swing: u8, pre_emphasis: u8) -> u8 {
    let swing = voltage_swing & DPCD_LEVEL_MASK;
    let pre = pre_emphasis & DPCD_LEVEL_MASK;
    let mut value = swing | (pre << DPCD_PRE_EMPHASIS_SHIFT);
    if swing == MAX_LEVEL {
        value |= DPCD_MAX_SWING_REACHED;
    }
    if pre == MAX_LEVEL {
        value |= DPCD_MAX_PRE_EMPHASIS_REACHED;
    }
    value
}

// ── Lane state ───────────────────────────────────────────────────────────────

/// Drive levels and clock-recovery bookkeeping of one lane.
///
/// `max_*_reached` is always set when the matching level is 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LaneState {
    /// Voltage swing level, 0..=3.
    pub voltage_swing: u8,
    /// Pre-emphasis level, 0..=3.
    pub pre_emphasis: u8,
    /// Clock-recovery polls in a row with an unchanged request.
    pub cr_loop_count: u8,
    /// Swing at its highest level.
    pub max_swing_reached: bool,
    /// Pre-emphasis at its highest level.
    pub max_pre_emphasis_reached: bool,
}

impl LaneState {
    /// Decode a `TRAINING_LANEx_SET` byte. The loop counter starts at 0.
    #[must_use]
    pub fn from_training_set(value: u8) -> Self {
        let voltage_swing = value & DPCD_LEVEL_MASK;
        let pre_emphasis = (value >> DPCD_PRE_EMPHASIS_SHIFT) & DPCD_LEVEL_MASK;
        Self {
            voltage_swing,
            pre_emphasis,
            cr_loop_count: 0,
            max_swing_reached: value & DPCD_MAX_SWING_REACHED != 0 || voltage_swing == MAX_LEVEL,
            max_pre_emphasis_reached: value & DPCD_MAX_PRE_EMPHASIS_REACHED != 0
                || pre_emphasis == MAX_LEVEL,
        }
    }

    /// Adopt new drive levels; the loop counter is kept.
    pub fn apply(&mut self, voltage_swing: u8, pre_emphasis: u8) {
        self.voltage_swing = voltage_swing & DPCD_LEVEL_MASK;
        self.pre_emphasis = pre_emphasis & DPCD_LEVEL_MASK;
        self.max_swing_reached = self.voltage_swing == MAX_LEVEL;
        self.max_pre_emphasis_reached = self.pre_emphasis == MAX_LEVEL;
    }

    /// Current levels equal the requested ones.
    #[must_use]
    pub fn matches(&self, voltage_swing: u8, pre_emphasis: u8) -> bool {
        self.voltage_swing == voltage_swing && self.pre_emphasis == pre_emphasis
    }

    /// Encode as a `TRAINING_LANEx_SET` byte.
    #[must_use]
    pub fn training_set(&self) -> u8 {
        training_lane_set(self.voltage_swing, self.pre_emphasis)
    }
}

// ── Link configuration ───────────────────────────────────────────────────────

/// Lane count and link rate of the main link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Active lanes.
    pub lane_count: LaneCount,
    /// Per-lane bit rate.
    pub link_rate: LinkRate,
}

impl LinkConfig {
    /// Bundle a lane count and link rate.
    #[must_use]
    pub const fn new(lane_count: LaneCount, link_rate: LinkRate) -> Self {
        Self {
            lane_count,
            link_rate,
        }
    }

    /// Sanitise the sink's raw capability values and take the minimum with
    /// the source maxima.
    ///
    /// An unknown rate code counts as 1.62 Gbps; a lane count of 0 counts
    /// as one lane and 3 rounds down to two.
    #[must_use]
    pub fn negotiate(source: Self, sink_rate_code: u8, sink_lane_count: u8) -> Self {
        let sink_rate = LinkRate::from_code(sink_rate_code).unwrap_or_else(|| {
            warn!("sink max link rate {} invalid, using 1.62Gbps", sink_rate_code);
            LinkRate::Rbr
        });
        let sink_lanes = LaneCount::floor(sink_lane_count).unwrap_or_else(|| {
            warn!("sink max lane count {} invalid, using 1", sink_lane_count);
            LaneCount::One
        });
        Self {
            lane_count: source.lane_count.min(sink_lanes),
            link_rate: source.link_rate.min(sink_rate),
        }
    }
}
