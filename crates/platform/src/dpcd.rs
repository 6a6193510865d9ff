//! DPCD (DisplayPort Configuration Data) register map
//!
//! Source: VESA DisplayPort Standard v1.1a §3.5.1 and VESA eDP v1.3 §6
//! (Panel Self Refresh). Only the registers the link bring-up, training and
//! PSR paths touch are listed.
//!
//! # Packing conventions
//!
//! Several status and request registers pack two lanes per byte, 4 bits per
//! lane: the even lane lives in the low nibble, the odd lane in the high
//! nibble. Lanes 0/1 share the first register of the pair, lanes 2/3 the
//! second. Field extraction lives in `dp_core::lane`, not here.
//!
//! # EDID space
//!
//! EDID is not part of DPCD. It is read over I2C-over-AUX from the 7-bit
//! device address [`EDID_I2C_ADDR`], byte offsets 0..255.

// ---------------------------------------------------------------------------
// Receiver capability field (read-only)
// ---------------------------------------------------------------------------

/// DPCD revision (major nibble / minor nibble).
pub const DPCD_ADDR_DPCD_REV: u32 = 0x0000;

/// Maximum link rate of the main link lanes.
///
/// DP 1.1: `0x06` = 1.62 Gbps, `0x0A` = 2.7 Gbps.
pub const DPCD_ADDR_MAX_LINK_RATE: u32 = 0x0001;

/// Maximum lane count (bits 4:0) and enhanced framing capability (bit 7).
pub const DPCD_ADDR_MAX_LANE_COUNT: u32 = 0x0002;

/// Length of the receiver capability field read during bring-up
/// (`DPCD_REV` through `RECEIVE_PORT1_CAP_1`).
pub const DPCD_RECEIVER_CAP_SIZE: usize = 12;

// ---------------------------------------------------------------------------
// Link configuration field (read/write)
// ---------------------------------------------------------------------------

/// Link bandwidth setting (same encoding as [`DPCD_ADDR_MAX_LINK_RATE`]).
pub const DPCD_ADDR_LINK_BW_SET: u32 = 0x0100;

/// Lane count setting (bits 4:0) and enhanced frame enable (bit 7).
pub const DPCD_ADDR_LANE_COUNT_SET: u32 = 0x0101;

/// Training pattern select (bits 1:0) and scrambling disable (bit 5).
pub const DPCD_ADDR_TRAINING_PATTERN_SET: u32 = 0x0102;

/// Lane 0 drive setting. Lanes 1..3 follow at consecutive addresses.
///
/// bits\[1:0\] voltage swing, bit 2 max swing reached,
/// bits\[4:3\] pre-emphasis, bit 5 max pre-emphasis reached.
pub const DPCD_ADDR_TRAINING_LANE0_SET: u32 = 0x0103;

/// eDP configuration set (bit 1 = framing change enable for PSR panels).
///
/// Also cleared when switching the receiver out of enhanced framing.
pub const DPCD_ADDR_CONFIGURATION_SET: u32 = 0x010A;

/// PSR configuration (bit 0 = PSR enable).
pub const DPCD_ADDR_PSR_CONFIGURATION: u32 = 0x0170;

// ---------------------------------------------------------------------------
// Link / sink status field (read-only)
// ---------------------------------------------------------------------------

/// Lanes 0 and 1 status nibbles.
pub const DPCD_ADDR_LANE0_1_STATUS: u32 = 0x0202;

/// Lanes 2 and 3 status nibbles.
pub const DPCD_ADDR_LANE2_3_STATUS: u32 = 0x0203;

/// Interlane alignment status (bit 0 = interlane align done).
pub const DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED: u32 = 0x0204;

/// Adjustment request for lanes 0 and 1 (2 lanes / byte).
pub const DPCD_ADDR_ADJUST_REQUEST_LANE0_1: u32 = 0x0206;

/// Adjustment request for lanes 2 and 3 (2 lanes / byte).
pub const DPCD_ADDR_ADJUST_REQUEST_LANE2_3: u32 = 0x0207;

/// Automated test request from the sink.
pub const DPCD_ADDR_TEST_REQUEST: u32 = 0x0218;

/// Automated test response from the source.
pub const DPCD_ADDR_TEST_RESPONSE: u32 = 0x0260;

/// Checksum of the last EDID block read, written back on test request.
pub const DPCD_ADDR_TEST_EDID_CHECKSUM: u32 = 0x0261;

/// Vendor-specific PSR tuning registers written after video lock.
pub const DPCD_ADDR_USER_DEFINED1: u32 = 0x0491;
/// See [`DPCD_ADDR_USER_DEFINED1`].
pub const DPCD_ADDR_USER_DEFINED2: u32 = 0x0492;
/// See [`DPCD_ADDR_USER_DEFINED1`].
pub const DPCD_ADDR_USER_DEFINED3: u32 = 0x0493;

/// Panel vendor PSR pre-entry flag (write `0x01` once before PSR entry).
pub const DPCD_ADDR_PRE_ENTRY: u32 = 0x050A;

/// Sink power state (`0x01` = D0 normal operation).
pub const DPCD_ADDR_SINK_POWER_STATE: u32 = 0x0600;

/// Sink PSR status (bits 2:0 = sink self-refresh state).
pub const DPCD_ADDR_SINK_PSR_STATUS: u32 = 0x2008;

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// `LINK_BW_SET` code: 1.62 Gbps per lane (RBR).
pub const LINK_RATE_1_62GBPS: u8 = 0x06;

/// `LINK_BW_SET` code: 2.7 Gbps per lane (HBR).
pub const LINK_RATE_2_70GBPS: u8 = 0x0A;

/// Lane count field mask in `MAX_LANE_COUNT` / `LANE_COUNT_SET`.
pub const DPCD_LANE_COUNT_MASK: u8 = 0x1F;

/// Enhanced framing capability (`MAX_LANE_COUNT` bit 7).
pub const DPCD_ENHANCED_FRAME_CAP: u8 = 1 << 7;

/// Enhanced framing enable (`LANE_COUNT_SET` bit 7).
pub const DPCD_ENHANCED_FRAME_EN: u8 = 1 << 7;

/// eDP configuration set: framing change enable.
pub const DPCD_EDP_FRAMING_CHANGE_EN: u8 = 1 << 1;

/// Training pattern select: normal operation (training off).
pub const DPCD_TRAINING_PATTERN_DISABLED: u8 = 0x00;

/// Training pattern select: TPS1 (clock recovery).
pub const DPCD_TRAINING_PATTERN_1: u8 = 0x01;

/// Training pattern select: TPS2 (channel equalisation).
pub const DPCD_TRAINING_PATTERN_2: u8 = 0x02;

/// `TRAINING_PATTERN_SET` bit 5: scrambling disabled.
pub const DPCD_SCRAMBLING_DISABLED: u8 = 1 << 5;

/// `TRAINING_LANEx_SET` bit 2: maximum voltage swing reached.
pub const DPCD_MAX_SWING_REACHED: u8 = 1 << 2;

/// `TRAINING_LANEx_SET` bit 5: maximum pre-emphasis reached.
pub const DPCD_MAX_PRE_EMPHASIS_REACHED: u8 = 1 << 5;

/// Bit offset of the pre-emphasis field in `TRAINING_LANEx_SET`.
pub const DPCD_PRE_EMPHASIS_SHIFT: u8 = 3;

/// Two-bit field mask (voltage swing or pre-emphasis level).
pub const DPCD_LEVEL_MASK: u8 = 0x03;

/// Lane status nibble bit 0: clock recovery done.
pub const DPCD_LANE_CR_DONE: u8 = 1 << 0;

/// Lane status nibble bit 1: channel equalisation done.
pub const DPCD_LANE_CHANNEL_EQ_DONE: u8 = 1 << 1;

/// Lane status nibble bit 2: symbol locked.
pub const DPCD_LANE_SYMBOL_LOCKED: u8 = 1 << 2;

/// All three bits required for a lane to count as equalised.
pub const DPCD_CHANNEL_EQ_BITS: u8 =
    DPCD_LANE_CR_DONE | DPCD_LANE_CHANNEL_EQ_DONE | DPCD_LANE_SYMBOL_LOCKED;

/// `LANE_ALIGN_STATUS_UPDATED` bit 0: interlane alignment done.
pub const DPCD_INTERLANE_ALIGN_DONE: u8 = 1 << 0;

/// `TEST_REQUEST` bit 2: sink requests the EDID checksum handshake.
pub const DPCD_TEST_EDID_READ: u8 = 1 << 2;

/// `TEST_RESPONSE` bit 2: EDID checksum has been written.
pub const DPCD_TEST_EDID_CHECKSUM_WRITE: u8 = 1 << 2;

/// `SINK_POWER_STATE`: D0, normal operation.
pub const DPCD_SET_POWER_STATE_D0: u8 = 0x01;

/// `PSR_CONFIGURATION` bit 0: PSR enable.
pub const DPCD_PSR_ENABLE: u8 = 1 << 0;

/// `PRE_ENTRY` value announcing imminent PSR entry.
pub const DPCD_PRE_ENTRY_REQUEST: u8 = 0x01;

/// `SINK_PSR_STATUS`: sink is not in self-refresh.
pub const SINK_PSR_INACTIVE_STATE: u8 = 0x00;

/// `SINK_PSR_STATUS`: sink is resynchronising to the source timing on exit.
///
/// Accepted as "inactive" by the exit path.
pub const SINK_PSR_RESYNC_STATE: u8 = 0x04;

/// Vendor PSR tuning values for `USER_DEFINED1..3`, in address order.
pub const PSR_VENDOR_TUNING: [(u32, u8); 3] = [
    (DPCD_ADDR_USER_DEFINED1, 0x80),
    (DPCD_ADDR_USER_DEFINED2, 0x04),
    (DPCD_ADDR_USER_DEFINED3, 0x31),
];

// ---------------------------------------------------------------------------
// EDID over I2C-over-AUX
// ---------------------------------------------------------------------------

/// 7-bit I2C address of the EDID EEPROM.
pub const EDID_I2C_ADDR: u8 = 0x50;

/// Length of one EDID block.
pub const EDID_BLOCK_LENGTH: usize = 128;

/// Offset of the first header byte.
pub const EDID_HEADER_PATTERN: u8 = 0x00;

/// Offset of the "number of extension blocks" byte in the base block.
pub const EDID_EXTENSION_FLAG: u8 = 0x7E;

/// Offset of the checksum byte within each block.
pub const EDID_CHECKSUM: usize = 0x7F;

/// Maximum payload of one AUX transaction.
pub const AUX_MAX_BURST: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_eq_bits_cover_cr_eq_and_symbol_lock() {
        assert_eq!(DPCD_CHANNEL_EQ_BITS, 0x07);
    }

    #[test]
    fn training_lane_fields_do_not_overlap() {
        let swing = DPCD_LEVEL_MASK;
        let emphasis = DPCD_LEVEL_MASK << DPCD_PRE_EMPHASIS_SHIFT;
        assert_eq!(swing & emphasis, 0);
        assert_eq!(swing & DPCD_MAX_SWING_REACHED, 0);
        assert_eq!(emphasis & DPCD_MAX_PRE_EMPHASIS_REACHED, 0);
        assert_eq!(DPCD_MAX_SWING_REACHED & DPCD_MAX_PRE_EMPHASIS_REACHED, 0);
    }

    #[test]
    fn training_pattern_2_with_scrambling_disabled_is_0x22() {
        assert_eq!(DPCD_SCRAMBLING_DISABLED | DPCD_TRAINING_PATTERN_2, 0x22);
    }

    #[test]
    fn status_registers_are_contiguous_for_bulk_reads() {
        assert_eq!(DPCD_ADDR_LANE2_3_STATUS, DPCD_ADDR_LANE0_1_STATUS + 1);
        assert_eq!(DPCD_ADDR_ADJUST_REQUEST_LANE2_3, DPCD_ADDR_ADJUST_REQUEST_LANE0_1 + 1);
    }

    #[test]
    fn edid_extension_block_offset_fits_in_one_byte() {
        assert!(u8::try_from(EDID_BLOCK_LENGTH).is_ok());
        assert_eq!(EDID_BLOCK_LENGTH % AUX_MAX_BURST, 0);
    }
}
