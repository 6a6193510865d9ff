//! EDID retrieval over I2C-over-AUX
//!
//! Only what bring-up needs: the base block, at most one extension block,
//! per-block checksum validation and the sink's automated-test handshake
//! (`TEST_REQUEST.TEST_EDID_READ` answered with the checksum of the last
//! block read). EDID contents are not parsed.

use platform::dpcd::{
    AUX_MAX_BURST, DPCD_ADDR_DPCD_REV, DPCD_ADDR_TEST_EDID_CHECKSUM, DPCD_ADDR_TEST_REQUEST,
    DPCD_ADDR_TEST_RESPONSE, DPCD_ENHANCED_FRAME_CAP, DPCD_LANE_COUNT_MASK,
    DPCD_RECEIVER_CAP_SIZE, DPCD_TEST_EDID_CHECKSUM_WRITE, DPCD_TEST_EDID_READ,
    EDID_BLOCK_LENGTH, EDID_CHECKSUM, EDID_EXTENSION_FLAG, EDID_HEADER_PATTERN, EDID_I2C_ADDR,
};
use platform::AuxChannel;

use crate::config::EDID_READ_ATTEMPTS;
use crate::error::DpError;

/// One 128-byte EDID block.
pub type EdidBlock = [u8; EDID_BLOCK_LENGTH];

/// Byte offset of the first extension block.
const EXTENSION_OFFSET: u8 = 0x80;

/// Sum of all bytes mod 256. A valid block sums to zero.
#[must_use]
pub fn block_checksum(block: &[u8]) -> u8 {
    block.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// EDID as read from the sink: base block plus optional extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edid {
    base: EdidBlock,
    extension: Option<EdidBlock>,
}

impl Edid {
    /// Base block (bytes 0..127).
    #[must_use]
    pub fn base(&self) -> &EdidBlock {
        &self.base
    }

    /// First extension block (bytes 128..255), if the sink has one.
    #[must_use]
    pub fn extension(&self) -> Option<&EdidBlock> {
        self.extension.as_ref()
    }

    /// Block read last; its checksum byte answers the test handshake.
    #[must_use]
    pub fn last_block(&self) -> &EdidBlock {
        self.extension.as_ref().unwrap_or(&self.base)
    }
}

/// Receiver capability field read before the EDID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SinkCaps {
    /// DPCD revision, major in the high nibble.
    pub dpcd_rev: u8,
    /// Raw `MAX_LINK_RATE` code.
    pub max_link_rate: u8,
    /// `MAX_LANE_COUNT` bits 4:0.
    pub max_lane_count: u8,
    /// Sink supports enhanced framing.
    pub enhanced_frame: bool,
    /// Raw capability bytes from `DPCD_REV` on.
    pub raw: [u8; DPCD_RECEIVER_CAP_SIZE],
}

impl SinkCaps {
    /// Decode the raw capability field.
    #[must_use]
    pub fn from_raw(raw: [u8; DPCD_RECEIVER_CAP_SIZE]) -> Self {
        let [dpcd_rev, max_link_rate, lane_byte, ..] = raw;
        Self {
            dpcd_rev,
            max_link_rate,
            max_lane_count: lane_byte & DPCD_LANE_COUNT_MASK,
            enhanced_frame: lane_byte & DPCD_ENHANCED_FRAME_CAP != 0,
            raw,
        }
    }
}

fn read_block<A: AuxChannel>(aux: &mut A, start: u8) -> Result<EdidBlock, DpError<A::Error>> {
    let mut block = [0u8; EDID_BLOCK_LENGTH];
    let offsets = (start..=u8::MAX).step_by(AUX_MAX_BURST);
    for (offset, chunk) in offsets.zip(block.chunks_mut(AUX_MAX_BURST)) {
        aux.write_read(EDID_I2C_ADDR, &[offset], chunk).map_err(DpError::Transport)?;
    }
    let sum = block_checksum(&block);
    if sum != 0 {
        warn!("EDID block at {} checksum off by {}", start, sum);
        return Err(DpError::Checksum);
    }
    Ok(block)
}

/// Read and validate the EDID, then answer a pending EDID test request.
///
/// Any transport error or checksum mismatch aborts the whole read.
pub fn read_edid<A: AuxChannel>(aux: &mut A) -> Result<Edid, DpError<A::Error>> {
    let mut flag = [0u8; 1];
    aux.write_read(EDID_I2C_ADDR, &[EDID_EXTENSION_FLAG], &mut flag)
        .map_err(DpError::Transport)?;
    let [extensions] = flag;

    let base = read_block(aux, EDID_HEADER_PATTERN)?;
    let extension = if extensions > 0 {
        debug!("EDID has {} extension block(s), reading one", extensions);
        Some(read_block(aux, EXTENSION_OFFSET)?)
    } else {
        None
    };
    let edid = Edid { base, extension };

    let test_request = aux.read_dpcd_byte(DPCD_ADDR_TEST_REQUEST).map_err(DpError::Transport)?;
    if test_request & DPCD_TEST_EDID_READ != 0 {
        let checksum = edid.last_block().get(EDID_CHECKSUM).copied().unwrap_or(0);
        aux.write_dpcd_byte(DPCD_ADDR_TEST_EDID_CHECKSUM, checksum)
            .map_err(DpError::Transport)?;
        aux.write_dpcd_byte(DPCD_ADDR_TEST_RESPONSE, DPCD_TEST_EDID_CHECKSUM_WRITE)
            .map_err(DpError::Transport)?;
        debug!("answered EDID test request, checksum {}", checksum);
    }

    Ok(edid)
}

/// Read the receiver capability field, then the EDID with up to
/// [`EDID_READ_ATTEMPTS`] whole-sequence attempts.
///
/// The error of the last attempt is returned when all of them fail.
pub fn handle_edid<A: AuxChannel>(aux: &mut A) -> Result<(SinkCaps, Edid), DpError<A::Error>> {
    let mut raw = [0u8; DPCD_RECEIVER_CAP_SIZE];
    aux.read_dpcd(DPCD_ADDR_DPCD_REV, &mut raw).map_err(DpError::Transport)?;
    let caps = SinkCaps::from_raw(raw);
    info!(
        "sink DPCD rev {}, max rate code {}, max lanes {}",
        caps.dpcd_rev, caps.max_link_rate, caps.max_lane_count
    );

    let mut attempt: u8 = 1;
    loop {
        match read_edid(aux) {
            Ok(edid) => return Ok((caps, edid)),
            Err(e) if attempt < EDID_READ_ATTEMPTS => {
                warn!("EDID read attempt {} failed: {}", attempt, e.as_str());
                attempt = attempt.saturating_add(1);
            }
            Err(e) => {
                error!("EDID read failed after {} attempts", attempt);
                return Err(e);
            }
        }
    }
}
