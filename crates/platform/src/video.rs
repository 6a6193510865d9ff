//! Link and video configuration types
//!
//! [`VideoInfo`] is supplied by the board configuration at device
//! construction. The link fields are the *source* maxima; the sink's own
//! capabilities are negotiated against them at training time.

use crate::dpcd::{LINK_RATE_1_62GBPS, LINK_RATE_2_70GBPS};

/// Main-link bit rate per lane.
///
/// The discriminant is the DPCD `LINK_BW_SET` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LinkRate {
    /// 1.62 Gbps (RBR)
    Rbr = LINK_RATE_1_62GBPS,
    /// 2.7 Gbps (HBR)
    Hbr = LINK_RATE_2_70GBPS,
}

impl LinkRate {
    /// Decode a DPCD link-rate code. Any other value is invalid.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            LINK_RATE_1_62GBPS => Some(Self::Rbr),
            LINK_RATE_2_70GBPS => Some(Self::Hbr),
            _ => None,
        }
    }

    /// DPCD `LINK_BW_SET` code.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Next lower rate, or `None` at the floor.
    #[must_use]
    pub fn downgrade(self) -> Option<Self> {
        match self {
            Self::Hbr => Some(Self::Rbr),
            Self::Rbr => None,
        }
    }

    /// Short name for log output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rbr => "1.62Gbps",
            Self::Hbr => "2.7Gbps",
        }
    }
}

/// Number of active main-link lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LaneCount {
    /// 1 lane
    One = 1,
    /// 2 lanes
    Two = 2,
    /// 4 lanes
    Four = 4,
}

impl LaneCount {
    /// Decode an exact lane count (1, 2 or 4).
    #[must_use]
    pub fn from_count(count: u8) -> Option<Self> {
        match count {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    /// Largest valid lane count not above `count`.
    ///
    /// `0` has no valid lane count below it and is reported as `None`.
    #[must_use]
    pub fn floor(count: u8) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(Self::One),
            2 | 3 => Some(Self::Two),
            _ => Some(Self::Four),
        }
    }

    /// Lane count as a number.
    #[must_use]
    pub fn get(self) -> u8 {
        self as u8
    }

    /// Lane count as an index bound.
    #[must_use]
    pub fn lanes(self) -> usize {
        usize::from(self.get())
    }
}

/// Bits per colour component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorDepth {
    /// 6 bpc
    Bpc6,
    /// 8 bpc
    Bpc8,
    /// 10 bpc
    Bpc10,
    /// 12 bpc
    Bpc12,
}

/// Pixel encoding on the main link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorSpace {
    /// RGB 4:4:4
    Rgb,
    /// YCbCr 4:2:2
    Ycbcr422,
    /// YCbCr 4:4:4
    Ycbcr444,
}

/// Quantisation range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DynamicRange {
    /// Full range (VESA)
    Vesa,
    /// Limited range (CEA-861)
    Cea,
}

/// YCbCr conversion coefficients (ignored for RGB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum YcbcrCoeff {
    /// ITU-R BT.601
    Itu601,
    /// ITU-R BT.709
    Itu709,
}

/// Board-supplied link and video configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VideoInfo {
    /// Panel name for log output.
    pub name: &'static str,
    /// Maximum lane count the source is wired for.
    pub lane_count: LaneCount,
    /// Maximum link rate the source may use.
    pub link_rate: LinkRate,
    /// Bits per component.
    pub color_depth: ColorDepth,
    /// Pixel encoding.
    pub color_space: ColorSpace,
    /// Quantisation range.
    pub dynamic_range: DynamicRange,
    /// YCbCr coefficients.
    pub ycbcr_coeff: YcbcrCoeff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_rate_codes_match_dpcd() {
        assert_eq!(LinkRate::Rbr.code(), 0x06);
        assert_eq!(LinkRate::Hbr.code(), 0x0A);
        assert_eq!(LinkRate::from_code(0x0A), Some(LinkRate::Hbr));
        assert_eq!(LinkRate::from_code(0x14), None);
        assert_eq!(LinkRate::from_code(0x00), None);
    }

    #[test]
    fn link_rate_ordering_follows_bandwidth() {
        assert!(LinkRate::Rbr < LinkRate::Hbr);
        assert_eq!(LinkRate::Hbr.downgrade(), Some(LinkRate::Rbr));
        assert_eq!(LinkRate::Rbr.downgrade(), None);
    }

    #[test]
    fn lane_count_floor_rounds_down_to_valid_width() {
        assert_eq!(LaneCount::floor(0), None);
        assert_eq!(LaneCount::floor(1), Some(LaneCount::One));
        assert_eq!(LaneCount::floor(3), Some(LaneCount::Two));
        assert_eq!(LaneCount::floor(4), Some(LaneCount::Four));
        assert_eq!(LaneCount::floor(31), Some(LaneCount::Four));
    }

    #[test]
    fn lane_count_exact_decode_rejects_three() {
        assert_eq!(LaneCount::from_count(3), None);
        assert_eq!(LaneCount::from_count(2), Some(LaneCount::Two));
    }
}
