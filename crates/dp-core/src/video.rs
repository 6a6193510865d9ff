//! Video stream handshake
//!
//! Just enough of the pixel path to prove the sink locked onto the stream:
//! slave-mode capture in the configured colour format, the stream clock
//! check, then a debounced wait for the sink's stream-lock flag.

use embedded_hal::delay::DelayNs;
use platform::{AuxChannel, Transmitter, VideoInfo};

use crate::config::{VIDEO_CLOCK_POLL_US, VIDEO_LOCK_DEBOUNCE, VIDEO_LOCK_POLL_US};
use crate::error::{DpError, PollTarget};
use crate::io::LinkIo;

/// Configure capture from `info`, start video and wait for a stable lock.
///
/// Fails with [`DpError::PllUnlocked`] before touching the stream if the
/// link PLL is not locked.
pub fn config_video<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    info: &VideoInfo,
) -> Result<(), DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    io.tx.configure_video(info);

    if !io.tx.pll_locked() {
        error!("PLL is not locked yet");
        return Err(DpError::PllUnlocked);
    }

    io.poll(PollTarget::VideoClock, VIDEO_CLOCK_POLL_US, |_, tx| {
        Ok(tx.slave_video_clock_on())
    })?;

    io.tx.start_video();

    io.poll_debounced(
        PollTarget::VideoStream,
        VIDEO_LOCK_POLL_US,
        VIDEO_LOCK_DEBOUNCE,
        |_, tx| Ok(tx.video_stream_on()),
    )?;
    info!("video stream locked ({})", info.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::mocks::{MockAux, MockDelay, MockTransmitter, TxCall};
    use platform::{ColorDepth, ColorSpace, DynamicRange, LaneCount, LinkRate, YcbcrCoeff};

    const PANEL: VideoInfo = VideoInfo {
        name: "test panel",
        lane_count: LaneCount::Two,
        link_rate: LinkRate::Hbr,
        color_depth: ColorDepth::Bpc8,
        color_space: ColorSpace::Rgb,
        dynamic_range: DynamicRange::Vesa,
        ycbcr_coeff: YcbcrCoeff::Itu601,
    };

    #[test]
    fn stream_lock_needs_eleven_good_polls() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(config_video(&mut io, &PANEL), Ok(()));
        assert_eq!(tx.count(TxCall::StartVideo), 1);
        // 10 sleeps between 11 good polls
        assert_eq!(delay.total_ns(), 10 * u64::from(VIDEO_LOCK_POLL_US) * 1_000);
    }

    #[test]
    fn unlocked_pll_stops_before_start() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        tx.script_pll(&[false]);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(config_video(&mut io, &PANEL), Err(DpError::PllUnlocked));
        assert_eq!(tx.count(TxCall::ConfigureVideo), 1);
        assert_eq!(tx.count(TxCall::StartVideo), 0);
    }

    #[test]
    fn missing_stream_clock_times_out() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        tx.script_slave_clock(&[false]);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(
            config_video(&mut io, &PANEL),
            Err(DpError::Timeout(PollTarget::VideoClock))
        );
        assert_eq!(tx.count(TxCall::StartVideo), 0);
    }
}
