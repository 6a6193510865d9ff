//! Controller bring-up steps around link training
//!
//! Reset sequence, hot-plug wait, scrambling and framing negotiation, and
//! the PSR link configuration applied once video is up.

use embedded_hal::delay::DelayNs;
use platform::dpcd::{
    DPCD_ADDR_CONFIGURATION_SET, DPCD_ADDR_LANE_COUNT_SET, DPCD_ADDR_MAX_LANE_COUNT,
    DPCD_ADDR_PSR_CONFIGURATION, DPCD_ADDR_TRAINING_PATTERN_SET, DPCD_ENHANCED_FRAME_CAP,
    DPCD_ENHANCED_FRAME_EN, DPCD_PSR_ENABLE, DPCD_SCRAMBLING_DISABLED, PSR_VENDOR_TUNING,
};
use platform::{AuxChannel, Transmitter};

use crate::config::{FrameMode, HPD_POLL_US, HPD_SETTLE_US};
use crate::error::{DpError, PollTarget};
use crate::io::LinkIo;

/// Controller reset and block initialisation, in hardware order.
pub fn init_dp<T: Transmitter>(tx: &mut T) {
    tx.reset();
    tx.enable_sw_function();
    tx.config_interrupt();
    tx.init_analog_func();
    tx.init_hpd();
    tx.init_aux();
}

/// Re-arm hot-plug detection and wait for the sink to assert HPD.
pub fn detect_hpd<A, T, D>(io: &mut LinkIo<'_, A, T, D>) -> Result<(), DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    io.tx.init_hpd();
    io.delay.delay_us(HPD_SETTLE_US);
    io.poll(PollTarget::HotPlug, HPD_POLL_US, |_, tx| Ok(tx.hpd_asserted()))
}

/// Scrambling on or off on both ends of the link.
pub fn set_scrambling<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    enable: bool,
) -> Result<(), DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    io.tx.enable_scrambling(enable);
    io.update_dpcd_byte(DPCD_ADDR_TRAINING_PATTERN_SET, |v| {
        if enable {
            v & !DPCD_SCRAMBLING_DISABLED
        } else {
            v | DPCD_SCRAMBLING_DISABLED
        }
    })
}

/// Apply `mode` to both ends. Returns whether enhanced framing is on.
///
/// [`FrameMode::Enhanced`] only takes effect if the sink advertises the
/// capability; otherwise both ends stay in normal framing.
pub fn configure_framing<A, T, D>(
    io: &mut LinkIo<'_, A, T, D>,
    mode: FrameMode,
) -> Result<bool, DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    let enhanced = match mode {
        FrameMode::Normal => false,
        FrameMode::Enhanced => {
            let capable =
                io.read_dpcd_byte(DPCD_ADDR_MAX_LANE_COUNT)? & DPCD_ENHANCED_FRAME_CAP != 0;
            if !capable {
                warn!("sink lacks enhanced framing, using normal framing");
            }
            capable
        }
    };

    if enhanced {
        io.update_dpcd_byte(DPCD_ADDR_LANE_COUNT_SET, |v| v | DPCD_ENHANCED_FRAME_EN)?;
    } else {
        io.write_dpcd_byte(DPCD_ADDR_CONFIGURATION_SET, 0)?;
        io.update_dpcd_byte(DPCD_ADDR_LANE_COUNT_SET, |v| v & !DPCD_ENHANCED_FRAME_EN)?;
    }
    io.tx.enable_enhanced_mode(enhanced);
    Ok(enhanced)
}

/// Source PSR registers, vendor tuning writes, then PSR enable on the sink.
pub fn configure_psr_link<A, T, D>(io: &mut LinkIo<'_, A, T, D>) -> Result<(), DpError<A::Error>>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    io.tx.configure_psr();
    for (addr, value) in PSR_VENDOR_TUNING {
        io.write_dpcd_byte(addr, value)?;
    }
    io.write_dpcd_byte(DPCD_ADDR_PSR_CONFIGURATION, DPCD_PSR_ENABLE)?;
    debug!("PSR link configuration written");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::{MockAux, MockDelay, MockTransmitter, TxCall};

    #[test]
    fn init_dp_runs_in_hardware_order() {
        let mut tx = MockTransmitter::new();
        init_dp(&mut tx);
        assert_eq!(
            tx.calls(),
            &[
                TxCall::Reset,
                TxCall::EnableSwFunction,
                TxCall::ConfigInterrupt,
                TxCall::InitAnalogFunc,
                TxCall::InitHpd,
                TxCall::InitAux,
            ]
        );
    }

    #[test]
    fn hpd_timeout() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        tx.script_hpd(&[false]);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(detect_hpd(&mut io), Err(DpError::Timeout(PollTarget::HotPlug)));
    }

    #[test]
    fn hpd_settles_before_polling() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        tx.script_hpd(&[false, true]);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        detect_hpd(&mut io).unwrap();
        assert_eq!(delay.total_ns(), u64::from(HPD_SETTLE_US + HPD_POLL_US) * 1_000);
    }

    #[test]
    fn scrambling_toggles_disable_bit() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        aux.set(DPCD_ADDR_TRAINING_PATTERN_SET, 0x01);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        set_scrambling(&mut io, false).unwrap();
        assert_eq!(io.aux.reg(DPCD_ADDR_TRAINING_PATTERN_SET), 0x21);
        set_scrambling(&mut io, true).unwrap();
        assert_eq!(io.aux.reg(DPCD_ADDR_TRAINING_PATTERN_SET), 0x01);
        assert_eq!(tx.count(TxCall::EnableScrambling(false)), 1);
    }

    #[test]
    fn enhanced_framing_needs_sink_capability() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        aux.set(DPCD_ADDR_MAX_LANE_COUNT, 0x02).set(DPCD_ADDR_CONFIGURATION_SET, 0x02);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        assert_eq!(configure_framing(&mut io, FrameMode::Enhanced), Ok(false));
        assert_eq!(io.aux.reg(DPCD_ADDR_CONFIGURATION_SET), 0);

        io.aux.set(DPCD_ADDR_MAX_LANE_COUNT, 0x82);
        assert_eq!(configure_framing(&mut io, FrameMode::Enhanced), Ok(true));
        assert_eq!(io.aux.reg(DPCD_ADDR_LANE_COUNT_SET), DPCD_ENHANCED_FRAME_EN);
        assert_eq!(tx.count(TxCall::EnableEnhancedMode(true)), 1);
    }

    #[test]
    fn psr_link_configuration_writes_tuning_then_enable() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        configure_psr_link(&mut io).unwrap();
        let addrs: Vec<u32> = aux.writes().iter().map(|w| w.addr).collect();
        assert_eq!(addrs, vec![0x491, 0x492, 0x493, DPCD_ADDR_PSR_CONFIGURATION]);
        assert_eq!(aux.reg(0x493), 0x31);
        assert_eq!(tx.count(TxCall::ConfigurePsr), 1);
    }
}
