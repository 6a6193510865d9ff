//! Borrowed hardware bundle shared by every protocol step
//!
//! [`LinkIo`] lifts AUX errors into [`DpError`] and owns the two bounded
//! poll loops. Fields are public so a step can borrow the transmitter and
//! the AUX channel at the same time.

use embedded_hal::delay::DelayNs;
use platform::{AuxChannel, Transmitter};

use crate::config::DP_TIMEOUT_LOOP_COUNT;
use crate::error::{DpError, PollTarget};

/// Mutable borrows of the AUX channel, transmitter and delay provider.
pub struct LinkIo<'a, A, T, D> {
    /// Sideband channel to the sink.
    pub aux: &'a mut A,
    /// Source controller.
    pub tx: &'a mut T,
    /// Blocking delay provider.
    pub delay: &'a mut D,
}

impl<'a, A, T, D> LinkIo<'a, A, T, D>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
{
    /// Bundle the three borrows.
    pub fn new(aux: &'a mut A, tx: &'a mut T, delay: &'a mut D) -> Self {
        Self { aux, tx, delay }
    }

    /// Read one DPCD register.
    pub fn read_dpcd_byte(&mut self, addr: u32) -> Result<u8, DpError<A::Error>> {
        self.aux.read_dpcd_byte(addr).map_err(DpError::Transport)
    }

    /// Write one DPCD register.
    pub fn write_dpcd_byte(&mut self, addr: u32, value: u8) -> Result<(), DpError<A::Error>> {
        self.aux.write_dpcd_byte(addr, value).map_err(DpError::Transport)
    }

    /// Read consecutive DPCD registers.
    pub fn read_dpcd(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), DpError<A::Error>> {
        self.aux.read_dpcd(addr, buf).map_err(DpError::Transport)
    }

    /// Write consecutive DPCD registers.
    pub fn write_dpcd(&mut self, addr: u32, data: &[u8]) -> Result<(), DpError<A::Error>> {
        self.aux.write_dpcd(addr, data).map_err(DpError::Transport)
    }

    /// Read-modify-write one DPCD register.
    pub fn update_dpcd_byte(
        &mut self,
        addr: u32,
        f: impl FnOnce(u8) -> u8,
    ) -> Result<(), DpError<A::Error>> {
        let value = self.read_dpcd_byte(addr)?;
        self.write_dpcd_byte(addr, f(value))
    }

    /// Poll `ready` until it returns `true`.
    ///
    /// The condition is checked before every sleep; after
    /// [`DP_TIMEOUT_LOOP_COUNT`] failed checks the next failure is a
    /// [`DpError::Timeout`] naming `target`. Errors from `ready` abort the
    /// poll immediately.
    pub fn poll(
        &mut self,
        target: PollTarget,
        interval_us: u32,
        mut ready: impl FnMut(&mut A, &mut T) -> Result<bool, DpError<A::Error>>,
    ) -> Result<(), DpError<A::Error>> {
        let mut checks: u32 = 0;
        loop {
            checks = checks.saturating_add(1);
            if ready(self.aux, self.tx)? {
                trace!("{} after {} polls", target.as_str(), checks);
                return Ok(());
            }
            if checks > DP_TIMEOUT_LOOP_COUNT {
                error!("timeout waiting for {}", target.as_str());
                return Err(DpError::Timeout(target));
            }
            self.delay.delay_us(interval_us);
        }
    }

    /// Poll `ready` until it has held for more than `debounce` consecutive
    /// checks. Any `false` restarts the run. Same budget as [`Self::poll`].
    pub fn poll_debounced(
        &mut self,
        target: PollTarget,
        interval_us: u32,
        debounce: u32,
        mut ready: impl FnMut(&mut A, &mut T) -> Result<bool, DpError<A::Error>>,
    ) -> Result<(), DpError<A::Error>> {
        let mut checks: u32 = 0;
        let mut run: u32 = 0;
        loop {
            checks = checks.saturating_add(1);
            if ready(self.aux, self.tx)? {
                run = run.saturating_add(1);
                if run > debounce {
                    trace!("{} stable after {} polls", target.as_str(), checks);
                    return Ok(());
                }
            } else if run != 0 {
                debug!("{} dropped after {} good polls", target.as_str(), run);
                run = 0;
            }
            if checks > DP_TIMEOUT_LOOP_COUNT {
                error!("timeout waiting for stable {}", target.as_str());
                return Err(DpError::Timeout(target));
            }
            self.delay.delay_us(interval_us);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::{MockAux, MockDelay, MockTransmitter};

    #[test]
    fn poll_returns_as_soon_as_ready() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        tx.script_pll(&[false, false, true]);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        io.poll(PollTarget::PllLock, 10, |_, tx| Ok(tx.pll_locked())).unwrap();
        assert_eq!(delay.total_ns(), 20_000);
    }

    #[test]
    fn poll_gives_up_after_loop_budget() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        tx.script_pll(&[false]);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        let err = io.poll(PollTarget::PllLock, 10, |_, tx| Ok(tx.pll_locked()));
        assert_eq!(err, Err(DpError::Timeout(PollTarget::PllLock)));
        // One sleep between each pair of the 101 checks.
        assert_eq!(delay.total_ns(), u64::from(DP_TIMEOUT_LOOP_COUNT) * 10_000);
    }

    #[test]
    fn poll_propagates_transport_error() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        aux.fail_read_at(Some(0x2008));
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        let err = io.poll(PollTarget::SinkPsrInactive, 100, |aux, _| {
            aux.read_dpcd_byte(0x2008).map(|v| v == 0).map_err(DpError::Transport)
        });
        assert!(matches!(err, Err(DpError::Transport(_))));
        assert_eq!(delay.calls(), 0);
    }

    #[test]
    fn debounce_restarts_on_glitch() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        // Five good polls, one glitch, then stable.
        tx.script_stream(&[true, true, true, true, true, false, true]);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        io.poll_debounced(PollTarget::VideoStream, 1_000, 10, |_, tx| Ok(tx.video_stream_on()))
            .unwrap();
        // 6 polls up to the glitch, then 11 consecutive good ones.
        assert_eq!(delay.calls(), 16);
    }

    #[test]
    fn debounce_times_out_on_flapping_stream() {
        let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
        let flapping: Vec<bool> = (0..200).map(|i| i % 5 != 0).collect();
        tx.script_stream(&flapping);
        let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);
        let err =
            io.poll_debounced(PollTarget::VideoStream, 1_000, 10, |_, tx| Ok(tx.video_stream_on()));
        assert_eq!(err, Err(DpError::Timeout(PollTarget::VideoStream)));
    }
}
