//! PSR idempotence: repeated transitions must not touch the hardware again.

#![allow(clippy::unwrap_used)]

use dp_core::psr::{enter, exit, pre_entry};
use dp_core::{LinkConfig, LinkIo, PsrEnterState, PsrExitState, PsrOutcome, PsrState};
use platform::dpcd::{DPCD_ADDR_LANE0_1_STATUS, DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED};
use platform::mocks::{MockAux, MockDelay, MockTransmitter, TxCall};
use platform::{LaneCount, LinkRate, Transmitter};

const LINK: LinkConfig = LinkConfig::new(LaneCount::Two, LinkRate::Hbr);

#[test]
fn second_enter_is_a_no_op() {
    let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
    let mut state = PsrState::default();
    let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);

    assert_eq!(enter(&mut io, &mut state), Ok(PsrOutcome::Done));
    let after_first = state;
    let calls_after_first = io.tx.calls().len();
    let delay_after_first = io.delay.total_ns();

    assert_eq!(enter(&mut io, &mut state), Ok(PsrOutcome::Skipped));
    assert_eq!(state, after_first);
    assert_eq!(io.tx.calls().len(), calls_after_first);
    assert_eq!(io.delay.total_ns(), delay_after_first);
    assert!(aux.writes().is_empty());
    assert_eq!(tx.count(TxCall::EnablePsr), 1);
    assert_eq!(tx.count(TxCall::DisableClock), 1);
}

#[test]
fn pre_entry_is_not_repeated_after_entry() {
    let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
    let mut state = PsrState::default();
    let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);

    pre_entry(&mut io, &mut state).unwrap();
    enter(&mut io, &mut state).unwrap();
    assert_eq!(pre_entry(&mut io, &mut state), Ok(PsrOutcome::Skipped));
    assert_eq!(aux.writes().len(), 1);
}

#[test]
fn full_cycle_then_second_exit_is_a_no_op() {
    let (mut aux, mut tx, mut delay) = (MockAux::new(), MockTransmitter::new(), MockDelay::new());
    aux.set(DPCD_ADDR_LANE0_1_STATUS, 0x77).set(DPCD_ADDR_LANE_ALIGN_STATUS_UPDATED, 0x01);
    tx.set_link_bandwidth(LINK.link_rate.code());
    tx.set_lane_count(LINK.lane_count.get());
    let mut state = PsrState::default();
    let mut link = LINK;
    let mut io = LinkIo::new(&mut aux, &mut tx, &mut delay);

    enter(&mut io, &mut state).unwrap();
    state.request_exit();
    assert_eq!(exit(&mut io, &mut state, &mut link, false), Ok(PsrOutcome::Done));
    assert_eq!(state.enter, PsrEnterState::None);
    assert_eq!(state.exit, PsrExitState::ExitDone);
    let writes = io.aux.writes().len();

    assert_eq!(exit(&mut io, &mut state, &mut link, false), Ok(PsrOutcome::Skipped));
    assert_eq!(io.aux.writes().len(), writes);
    assert_eq!(tx.count(TxCall::ExitPsr), 1);
}
