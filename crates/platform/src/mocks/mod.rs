//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests. Each mock records what was done
//! to it and can be scripted to return a sequence of status values: a
//! script is consumed one value per read, and the last value sticks.

#![cfg(any(test, feature = "std"))]

use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::aux::AuxChannel;
use crate::dpcd::EDID_I2C_ADDR;
use crate::panel::PanelPower;
use crate::transmitter::{AnalogBlock, PsrStatus, TrainingPattern, Transmitter};
use crate::video::VideoInfo;

// ── Script ───────────────────────────────────────────────────────────────────

/// Sequence of values returned by successive reads; the last one sticks.
#[derive(Debug, Clone)]
struct Script<T: Copy> {
    queue: VecDeque<T>,
    current: T,
}

impl<T: Copy> Script<T> {
    fn new(current: T) -> Self {
        Self {
            queue: VecDeque::new(),
            current,
        }
    }

    fn load(&mut self, values: &[T]) {
        self.queue = values.iter().copied().collect();
    }

    fn next(&mut self) -> T {
        if let Some(value) = self.queue.pop_front() {
            self.current = value;
        }
        self.current
    }
}

// ── MockAux ──────────────────────────────────────────────────────────────────

/// Error injected by [`MockAux`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockAuxError {
    /// Sink did not acknowledge the transaction.
    Nack,
    /// Sink kept deferring until the retry budget ran out.
    Defer,
}

impl embedded_hal::i2c::Error for MockAuxError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Self::Defer => ErrorKind::Other,
        }
    }
}

/// One logged DPCD write transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpcdWrite {
    /// First register address.
    pub addr: u32,
    /// Bytes written.
    pub data: Vec<u8>,
}

/// Scripted sink: a DPCD register file plus an EDID image.
///
/// Writes update the register file, so read-modify-write sequences see
/// their own results.
#[derive(Debug, Default)]
pub struct MockAux {
    regs: BTreeMap<u32, u8>,
    scripts: BTreeMap<u32, VecDeque<u8>>,
    reads: BTreeMap<u32, usize>,
    writes: Vec<DpcdWrite>,
    edid: Vec<u8>,
    edid_offset: usize,
    edid_reads: usize,
    fail_read: Option<u32>,
    fail_write: Option<u32>,
    fail_i2c: bool,
}

impl MockAux {
    /// Create an empty sink; every register reads as zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register value.
    pub fn set(&mut self, addr: u32, value: u8) -> &mut Self {
        self.regs.insert(addr, value);
        self
    }

    /// Queue values for successive reads of `addr`.
    pub fn script(&mut self, addr: u32, values: &[u8]) -> &mut Self {
        self.scripts.insert(addr, values.iter().copied().collect());
        self
    }

    /// Install the EDID image served on the I2C-over-AUX bus.
    pub fn set_edid(&mut self, image: &[u8]) -> &mut Self {
        self.edid = image.to_vec();
        self
    }

    /// Fail every DPCD read that touches `addr`.
    pub fn fail_read_at(&mut self, addr: Option<u32>) -> &mut Self {
        self.fail_read = addr;
        self
    }

    /// Fail every DPCD write that touches `addr`.
    pub fn fail_write_at(&mut self, addr: Option<u32>) -> &mut Self {
        self.fail_write = addr;
        self
    }

    /// Fail every I2C-over-AUX transaction.
    pub fn fail_i2c(&mut self, fail: bool) -> &mut Self {
        self.fail_i2c = fail;
        self
    }

    /// Current register value, without counting it as a read.
    pub fn reg(&self, addr: u32) -> u8 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    /// Number of DPCD reads that touched `addr`.
    pub fn read_count(&self, addr: u32) -> usize {
        self.reads.get(&addr).copied().unwrap_or(0)
    }

    /// All write transactions in order.
    pub fn writes(&self) -> &[DpcdWrite] {
        &self.writes
    }

    /// Payloads of the write transactions starting at `addr`, in order.
    pub fn writes_to(&self, addr: u32) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|w| w.addr == addr)
            .map(|w| w.data.clone())
            .collect()
    }

    /// Number of I2C read operations served from the EDID image.
    pub fn edid_reads(&self) -> usize {
        self.edid_reads
    }

    /// Forget logged reads and writes; register contents stay.
    pub fn clear_log(&mut self) {
        self.reads.clear();
        self.writes.clear();
        self.edid_reads = 0;
    }

    fn read_reg(&mut self, addr: u32) -> u8 {
        if let Some(value) = self.scripts.get_mut(&addr).and_then(VecDeque::pop_front) {
            self.regs.insert(addr, value);
        }
        let count = self.reads.entry(addr).or_insert(0);
        *count = count.saturating_add(1);
        self.reg(addr)
    }

    fn touches(start: u32, len: usize, target: Option<u32>) -> bool {
        target.is_some_and(|t| {
            t >= start && usize::try_from(t.saturating_sub(start)).is_ok_and(|off| off < len)
        })
    }
}

impl ErrorType for MockAux {
    type Error = MockAuxError;
}

impl I2c for MockAux {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail_i2c || address != EDID_I2C_ADDR {
            return Err(MockAuxError::Nack);
        }
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => {
                    self.edid_offset = data.first().copied().map_or(0, usize::from);
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.edid.get(self.edid_offset).copied().unwrap_or(0);
                        self.edid_offset = self.edid_offset.saturating_add(1);
                    }
                    self.edid_reads = self.edid_reads.saturating_add(1);
                }
            }
        }
        Ok(())
    }
}

impl AuxChannel for MockAux {
    fn read_dpcd(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        if Self::touches(addr, buf.len(), self.fail_read) {
            return Err(MockAuxError::Defer);
        }
        for (reg, byte) in (addr..).zip(buf.iter_mut()) {
            *byte = self.read_reg(reg);
        }
        Ok(())
    }

    fn write_dpcd(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error> {
        if Self::touches(addr, data.len(), self.fail_write) {
            return Err(MockAuxError::Defer);
        }
        for (reg, byte) in (addr..).zip(data.iter()) {
            self.regs.insert(reg, *byte);
        }
        self.writes.push(DpcdWrite {
            addr,
            data: data.to_vec(),
        });
        Ok(())
    }
}

// ── MockTransmitter ──────────────────────────────────────────────────────────

/// One recorded transmitter operation (status reads are not recorded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxCall {
    /// [`Transmitter::reset`]
    Reset,
    /// [`Transmitter::enable_sw_function`]
    EnableSwFunction,
    /// [`Transmitter::config_interrupt`]
    ConfigInterrupt,
    /// [`Transmitter::init_analog_func`]
    InitAnalogFunc,
    /// [`Transmitter::init_hpd`]
    InitHpd,
    /// [`Transmitter::init_aux`]
    InitAux,
    /// [`Transmitter::reset_macro`]
    ResetMacro,
    /// [`Transmitter::enable_clock`]
    EnableClock,
    /// [`Transmitter::disable_clock`]
    DisableClock,
    /// [`Transmitter::runtime_get`]
    RuntimeGet,
    /// [`Transmitter::runtime_put`]
    RuntimePut,
    /// [`Transmitter::set_analog_power_down`]
    AnalogPowerDown(AnalogBlock, bool),
    /// [`Transmitter::set_pll_power_down`]
    PllPowerDown(bool),
    /// [`Transmitter::enable_ssc`]
    EnableSsc(bool),
    /// [`Transmitter::set_link_bandwidth`]
    SetLinkBandwidth(u8),
    /// [`Transmitter::set_lane_count`]
    SetLaneCount(u8),
    /// [`Transmitter::set_lane_pre_emphasis`]
    SetLanePreEmphasis(usize, u8),
    /// [`Transmitter::set_lane_link_training`]
    SetLaneLinkTraining(usize, u8),
    /// [`Transmitter::set_training_pattern`]
    SetTrainingPattern(TrainingPattern),
    /// [`Transmitter::enable_scrambling`]
    EnableScrambling(bool),
    /// [`Transmitter::enable_enhanced_mode`]
    EnableEnhancedMode(bool),
    /// [`Transmitter::init_video`]
    InitVideo,
    /// [`Transmitter::configure_video`]
    ConfigureVideo,
    /// [`Transmitter::start_video`]
    StartVideo,
    /// [`Transmitter::configure_psr`]
    ConfigurePsr,
    /// [`Transmitter::enable_psr`]
    EnablePsr,
    /// [`Transmitter::exit_psr`]
    ExitPsr,
    /// [`Transmitter::set_fifo_reset`]
    SetFifoReset,
    /// [`Transmitter::clear_fifo_reset`]
    ClearFifoReset,
    /// [`Transmitter::set_idle_en`]
    SetIdleEn,
    /// [`Transmitter::set_force_stream_valid`]
    SetForceStreamValid,
    /// [`Transmitter::wait_self_refresh`]
    WaitSelfRefresh,
}

/// Recording source controller.
///
/// Status registers default to the healthy value (HPD asserted, PLL locked,
/// video clock and stream on). The PSR status follows `enable_psr` /
/// `exit_psr` unless a script has been loaded.
#[derive(Debug)]
pub struct MockTransmitter {
    calls: Vec<TxCall>,
    lanes: [u8; 4],
    link_bandwidth: u8,
    lane_count: u8,
    clock_enabled: bool,
    runtime_refs: u32,
    hpd: Script<bool>,
    pll: Script<bool>,
    slave_clock: Script<bool>,
    stream: Script<bool>,
    psr: Script<PsrStatus>,
    psr_scripted: bool,
}

impl MockTransmitter {
    /// Create a healthy controller with all registers zeroed.
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            lanes: [0; 4],
            link_bandwidth: 0,
            lane_count: 0,
            clock_enabled: false,
            runtime_refs: 0,
            hpd: Script::new(true),
            pll: Script::new(true),
            slave_clock: Script::new(true),
            stream: Script::new(true),
            psr: Script::new(PsrStatus::Inactive),
            psr_scripted: false,
        }
    }

    /// Script successive hot-plug reads.
    pub fn script_hpd(&mut self, values: &[bool]) -> &mut Self {
        self.hpd.load(values);
        self
    }

    /// Script successive PLL lock reads.
    pub fn script_pll(&mut self, values: &[bool]) -> &mut Self {
        self.pll.load(values);
        self
    }

    /// Script successive slave video clock reads.
    pub fn script_slave_clock(&mut self, values: &[bool]) -> &mut Self {
        self.slave_clock.load(values);
        self
    }

    /// Script successive video stream lock reads.
    pub fn script_stream(&mut self, values: &[bool]) -> &mut Self {
        self.stream.load(values);
        self
    }

    /// Script successive PSR status reads; disables automatic tracking.
    pub fn script_psr_status(&mut self, values: &[PsrStatus]) -> &mut Self {
        self.psr.load(values);
        self.psr_scripted = true;
        self
    }

    /// Recorded operations in order.
    pub fn calls(&self) -> &[TxCall] {
        &self.calls
    }

    /// How many times `call` was recorded.
    pub fn count(&self, call: TxCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    /// Forget recorded operations; register state stays.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Controller clock currently ungated.
    pub fn clock_enabled(&self) -> bool {
        self.clock_enabled
    }

    /// Outstanding runtime power references.
    pub fn runtime_refs(&self) -> u32 {
        self.runtime_refs
    }

    /// Drive register of `lane` (0 for lanes beyond 3).
    pub fn lane_register(&self, lane: usize) -> u8 {
        self.lanes.get(lane).copied().unwrap_or(0)
    }

    fn record(&mut self, call: TxCall) {
        self.calls.push(call);
    }
}

impl Default for MockTransmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transmitter for MockTransmitter {
    fn reset(&mut self) {
        self.lanes = [0; 4];
        self.record(TxCall::Reset);
    }

    fn enable_sw_function(&mut self) {
        self.record(TxCall::EnableSwFunction);
    }

    fn config_interrupt(&mut self) {
        self.record(TxCall::ConfigInterrupt);
    }

    fn init_analog_func(&mut self) {
        self.record(TxCall::InitAnalogFunc);
    }

    fn init_hpd(&mut self) {
        self.record(TxCall::InitHpd);
    }

    fn init_aux(&mut self) {
        self.record(TxCall::InitAux);
    }

    fn hpd_asserted(&mut self) -> bool {
        self.hpd.next()
    }

    fn reset_macro(&mut self) {
        self.record(TxCall::ResetMacro);
    }

    fn enable_clock(&mut self) {
        self.clock_enabled = true;
        self.record(TxCall::EnableClock);
    }

    fn disable_clock(&mut self) {
        self.clock_enabled = false;
        self.record(TxCall::DisableClock);
    }

    fn runtime_get(&mut self) {
        self.runtime_refs = self.runtime_refs.saturating_add(1);
        self.record(TxCall::RuntimeGet);
    }

    fn runtime_put(&mut self) {
        self.runtime_refs = self.runtime_refs.saturating_sub(1);
        self.record(TxCall::RuntimePut);
    }

    fn set_analog_power_down(&mut self, block: AnalogBlock, power_down: bool) {
        self.record(TxCall::AnalogPowerDown(block, power_down));
    }

    fn set_pll_power_down(&mut self, power_down: bool) {
        self.record(TxCall::PllPowerDown(power_down));
    }

    fn pll_locked(&mut self) -> bool {
        self.pll.next()
    }

    fn enable_ssc(&mut self, enable: bool) {
        self.record(TxCall::EnableSsc(enable));
    }

    fn set_link_bandwidth(&mut self, code: u8) {
        self.link_bandwidth = code;
        self.record(TxCall::SetLinkBandwidth(code));
    }

    fn link_bandwidth(&self) -> u8 {
        self.link_bandwidth
    }

    fn set_lane_count(&mut self, count: u8) {
        self.lane_count = count;
        self.record(TxCall::SetLaneCount(count));
    }

    fn lane_count(&self) -> u8 {
        self.lane_count
    }

    fn set_lane_pre_emphasis(&mut self, lane: usize, level: u8) {
        if let Some(reg) = self.lanes.get_mut(lane) {
            *reg = (*reg & !0x18) | ((level & 0x03) << 3);
        }
        self.record(TxCall::SetLanePreEmphasis(lane, level));
    }

    fn set_lane_link_training(&mut self, lane: usize, value: u8) {
        if let Some(reg) = self.lanes.get_mut(lane) {
            *reg = value;
        }
        self.record(TxCall::SetLaneLinkTraining(lane, value));
    }

    fn lane_link_training(&self, lane: usize) -> u8 {
        self.lane_register(lane)
    }

    fn set_training_pattern(&mut self, pattern: TrainingPattern) {
        self.record(TxCall::SetTrainingPattern(pattern));
    }

    fn enable_scrambling(&mut self, enable: bool) {
        self.record(TxCall::EnableScrambling(enable));
    }

    fn enable_enhanced_mode(&mut self, enable: bool) {
        self.record(TxCall::EnableEnhancedMode(enable));
    }

    fn init_video(&mut self) {
        self.record(TxCall::InitVideo);
    }

    fn configure_video(&mut self, _info: &VideoInfo) {
        self.record(TxCall::ConfigureVideo);
    }

    fn slave_video_clock_on(&mut self) -> bool {
        self.slave_clock.next()
    }

    fn start_video(&mut self) {
        self.record(TxCall::StartVideo);
    }

    fn video_stream_on(&mut self) -> bool {
        self.stream.next()
    }

    fn configure_psr(&mut self) {
        self.record(TxCall::ConfigurePsr);
    }

    fn enable_psr(&mut self) {
        if !self.psr_scripted {
            self.psr.current = PsrStatus::Active;
        }
        self.record(TxCall::EnablePsr);
    }

    fn exit_psr(&mut self) {
        if !self.psr_scripted {
            self.psr.current = PsrStatus::Inactive;
        }
        self.record(TxCall::ExitPsr);
    }

    fn psr_status(&mut self) -> PsrStatus {
        self.psr.next()
    }

    fn set_fifo_reset(&mut self) {
        self.record(TxCall::SetFifoReset);
    }

    fn clear_fifo_reset(&mut self) {
        self.record(TxCall::ClearFifoReset);
    }

    fn set_idle_en(&mut self) {
        self.record(TxCall::SetIdleEn);
    }

    fn set_force_stream_valid(&mut self) {
        self.record(TxCall::SetForceStreamValid);
    }

    fn wait_self_refresh(&mut self) {
        self.record(TxCall::WaitSelfRefresh);
    }
}

// ── MockPanel ────────────────────────────────────────────────────────────────

/// One recorded panel hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCall {
    /// [`PanelPower::lcd_on`]
    LcdOn,
    /// [`PanelPower::lcd_off`]
    LcdOff,
    /// [`PanelPower::backlight_on`]
    BacklightOn,
    /// [`PanelPower::backlight_off`]
    BacklightOff,
}

/// Recording panel power hooks.
#[derive(Debug, Default)]
pub struct MockPanel {
    calls: Vec<PanelCall>,
}

impl MockPanel {
    /// Create a panel with an empty call log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded hook invocations in order.
    pub fn calls(&self) -> &[PanelCall] {
        &self.calls
    }

    /// How many times `call` was recorded.
    pub fn count(&self, call: PanelCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl PanelPower for MockPanel {
    fn lcd_on(&mut self) {
        self.calls.push(PanelCall::LcdOn);
    }

    fn lcd_off(&mut self) {
        self.calls.push(PanelCall::LcdOff);
    }

    fn backlight_on(&mut self) {
        self.calls.push(PanelCall::BacklightOn);
    }

    fn backlight_off(&mut self) {
        self.calls.push(PanelCall::BacklightOff);
    }
}

// ── MockDelay ────────────────────────────────────────────────────────────────

/// Delay provider that returns immediately and accumulates the requested time.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockDelay {
    total_ns: u64,
    calls: usize,
}

impl MockDelay {
    /// Create a delay with nothing accumulated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in nanoseconds.
    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }

    /// Number of `delay_ns` calls.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns = self.total_ns.saturating_add(u64::from(ns));
        self.calls = self.calls.saturating_add(1);
    }
}
