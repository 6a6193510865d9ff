//! Device context: enable/disable orchestration, PSR entry points, recovery
//!
//! [`DpDevice`] owns the hardware handles and the steady-state link record
//! behind one lock. Every public operation holds the lock for its whole
//! duration, so link enable/disable and PSR transitions are totally
//! ordered. A call made while another operation holds the context (for
//! example from inside [`DpDevice::with_hardware`]) fails with
//! [`DpError::Busy`] instead of deadlocking.
//!
//! # Choosing the raw mutex
//!
//! The lock is an `embassy_sync` blocking mutex and operations include
//! millisecond-scale polls. `NoopRawMutex` or `ThreadModeRawMutex` suit
//! drivers run from a single executor; `CriticalSectionRawMutex` masks
//! interrupts for the duration of every operation.
//!
//! The interrupt path never takes the lock: [`DpDevice::on_irq`] only
//! signals the recovery worker (see [`crate::events::serve_recovery`]).

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embedded_hal::delay::DelayNs;
use platform::{AnalogBlock, AuxChannel, PanelPower, PowerEvent, Transmitter};

use crate::bringup::{configure_framing, configure_psr_link, detect_hpd, init_dp, set_scrambling};
use crate::config::{DeviceConfig, ESD_RECOVERY_THRESHOLD, MAX_ENABLE_RETRIES};
use crate::edid::{handle_edid, Edid, SinkCaps};
use crate::error::DpError;
use crate::io::LinkIo;
use crate::lane::LinkConfig;
use crate::psr::{self, PsrEnterState, PsrOutcome, PsrState};
use crate::training::{init_training, train, TrainingMode};
use crate::video::config_video;

/// Snapshot of the steady-state link record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStatus {
    /// Link is enabled.
    pub enabled: bool,
    /// Last trained link (the configured maxima before the first training).
    pub link: LinkConfig,
    /// Enhanced framing in use.
    pub enhanced_frame: bool,
    /// PSR flags.
    pub psr: PsrState,
    /// Sink capabilities from the last EDID read.
    pub sink: Option<SinkCaps>,
    /// Hot-plug interrupts counted towards the next recovery.
    pub hpd_events: u8,
}

struct Inner<A, T, D, P> {
    aux: A,
    tx: T,
    delay: D,
    panel: P,
    config: DeviceConfig,
    enabled: bool,
    link: LinkConfig,
    enhanced_frame: bool,
    psr: PsrState,
    sink: Option<SinkCaps>,
    edid: Option<Edid>,
    hpd_events: u8,
}

impl<A, T, D, P> Inner<A, T, D, P>
where
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
    P: PanelPower,
{
    fn status(&self) -> LinkStatus {
        LinkStatus {
            enabled: self.enabled,
            link: self.link,
            enhanced_frame: self.enhanced_frame,
            psr: self.psr,
            sink: self.sink,
            hpd_events: self.hpd_events,
        }
    }

    /// One full bring-up attempt with `source` as the link maxima.
    fn bring_up(&mut self, source: LinkConfig) -> Result<(), DpError<A::Error>> {
        let config = self.config;
        let mut io = LinkIo::new(&mut self.aux, &mut self.tx, &mut self.delay);

        init_dp(io.tx);
        if config.detect_hpd {
            detect_hpd(&mut io)?;
        }
        if config.read_edid {
            let (caps, edid) = handle_edid(io.aux)?;
            self.sink = Some(caps);
            self.edid = Some(edid);
        }

        set_scrambling(&mut io, false)?;
        let enhanced = configure_framing(&mut io, config.frame_mode)?;
        let (link, enhanced) = init_training(&mut io, source, config.psr, enhanced)?;
        self.enhanced_frame = enhanced;

        let trained =
            train(&mut io, TrainingMode::NORMAL, link, enhanced)?.ok_or(DpError::LinkTraining)?;
        io.tx.set_lane_count(trained.lane_count.get());
        io.tx.set_link_bandwidth(trained.link_rate.code());
        self.link = trained;

        io.tx.init_video();
        config_video(&mut io, &config.video)?;

        if config.psr.is_enabled() {
            configure_psr_link(&mut io)?;
        }
        Ok(())
    }

    fn enable(&mut self) -> Result<(), DpError<A::Error>> {
        if self.enabled {
            debug!("link already enabled");
            return Ok(());
        }
        self.enabled = true;
        self.psr = PsrState::default();
        self.tx.enable_clock();
        self.tx.runtime_get();

        let mut source = LinkConfig::new(self.config.video.lane_count, self.config.video.link_rate);
        let mut retries: u8 = 0;
        loop {
            let Err(e) = self.bring_up(source) else {
                break;
            };
            if matches!(e, DpError::LinkTraining) {
                if let Some(lower) = source.link_rate.downgrade() {
                    warn!("lowering link rate to {}", lower.as_str());
                    source.link_rate = lower;
                }
            }
            if retries >= MAX_ENABLE_RETRIES {
                error!("link bring-up failed after {} retries: {}", retries, e.as_str());
                self.panel.backlight_off();
                self.panel.lcd_off();
                self.disable();
                return Err(e);
            }
            retries = retries.saturating_add(1);
            warn!("link bring-up failed ({}), power-cycling panel, retry {}", e.as_str(), retries);
            self.panel.lcd_off();
            self.panel.lcd_on();
        }

        self.panel.backlight_on();
        info!(
            "{}: link up, {} lanes at {}",
            self.config.video.name,
            self.link.lane_count.get(),
            self.link.link_rate.as_str()
        );
        Ok(())
    }

    fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.tx.reset();
        self.tx.set_pll_power_down(true);
        self.tx.set_analog_power_down(AnalogBlock::All, true);
        // PSR entry already gated the clock.
        if self.psr.enter != PsrEnterState::EnterDone {
            self.tx.disable_clock();
        }
        self.tx.runtime_put();
        self.enabled = false;
        self.hpd_events = 0;
        info!("link disabled");
    }

    fn esd_event(&mut self) -> Result<bool, DpError<A::Error>> {
        self.tx.init_hpd();
        self.hpd_events = self.hpd_events.saturating_add(1);
        if self.hpd_events < ESD_RECOVERY_THRESHOLD {
            debug!("hot-plug event {}", self.hpd_events);
            return Ok(false);
        }
        self.hpd_events = 0;
        warn!("repeated hot-plug events, restarting link");
        self.disable();
        self.enable()?;
        Ok(true)
    }
}

/// eDP/DP source device.
///
/// `M` is the raw mutex guarding the context, `A`/`T`/`D`/`P` the AUX
/// channel, transmitter, delay provider and panel power hooks.
pub struct DpDevice<M: RawMutex, A, T, D, P> {
    inner: Mutex<M, RefCell<Inner<A, T, D, P>>>,
    irq: Signal<M, ()>,
    config: DeviceConfig,
}

impl<M, A, T, D, P> DpDevice<M, A, T, D, P>
where
    M: RawMutex,
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
    P: PanelPower,
{
    /// Create a disabled device. Nothing touches the hardware until
    /// [`enable`](Self::enable).
    pub fn new(config: DeviceConfig, aux: A, tx: T, delay: D, panel: P) -> Self {
        let link = LinkConfig::new(config.video.lane_count, config.video.link_rate);
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                aux,
                tx,
                delay,
                panel,
                config,
                enabled: false,
                link,
                enhanced_frame: false,
                psr: PsrState::default(),
                sink: None,
                edid: None,
                hpd_events: 0,
            })),
            irq: Signal::new(),
            config,
        }
    }

    fn with<R>(
        &self,
        f: impl FnOnce(&mut Inner<A, T, D, P>) -> Result<R, DpError<A::Error>>,
    ) -> Result<R, DpError<A::Error>> {
        self.inner.lock(|cell| {
            let mut inner = cell.try_borrow_mut().map_err(|_| DpError::Busy)?;
            f(&mut inner)
        })
    }

    /// Configuration supplied at construction.
    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    /// Snapshot of the link record.
    pub fn status(&self) -> Result<LinkStatus, DpError<A::Error>> {
        self.with(|inner| Ok(inner.status()))
    }

    /// EDID from the last successful read.
    pub fn edid(&self) -> Result<Option<Edid>, DpError<A::Error>> {
        self.with(|inner| Ok(inner.edid.clone()))
    }

    /// Run `f` on the hardware handles under the device lock.
    pub fn with_hardware<R>(
        &self,
        f: impl FnOnce(&mut A, &mut T, &mut D, &mut P) -> R,
    ) -> Result<R, DpError<A::Error>> {
        self.with(|inner| Ok(f(&mut inner.aux, &mut inner.tx, &mut inner.delay, &mut inner.panel)))
    }

    /// Bring the link up: reset, optional HPD wait and EDID read, training,
    /// video lock, PSR configuration.
    ///
    /// A failed attempt power-cycles the panel and retries, up to
    /// [`MAX_ENABLE_RETRIES`] times; a training failure also lowers the
    /// link rate for the next attempt. When every attempt fails the panel
    /// and backlight are switched off, the link is fully disabled again and
    /// the last error is returned. No-op if already enabled.
    pub fn enable(&self) -> Result<(), DpError<A::Error>> {
        self.with(Inner::enable)
    }

    /// Reset and power the link down. No-op if already disabled.
    pub fn disable(&self) -> Result<(), DpError<A::Error>> {
        self.with(|inner| {
            inner.disable();
            Ok(())
        })
    }

    /// `true` enables, `false` disables.
    pub fn set_power(&self, on: bool) -> Result<(), DpError<A::Error>> {
        if on {
            self.enable()
        } else {
            self.disable()
        }
    }

    /// Backlight and panel off, then disable the link.
    pub fn shutdown(&self) -> Result<(), DpError<A::Error>> {
        self.with(|inner| {
            inner.panel.backlight_off();
            inner.panel.lcd_off();
            inner.disable();
            Ok(())
        })
    }

    /// Send the PSR pre-entry flag (once per entry cycle).
    pub fn psr_pre_entry(&self) -> Result<PsrOutcome, DpError<A::Error>> {
        self.with(|inner| {
            let mut io = LinkIo::new(&mut inner.aux, &mut inner.tx, &mut inner.delay);
            psr::pre_entry(&mut io, &mut inner.psr)
        })
    }

    /// Enter self-refresh.
    pub fn psr_enter(&self) -> Result<PsrOutcome, DpError<A::Error>> {
        self.with(|inner| {
            let mut io = LinkIo::new(&mut inner.aux, &mut inner.tx, &mut inner.delay);
            psr::enter(&mut io, &mut inner.psr)
        })
    }

    /// Mark an exit as pending; entry requests are skipped until
    /// [`psr_exit`](Self::psr_exit) has run.
    pub fn request_psr_exit(&self) -> Result<(), DpError<A::Error>> {
        self.with(|inner| {
            inner.psr.request_exit();
            Ok(())
        })
    }

    /// Leave self-refresh, retrain and resume video. The link record takes
    /// the rate and lane count the retraining settled on.
    pub fn psr_exit(&self) -> Result<PsrOutcome, DpError<A::Error>> {
        self.with(|inner| {
            let enhanced = inner.enhanced_frame;
            let mut io = LinkIo::new(&mut inner.aux, &mut inner.tx, &mut inner.delay);
            psr::exit(&mut io, &mut inner.psr, &mut inner.link, enhanced)
        })
    }

    /// Map a display power event onto the PSR machine.
    ///
    /// Returns `Some(PowerEvent::PsrDone)` when an entry completed. Events
    /// are ignored when PSR is not supported, and `PsrDone` is never
    /// consumed here.
    pub fn handle_power_event(
        &self,
        event: PowerEvent,
    ) -> Result<Option<PowerEvent>, DpError<A::Error>> {
        if !self.config.psr.is_enabled() {
            debug!("PSR unsupported, ignoring {}", event.as_str());
            return Ok(None);
        }
        match event {
            PowerEvent::PsrPreEntry => self.psr_pre_entry().map(|_| None),
            PowerEvent::PsrEnter => Ok(match self.psr_enter()? {
                PsrOutcome::Done => Some(PowerEvent::PsrDone),
                PsrOutcome::Skipped => None,
            }),
            PowerEvent::PsrExit => {
                self.request_psr_exit()?;
                self.psr_exit().map(|_| None)
            }
            PowerEvent::PsrDone => Ok(None),
        }
    }

    /// Interrupt entry point: wake the recovery worker. Never blocks.
    pub fn on_irq(&self) {
        self.irq.signal(());
    }

    /// Wait for the next [`on_irq`](Self::on_irq).
    pub async fn wait_irq(&self) {
        self.irq.wait().await;
    }

    /// Handle one hot-plug interrupt: re-arm detection and count it; the
    /// third consecutive event restarts the link with a full
    /// disable/enable cycle. Returns whether a restart ran.
    pub fn esd_recover(&self) -> Result<bool, DpError<A::Error>> {
        self.with(Inner::esd_event)
    }

    /// Give the hardware handles back.
    pub fn into_parts(self) -> (A, T, D, P) {
        let inner = self.inner.into_inner().into_inner();
        (inner.aux, inner.tx, inner.delay, inner.panel)
    }
}
