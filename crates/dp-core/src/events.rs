//! Async workers around [`DpDevice`]
//!
//! The display stack posts [`PowerEvent`]s on one channel and listens for
//! [`PowerEvent::PsrDone`] on another. Interrupts reach the recovery worker
//! through [`DpDevice::on_irq`]. Both workers run forever; spawn them on the
//! executor that owns the device.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embedded_hal::delay::DelayNs;
use platform::{AuxChannel, PanelPower, PowerEvent, Transmitter};

use crate::device::DpDevice;

/// Feed power events into the PSR machine and publish completions.
///
/// A full `done` channel drops the notification with a warning rather than
/// stalling the event path.
pub async fn serve_power_events<M, A, T, D, P, const IN: usize, const OUT: usize>(
    device: &DpDevice<M, A, T, D, P>,
    events: Receiver<'_, M, PowerEvent, IN>,
    done: Sender<'_, M, PowerEvent, OUT>,
) -> !
where
    M: RawMutex,
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
    P: PanelPower,
{
    loop {
        let event = events.receive().await;
        match device.handle_power_event(event) {
            Ok(Some(reply)) => {
                if done.try_send(reply).is_err() {
                    warn!("event channel full, {} dropped", reply.as_str());
                }
            }
            Ok(None) => {}
            Err(e) => error!("{} failed: {}", event.as_str(), e.as_str()),
        }
    }
}

/// Service hot-plug interrupts: one [`DpDevice::esd_recover`] per signal.
pub async fn serve_recovery<M, A, T, D, P>(device: &DpDevice<M, A, T, D, P>) -> !
where
    M: RawMutex,
    A: AuxChannel,
    T: Transmitter,
    D: DelayNs,
    P: PanelPower,
{
    loop {
        device.wait_irq().await;
        match device.esd_recover() {
            Ok(true) => info!("link restarted after hot-plug storm"),
            Ok(false) => {}
            Err(e) => error!("link recovery failed: {}", e.as_str()),
        }
    }
}
