//! Everything that happens after the engine reports a completion: offline
//! interception, queueing for the host, and host notification.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::config::CecConfig;
use super::engine::Completion;
use super::frame::Message;
use super::offline::{process_offline_message, OfflineHost};
use super::rx_queue::{RxQueue, CEC_RX_BUFFER_SIZE};

pub const CEC_EVENT_SEND_OK: u32 = 1 << 0;
pub const CEC_EVENT_SEND_FAILED: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// A frame was queued, fetch it with `pop_message`.
    MessageAvailable,
    /// Send result bits are pending, fetch them with `take_events`.
    EventsPending,
}

pub trait CecHost: OfflineHost {
    fn notify(&mut self, notification: Notification);
}

/// Event bits for the host, fetched and cleared in one step.
pub struct HostEvents {
    bits: Mutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl HostEvents {
    pub const fn new() -> Self {
        Self {
            bits: Mutex::new(Cell::new(0)),
        }
    }

    pub fn raise(&self, event: u32) {
        self.bits.lock(|bits| bits.set(bits.get() | event));
    }

    pub fn take(&self) -> u32 {
        self.bits.lock(|bits| bits.replace(0))
    }

    /// Raises the bit for a send result. Returns false for anything else.
    pub fn record(&self, completion: &Completion) -> bool {
        match completion {
            Completion::SendOk => self.raise(CEC_EVENT_SEND_OK),
            Completion::SendFailed => self.raise(CEC_EVENT_SEND_FAILED),
            Completion::Received(_) => return false,
        }
        true
    }
}

impl Default for HostEvents {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CecService<'a, const N: usize = CEC_RX_BUFFER_SIZE> {
    config: CecConfig,
    queue: &'a RxQueue<N>,
    events: &'a HostEvents,
}

impl<'a, const N: usize> CecService<'a, N> {
    pub fn new(config: CecConfig, queue: &'a RxQueue<N>, events: &'a HostEvents) -> Self {
        Self {
            config,
            queue,
            events,
        }
    }

    pub fn handle<H: CecHost>(&self, completion: Completion, host: &mut H) {
        match completion {
            Completion::Received(msg) => self.received(&msg, host),
            result => {
                if self.events.record(&result) {
                    host.notify(Notification::EventsPending);
                }
            }
        }
    }

    fn received<H: CecHost>(&self, msg: &[u8], host: &mut H) {
        if process_offline_message(
            self.config.offline_policy,
            msg,
            self.config.power_button_press_ms,
            host,
        )
        .is_ok()
        {
            info!("Message consumed offline");
        }
        match self.queue.push_newest(msg) {
            Ok(()) => host.notify(Notification::MessageAvailable),
            Err(e) => warn!("Dropping CEC message: {:?}", e),
        }
    }

    pub fn pop_message(&self) -> Option<Message> {
        self.queue.pop()
    }

    pub fn take_events(&self) -> u32 {
        self.events.take()
    }

    /// Forgets queued messages and pending events, used when CEC is disabled.
    pub fn reset(&self) {
        self.queue.flush();
        self.events.take();
    }
}
