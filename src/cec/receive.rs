use super::debounce::Debounce;
use super::frame::{header_destination, LogicalAddress, Message};
use super::timing::Ticks;
use super::transfer::BitTransfer;

/// Follower-side state of the frame currently on the bus.
#[derive(Debug, Clone)]
pub struct RxContext {
    pub(crate) transfer: BitTransfer,
    /// Initiator flagged the current block as the last one.
    pub(crate) eom: bool,
    /// Some follower pulled the ACK slot of a broadcast low.
    pub(crate) broadcast_nak: bool,
    /// Low part of the bit being measured.
    pub(crate) low_ticks: Ticks,
    pub(crate) debounce: Debounce,
}

impl RxContext {
    pub const fn new() -> Self {
        Self {
            transfer: BitTransfer::new(),
            eom: false,
            broadcast_nak: false,
            low_ticks: 0,
            debounce: Debounce::new(),
        }
    }

    /// Drops the frame in progress. The glitch counter is kept so noise
    /// bursts spanning several idle periods still escalate.
    pub fn restart(&mut self) {
        self.transfer.rewind();
        self.eom = false;
        self.broadcast_nak = false;
        self.low_ticks = 0;
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn destination(&self) -> LogicalAddress {
        header_destination(self.transfer.header())
    }

    pub fn message(&self) -> Message {
        // bytes() never exceeds the message capacity
        Message::from_slice(self.transfer.bytes()).unwrap_or_default()
    }
}

impl Default for RxContext {
    fn default() -> Self {
        Self::new()
    }
}
