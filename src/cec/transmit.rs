//! Outgoing frame state: the single in-flight transmission and its resend
//! bookkeeping.

use num_enum::IntoPrimitive;

use super::error::SendError;
use super::frame::{header_destination, MAX_CEC_MSG_LEN};
use super::timing::{Ticks, NOMINAL_BIT};
use super::transfer::BitTransfer;

/// The bus allows at least one and at most five resends of a frame.
pub const CEC_MAX_RESENDS: u8 = 5;

/// Free time before a start bit, in nominal bit periods.
#[repr(u8)]
#[derive(IntoPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalFreeKind {
    Retransmit = 2,
    NewInitiator = 4,
    PresentInitiator = 6,
}

impl SignalFreeKind {
    pub fn required_free_time(&self) -> Ticks {
        u8::from(*self) as Ticks * NOMINAL_BIT
    }
}

/// Result of a NAKed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NakOutcome {
    Resend,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct TxContext {
    pub(crate) transfer: BitTransfer,
    len: usize,
    resends: u8,
    pub(crate) ack: bool,
    /// We drove the last start bit seen on the bus.
    pub(crate) present_initiator: bool,
}

impl TxContext {
    pub const fn new() -> Self {
        Self {
            transfer: BitTransfer::new(),
            len: 0,
            resends: 0,
            ack: false,
            present_initiator: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.len != 0
    }

    pub fn resends(&self) -> u8 {
        self.resends
    }

    /// Takes ownership of an outgoing frame. At most one frame is in flight.
    pub fn load(&mut self, msg: &[u8]) -> Result<(), SendError> {
        if msg.is_empty() || msg.len() > MAX_CEC_MSG_LEN {
            return Err(SendError::InvalidLength);
        }
        if self.is_pending() {
            return Err(SendError::Busy);
        }
        self.transfer.load(msg);
        self.len = msg.len();
        Ok(())
    }

    pub fn is_broadcast(&self) -> bool {
        header_destination(self.transfer.header()).is_broadcast()
    }

    pub fn is_eom(&self) -> bool {
        self.transfer.is_eom(self.len)
    }

    pub fn signal_free_kind(&self) -> SignalFreeKind {
        if self.resends > 0 {
            SignalFreeKind::Retransmit
        } else if self.present_initiator {
            SignalFreeKind::PresentInitiator
        } else {
            SignalFreeKind::NewInitiator
        }
    }

    pub fn on_nak(&mut self) -> NakOutcome {
        if self.resends < CEC_MAX_RESENDS {
            self.resends += 1;
            NakOutcome::Resend
        } else {
            NakOutcome::Exhausted
        }
    }

    /// Ends the transmission; the present-initiator flag survives so the next
    /// frame waits the longer free time.
    pub fn finish(&mut self) {
        self.len = 0;
        self.resends = 0;
        self.ack = false;
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for TxContext {
    fn default() -> Self {
        Self::new()
    }
}
