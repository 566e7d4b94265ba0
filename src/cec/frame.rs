use heapless::Vec;

use crate::cec_types::CecOpCode;

/// Longest frame on the wire: header block plus 15 data blocks.
pub const MAX_CEC_MSG_LEN: usize = 16;

const MAX_CEC_OPERANDS: usize = MAX_CEC_MSG_LEN - 2;

/// Raw frame bytes as they appear on the bus, header block first.
pub type Message = Vec<u8, MAX_CEC_MSG_LEN>;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogicalAddress(pub u8);

impl LogicalAddress {
    /// No address has been assigned by the host yet.
    pub const UNREGISTERED: LogicalAddress = LogicalAddress(255);

    pub fn is_broadcast(&self) -> bool {
        self.0 == 15
    }

    pub fn is_registered(&self) -> bool {
        self.0 != Self::UNREGISTERED.0
    }

    pub const fn broadcast() -> LogicalAddress {
        LogicalAddress(15)
    }
}

/// Destination nibble of a header block.
pub fn header_destination(header: u8) -> LogicalAddress {
    LogicalAddress(header & 0x0f)
}

/// Typed view over a raw frame, used for logging and by the demo firmware.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CecFrame {
    pub initiator: LogicalAddress,
    pub dest: LogicalAddress,
    pub opcode: Option<u8>,
    pub operands: Vec<u8, MAX_CEC_OPERANDS>,
}

impl CecFrame {
    pub fn new(initiator: LogicalAddress, dest: LogicalAddress, opcode: CecOpCode) -> Self {
        Self {
            initiator,
            dest,
            opcode: Some(opcode.into()),
            operands: Vec::new(),
        }
    }

    /// A header-only frame from an address to itself, used to check whether a
    /// logical address is taken.
    pub fn poll(addr: LogicalAddress) -> Self {
        Self {
            initiator: addr,
            dest: addr,
            ..Default::default()
        }
    }

    pub fn is_polling_message(&self) -> bool {
        self.initiator == self.dest && self.opcode.is_none() && self.operands.is_empty()
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (&header, rest) = bytes.split_first()?;
        let operands = match rest.get(1..) {
            Some(operands) => Vec::from_slice(operands).ok()?,
            None => Vec::new(),
        };
        Some(Self {
            initiator: LogicalAddress(header >> 4),
            dest: header_destination(header),
            opcode: rest.first().copied(),
            operands,
        })
    }

    /// Encodes the frame into wire bytes. Operands without an opcode are dropped.
    pub fn to_message(&self) -> Message {
        let mut msg = Message::new();
        // Capacity is one header + one opcode + MAX_CEC_OPERANDS, so pushes cannot fail.
        let _ = msg.push((self.initiator.0 << 4) | (self.dest.0 & 0x0f));
        if let Some(opcode) = self.opcode {
            let _ = msg.push(opcode);
            let _ = msg.extend_from_slice(&self.operands);
        }
        msg
    }
}
