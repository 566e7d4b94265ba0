use super::frame::MAX_CEC_MSG_LEN;

/// Frame buffer with a bit cursor, most significant bit first.
///
/// Accesses past the last block are ignored (reads give 0) so a misbehaving
/// initiator cannot walk the cursor out of the buffer.
#[derive(Debug, Clone)]
pub struct BitTransfer {
    buf: [u8; MAX_CEC_MSG_LEN],
    bit: u8,
    byte: usize,
}

impl BitTransfer {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_CEC_MSG_LEN],
            bit: 0,
            byte: 0,
        }
    }

    /// Rewinds the cursor, keeping the buffer contents.
    pub fn rewind(&mut self) {
        self.bit = 0;
        self.byte = 0;
    }

    pub fn load(&mut self, msg: &[u8]) {
        let len = msg.len().min(MAX_CEC_MSG_LEN);
        self.buf[..len].copy_from_slice(&msg[..len]);
        self.rewind();
    }

    pub fn bit_index(&self) -> u8 {
        self.bit
    }

    pub fn byte_index(&self) -> usize {
        self.byte
    }

    pub fn get_bit(&self) -> bool {
        match self.buf.get(self.byte) {
            Some(b) => b & (0x80 >> self.bit) != 0,
            None => false,
        }
    }

    pub fn set_bit(&mut self, val: bool) {
        let flag = 0x80 >> self.bit;
        if let Some(b) = self.buf.get_mut(self.byte) {
            *b &= !flag;
            if val {
                *b |= flag;
            }
        }
    }

    pub fn inc_bit(&mut self) {
        if self.byte >= MAX_CEC_MSG_LEN {
            return;
        }
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.byte += 1;
        }
    }

    /// True once exactly `len` whole blocks have been clocked.
    pub fn is_eom(&self, len: usize) -> bool {
        self.bit == 0 && self.byte == len
    }

    pub fn header(&self) -> u8 {
        self.buf[0]
    }

    /// Completed blocks so far.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.byte.min(MAX_CEC_MSG_LEN)]
    }
}

impl Default for BitTransfer {
    fn default() -> Self {
        Self::new()
    }
}
