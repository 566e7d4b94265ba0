//! Queue of completed incoming frames waiting for the host.
//!
//! Entries are stored as `[len][len bytes]` in a byte ring. The producer
//! (the completion handler) owns the write offset; the read offset is also
//! moved by flushes, which may come from another context, so it alone sits
//! behind a critical-section mutex.

use core::cell::Cell;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::error::QueueError;
use super::frame::{Message, MAX_CEC_MSG_LEN};

/// Firmware default queue size in bytes.
pub const CEC_RX_BUFFER_SIZE: usize = 20;

pub struct RxQueue<const N: usize = CEC_RX_BUFFER_SIZE> {
    buf: [AtomicU8; N],
    write_offset: AtomicUsize,
    read_offset: Mutex<CriticalSectionRawMutex, Cell<usize>>,
}

impl<const N: usize> RxQueue<N> {
    /// A full-size frame plus its length byte, with one slot kept free.
    const MIN_CAPACITY: () = assert!(
        N >= MAX_CEC_MSG_LEN + 2,
        "RxQueue must hold at least one full-size frame"
    );

    pub const fn new() -> Self {
        let () = Self::MIN_CAPACITY;
        Self {
            buf: [const { AtomicU8::new(0) }; N],
            write_offset: AtomicUsize::new(0),
            read_offset: Mutex::new(Cell::new(0)),
        }
    }

    fn read_offset(&self) -> usize {
        self.read_offset.lock(|r| r.get())
    }

    pub fn is_empty(&self) -> bool {
        self.read_offset() == self.write_offset.load(Ordering::Acquire)
    }

    /// Appends a message. Must only be called from the single producer.
    pub fn push(&self, msg: &[u8]) -> Result<(), QueueError> {
        if msg.is_empty() || msg.len() > MAX_CEC_MSG_LEN {
            return Err(QueueError::InvalidLength);
        }

        let start = self.write_offset.load(Ordering::Relaxed);
        let read = self.read_offset();
        // The length goes in last, once the whole entry fits.
        self.buf[start].store(0, Ordering::Relaxed);
        let mut offset = (start + 1) % N;
        for &b in msg {
            if offset == read {
                return Err(QueueError::Overflow);
            }
            self.buf[offset].store(b, Ordering::Relaxed);
            offset = (offset + 1) % N;
        }
        // Catching up with the reader would look like an empty queue.
        if offset == read {
            return Err(QueueError::Overflow);
        }

        self.buf[start].store(msg.len() as u8, Ordering::Relaxed);
        self.write_offset.store(offset, Ordering::Release);
        Ok(())
    }

    /// Pushes a message, discarding the whole backlog if it does not fit:
    /// the most recent message is worth more than old ones.
    pub fn push_newest(&self, msg: &[u8]) -> Result<(), QueueError> {
        match self.push(msg) {
            Err(QueueError::Overflow) => {
                warn!("CEC rx queue full, dropping backlog");
                self.flush();
                self.push(msg)
            }
            res => res,
        }
    }

    pub fn pop(&self) -> Option<Message> {
        self.read_offset.lock(|read| {
            let mut offset = read.get();
            if offset == self.write_offset.load(Ordering::Acquire) {
                return None;
            }

            let len = self.buf[offset].load(Ordering::Relaxed) as usize;
            if len == 0 || len > MAX_CEC_MSG_LEN {
                error!("Invalid CEC msg size: {}", len);
                return None;
            }

            let mut msg = Message::new();
            offset = (offset + 1) % N;
            for _ in 0..len {
                // len is bounded by the capacity checked above
                let _ = msg.push(self.buf[offset].load(Ordering::Relaxed));
                offset = (offset + 1) % N;
            }
            read.set(offset);
            Some(msg)
        })
    }

    /// Drops every queued message.
    pub fn flush(&self) {
        self.read_offset
            .lock(|read| read.set(self.write_offset.load(Ordering::Acquire)));
    }
}

impl<const N: usize> Default for RxQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
