//! Hardware seams of the engine: the open-drain CEC line and the edge
//! capture timer.
//!
//! The line is any `embedded-hal` pin that can be both driven and sampled.
//! Driving it high releases the bus; reading it returns the bus level, which
//! may be held low by another device.

use embedded_hal_1::digital::{InputPin, OutputPin};

use super::timing::Ticks;

/// Timeout value meaning "wait for the edge forever".
pub const NO_TIMEOUT: Ticks = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureEdge {
    /// Timeout only.
    None,
    Rising,
    Falling,
}

/// One-shot edge capture timer.
///
/// After `arm`, exactly one of "edge captured" or "timeout" is reported back
/// to the engine, unless it is re-armed or stopped first.
pub trait EdgeCapture {
    /// Starts counting from zero and waits for `edge`, giving up after
    /// `timeout` ticks ([`NO_TIMEOUT`] waits forever).
    fn arm(&mut self, edge: CaptureEdge, timeout: Ticks);

    /// Ticks since the last `arm`.
    fn elapsed(&self) -> Ticks;

    fn stop(&mut self);
}

pub struct CecPort<L, C> {
    pub line: L,
    pub capture: C,
}

impl<L, C> CecPort<L, C>
where
    L: OutputPin + InputPin,
    C: EdgeCapture,
{
    pub fn new(line: L, capture: C) -> Self {
        Self { line, capture }
    }

    pub(crate) fn drive(&mut self, high: bool) {
        let _ = if high {
            self.line.set_high()
        } else {
            self.line.set_low()
        };
    }

    pub(crate) fn is_low(&mut self) -> bool {
        self.line.is_low().unwrap_or(false)
    }
}
