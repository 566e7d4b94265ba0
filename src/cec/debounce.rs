use super::timing::{is_valid_low, us, Symbol, Ticks};

/// Glitches in a row before the quiet period gets longer.
pub const DEBOUNCE_CUTOFF: u8 = 3;
/// Start pulses shorter than this are treated as noise.
pub const DEBOUNCE_LIMIT: Ticks = us(200);
pub const DEBOUNCE_WAIT_SHORT: Ticks = us(100);
pub const DEBOUNCE_WAIT_LONG: Ticks = us(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartPulse {
    /// Low period of a proper start bit.
    Valid,
    /// Too short to be anything but noise; ignore the bus for a while.
    Glitch,
    /// Neither; drop back to idle without counting it.
    Invalid,
}

pub fn classify_start_low(low: Ticks) -> StartPulse {
    if is_valid_low(Symbol::StartBit, low) {
        StartPulse::Valid
    } else if low < DEBOUNCE_LIMIT {
        StartPulse::Glitch
    } else {
        StartPulse::Invalid
    }
}

/// Counts consecutive glitches on the idle bus.
#[derive(Debug, Default, Clone)]
pub struct Debounce {
    count: u8,
}

impl Debounce {
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Quiet period to wait out after a glitch.
    pub fn quiet_period(&mut self) -> Ticks {
        if self.count >= DEBOUNCE_CUTOFF {
            DEBOUNCE_WAIT_LONG
        } else {
            self.count += 1;
            DEBOUNCE_WAIT_SHORT
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u8 {
        self.count
    }
}
