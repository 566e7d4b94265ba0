//! Bit timing of the CEC line (HDMI 1.4b CEC 5.2).
//!
//! All values are in capture ticks; one tick is one microsecond. Incoming
//! pulses are accepted within [`VALID_TOLERANCE`] outside the nominal windows
//! since our own edge timestamps are not exact either.

/// Capture timer ticks.
pub type Ticks = u32;

pub const fn us(us: u32) -> Ticks {
    us
}

pub const NOMINAL_BIT: Ticks = us(2400);

// Free time is counted from the end of the last bit rather than its start,
// so each tier is one bit period shorter than HDMI 1.4b CEC 9.1 lists.
pub const FREE_TIME_RESEND: Ticks = 2 * NOMINAL_BIT;
pub const FREE_TIME_NEW_INITIATOR: Ticks = 4 * NOMINAL_BIT;
pub const FREE_TIME_PRESENT_INITIATOR: Ticks = 6 * NOMINAL_BIT;

/// Offset into a bit where the line level is stable for sampling an ACK.
pub const NOMINAL_SAMPLE_TIME: Ticks = us(1050);

pub const VALID_TOLERANCE: Ticks = us(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Symbol {
    StartBit,
    DataZero,
    DataOne,
}

impl Symbol {
    pub fn data(bit: bool) -> Self {
        if bit {
            Symbol::DataOne
        } else {
            Symbol::DataZero
        }
    }

    const fn window(self) -> &'static BitWindow {
        match self {
            Symbol::StartBit => &START_BIT,
            Symbol::DataZero => &DATA_ZERO,
            Symbol::DataOne => &DATA_ONE,
        }
    }
}

struct BitWindow {
    low: Ticks,
    min_low: Ticks,
    max_low: Ticks,
    high: Ticks,
    min_total: Ticks,
    max_total: Ticks,
}

const START_BIT: BitWindow = BitWindow {
    low: us(3700),
    min_low: us(3500),
    max_low: us(3900),
    high: us(800),
    min_total: us(4300),
    max_total: us(5700),
};

const DATA_ZERO: BitWindow = BitWindow {
    low: us(1500),
    min_low: us(1300),
    max_low: us(1700),
    high: us(900),
    min_total: us(2050),
    max_total: us(2750),
};

const DATA_ONE: BitWindow = BitWindow {
    low: us(600),
    min_low: us(400),
    max_low: us(800),
    high: us(1800),
    min_total: us(2050),
    max_total: us(2750),
};

pub const START_BIT_LOW: Ticks = START_BIT.low;
pub const START_BIT_HIGH: Ticks = START_BIT.high;

// Capture deadlines; hitting one of these while following a frame means the
// initiator went away or the bus is garbage.
pub const CAP_START_LOW: Ticks = START_BIT.max_low + VALID_TOLERANCE;
pub const CAP_START_HIGH: Ticks = START_BIT.max_total - START_BIT.min_low + VALID_TOLERANCE;
pub const CAP_DATA_LOW: Ticks = DATA_ZERO.max_low + VALID_TOLERANCE;
pub const CAP_DATA_HIGH: Ticks = DATA_ONE.max_total - DATA_ONE.min_low + VALID_TOLERANCE;

/// Initiator release point inside the ACK bit: middle of the safe sample window.
pub const ACK_HIGH_BEFORE_SAMPLE: Ticks = (DATA_ONE.low + DATA_ZERO.low) / 2 - DATA_ONE.low;
/// Remainder of the bit after the initiator sampled the ACK.
pub const ACK_AFTER_SAMPLE: Ticks = NOMINAL_BIT - NOMINAL_SAMPLE_TIME;
/// Follower holds its ACK until the end of a data-zero low period.
pub const ACK_HOLD_AFTER_SAMPLE: Ticks = DATA_ZERO.low - NOMINAL_SAMPLE_TIME;
/// Follower wait after releasing the last ACK of a frame.
pub const ACK_FINISH_LAST: Ticks = DATA_ZERO.high;

pub fn is_valid_low(symbol: Symbol, low: Ticks) -> bool {
    let w = symbol.window();
    low >= w.min_low.saturating_sub(VALID_TOLERANCE) && low <= w.max_low + VALID_TOLERANCE
}

/// Checks the full bit period given the measured low and high parts.
pub fn is_valid_total(symbol: Symbol, low: Ticks, high: Ticks) -> bool {
    let w = symbol.window();
    let total = low.saturating_add(high);
    total >= w.min_total.saturating_sub(VALID_TOLERANCE) && total <= w.max_total + VALID_TOLERANCE
}

pub fn low_duration(bit: bool) -> Ticks {
    Symbol::data(bit).window().low
}

pub fn high_duration(bit: bool) -> Ticks {
    Symbol::data(bit).window().high
}

/// Data value of a measured low period, `None` if it fits neither symbol.
pub fn classify_low(low: Ticks) -> Option<bool> {
    if is_valid_low(Symbol::DataZero, low) {
        Some(false)
    } else if is_valid_low(Symbol::DataOne, low) {
        Some(true)
    } else {
        None
    }
}
