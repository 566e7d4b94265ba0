//! The CEC bit/frame state machine.
//!
//! The engine is driven by exactly two events from the capture timer: an
//! edge was captured, or the armed deadline expired. Each event moves the
//! machine to its next state, and entering a state is the only place where
//! the line is driven or the capture timer armed (at most one of each).

use embedded_hal_1::digital::{InputPin, OutputPin};

use super::debounce::{classify_start_low, StartPulse};
use super::error::{ConfigError, SendError};
use super::frame::{LogicalAddress, Message, MAX_CEC_MSG_LEN};
use super::port::{CaptureEdge, CecPort, EdgeCapture, NO_TIMEOUT};
use super::receive::RxContext;
use super::timing::{self, classify_low, is_valid_total, Symbol, Ticks};
use super::transmit::{NakOutcome, TxContext};

/// Part of a block a data-sized bit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    /// Initiator nibble of the header block.
    HeaderInit,
    /// Destination nibble of the header block.
    HeaderDest,
    Data,
    Eom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Initiator {
    FreeTime,
    StartLow,
    StartHigh,
    Low(Field),
    High(Field),
    AckLow,
    AckHigh,
    AckVerify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Follower {
    StartLow,
    StartHigh,
    Debounce,
    Low(Field),
    High(Field),
    AckLow,
    AckVerify,
    AckFinish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CecState {
    Disabled,
    Idle,
    Initiator(Initiator),
    Follower(Follower),
}

/// Outcome of an event that the rest of the system must act on.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// A frame addressed to us or broadcast was received.
    Received(Message),
    SendOk,
    /// The frame was not acknowledged after all resends.
    SendFailed,
}

/// Side effect of entering a state.
#[derive(Default)]
struct Entry {
    level: Option<bool>,
    arm: Option<(CaptureEdge, Ticks)>,
}

impl Entry {
    fn wait(edge: CaptureEdge, timeout: Ticks) -> Self {
        Self {
            level: None,
            arm: Some((edge, timeout)),
        }
    }

    fn timeout(timeout: Ticks) -> Self {
        Self::wait(CaptureEdge::None, timeout)
    }

    fn drive(mut self, high: bool) -> Self {
        self.level = Some(high);
        self
    }
}

pub struct CecEngine {
    state: CecState,
    rx: RxContext,
    tx: TxContext,
    addr: LogicalAddress,
    completion: Option<Completion>,
}

impl CecEngine {
    pub const fn new() -> Self {
        Self {
            state: CecState::Disabled,
            rx: RxContext::new(),
            tx: TxContext::new(),
            addr: LogicalAddress::UNREGISTERED,
            completion: None,
        }
    }

    pub fn state(&self) -> CecState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state != CecState::Disabled
    }

    pub fn is_sending(&self) -> bool {
        self.tx.is_pending()
    }

    pub fn logical_address(&self) -> LogicalAddress {
        self.addr
    }

    /// Sets the address we acknowledge frames on; 255 unregisters.
    pub fn set_logical_address(&mut self, addr: u8) -> Result<(), ConfigError> {
        let addr = LogicalAddress(addr);
        if addr.0 >= LogicalAddress::broadcast().0 && addr.is_registered() {
            return Err(ConfigError::InvalidAddress(addr.0));
        }
        self.addr = addr;
        info!("CEC address set to: {}", addr.0);
        Ok(())
    }

    /// Enables or disables the engine. Disabling drops any frame in flight
    /// without reporting a completion for it.
    pub fn set_enabled<L, C>(&mut self, port: &mut CecPort<L, C>, enable: bool)
    where
        L: OutputPin + InputPin,
        C: EdgeCapture,
    {
        if enable == self.is_enabled() {
            return;
        }
        if enable {
            self.enter(port, CecState::Idle);
            info!("CEC enabled");
        } else {
            port.capture.stop();
            self.enter(port, CecState::Disabled);
            info!("CEC disabled");
        }
    }

    /// Queues a frame for transmission. The caller must follow up with
    /// [`start_send`](Self::start_send) from the context that owns the port.
    pub fn submit(&mut self, msg: &[u8]) -> Result<(), SendError> {
        if !self.is_enabled() {
            return Err(SendError::Disabled);
        }
        self.tx.load(msg)?;
        debug!("Send CEC: {:?}", msg);
        Ok(())
    }

    /// Starts a submitted frame if the bus is idle. Otherwise the frame goes
    /// out the next time the engine returns to idle.
    pub fn start_send<L, C>(&mut self, port: &mut CecPort<L, C>)
    where
        L: OutputPin + InputPin,
        C: EdgeCapture,
    {
        if self.state == CecState::Idle && self.tx.is_pending() {
            self.enter(port, CecState::Initiator(Initiator::FreeTime));
        }
    }

    pub fn send<L, C>(&mut self, port: &mut CecPort<L, C>, msg: &[u8]) -> Result<(), SendError>
    where
        L: OutputPin + InputPin,
        C: EdgeCapture,
    {
        self.submit(msg)?;
        self.start_send(port);
        Ok(())
    }

    /// The armed deadline expired.
    pub fn on_timeout<L, C>(&mut self, port: &mut CecPort<L, C>) -> Option<Completion>
    where
        L: OutputPin + InputPin,
        C: EdgeCapture,
    {
        let next = match self.state {
            CecState::Disabled | CecState::Idle => return None,
            CecState::Initiator(s) => self.initiator_timeout(s),
            CecState::Follower(Follower::AckLow) => CecState::Follower(Follower::AckVerify),
            CecState::Follower(Follower::AckVerify) => {
                if self.rx.broadcast_nak {
                    debug!("Broadcast NAKed by a follower");
                    CecState::Idle
                } else {
                    CecState::Follower(Follower::AckFinish)
                }
            }
            // Any other follower timeout means the initiator stopped
            // mid-bit; the frame is dropped.
            CecState::Follower(_) => CecState::Idle,
        };
        self.enter(port, next);
        self.completion.take()
    }

    /// The armed edge was captured.
    pub fn on_capture<L, C>(&mut self, port: &mut CecPort<L, C>) -> Option<Completion>
    where
        L: OutputPin + InputPin,
        C: EdgeCapture,
    {
        let next = match self.state {
            // A falling edge on the idle bus, most likely a start bit.
            CecState::Idle => CecState::Follower(Follower::StartLow),
            CecState::Initiator(Initiator::FreeTime)
            | CecState::Initiator(Initiator::StartHigh)
            | CecState::Initiator(Initiator::High(Field::HeaderInit)) => {
                // Someone else started first. Follow their frame, ours is
                // retried once the bus is idle again.
                debug!("Lost arbitration, postponing send");
                self.tx.transfer.rewind();
                CecState::Follower(Follower::StartLow)
            }
            CecState::Follower(s) => match self.follower_capture(s, port.capture.elapsed()) {
                Some(next) => next,
                None => return None,
            },
            _ => return None,
        };
        self.enter(port, next);
        self.completion.take()
    }

    fn initiator_timeout(&mut self, state: Initiator) -> CecState {
        let tx = &mut self.tx;
        let next = match state {
            Initiator::FreeTime => Initiator::StartLow,
            Initiator::StartLow => Initiator::StartHigh,
            Initiator::StartHigh => Initiator::Low(Field::HeaderInit),
            Initiator::Low(field) => Initiator::High(field),
            Initiator::High(Field::HeaderInit) => {
                tx.transfer.inc_bit();
                if tx.transfer.bit_index() == 4 {
                    Initiator::Low(Field::HeaderDest)
                } else {
                    Initiator::Low(Field::HeaderInit)
                }
            }
            Initiator::High(Field::HeaderDest) => {
                tx.transfer.inc_bit();
                if tx.transfer.byte_index() == 1 {
                    Initiator::Low(Field::Eom)
                } else {
                    Initiator::Low(Field::HeaderDest)
                }
            }
            Initiator::High(Field::Data) => {
                tx.transfer.inc_bit();
                if tx.transfer.bit_index() == 0 {
                    Initiator::Low(Field::Eom)
                } else {
                    Initiator::Low(Field::Data)
                }
            }
            Initiator::High(Field::Eom) => Initiator::AckLow,
            Initiator::AckLow => Initiator::AckHigh,
            Initiator::AckHigh => Initiator::AckVerify,
            Initiator::AckVerify => return self.after_ack(),
        };
        CecState::Initiator(next)
    }

    fn after_ack(&mut self) -> CecState {
        if self.tx.ack {
            if !self.tx.is_eom() {
                return CecState::Initiator(Initiator::Low(Field::Data));
            }
            self.tx.finish();
            info!("SEND OKAY");
            self.completion = Some(Completion::SendOk);
            return CecState::Idle;
        }
        match self.tx.on_nak() {
            NakOutcome::Resend => {
                debug!("NAK, resend {}", self.tx.resends());
                CecState::Initiator(Initiator::FreeTime)
            }
            NakOutcome::Exhausted => {
                self.tx.finish();
                warn!("SEND FAILED");
                self.completion = Some(Completion::SendFailed);
                CecState::Idle
            }
        }
    }

    /// Validates the measured pulse `t`; `None` leaves the state untouched.
    fn follower_capture(&mut self, state: Follower, t: Ticks) -> Option<CecState> {
        let rx = &mut self.rx;
        let next = match state {
            Follower::StartLow => match classify_start_low(t) {
                StartPulse::Valid => {
                    rx.low_ticks = t;
                    Follower::StartHigh
                }
                StartPulse::Glitch => Follower::Debounce,
                StartPulse::Invalid => return Some(CecState::Idle),
            },
            Follower::StartHigh => {
                if !is_valid_total(Symbol::StartBit, rx.low_ticks, t) {
                    return Some(CecState::Idle);
                }
                Follower::Low(Field::HeaderInit)
            }
            Follower::Low(field) => {
                let Some(bit) = classify_low(t) else {
                    return Some(CecState::Idle);
                };
                rx.low_ticks = t;
                if field == Field::Eom {
                    rx.eom = bit;
                } else {
                    rx.transfer.set_bit(bit);
                }
                Follower::High(field)
            }
            Follower::High(field) => {
                let bit = match field {
                    Field::Eom => rx.eom,
                    _ => rx.transfer.get_bit(),
                };
                if !is_valid_total(Symbol::data(bit), rx.low_ticks, t) {
                    return Some(CecState::Idle);
                }
                match field {
                    Field::Eom => Follower::AckLow,
                    Field::HeaderInit => {
                        rx.transfer.inc_bit();
                        if rx.transfer.bit_index() == 4 {
                            Follower::Low(Field::HeaderDest)
                        } else {
                            Follower::Low(Field::HeaderInit)
                        }
                    }
                    Field::HeaderDest | Field::Data => {
                        rx.transfer.inc_bit();
                        if rx.transfer.bit_index() == 0 {
                            Follower::Low(Field::Eom)
                        } else {
                            Follower::Low(field)
                        }
                    }
                }
            }
            Follower::AckLow => Follower::AckFinish,
            Follower::AckFinish => Follower::Low(Field::Data),
            Follower::Debounce | Follower::AckVerify => return None,
        };
        Some(CecState::Follower(next))
    }

    fn enter<L, C>(&mut self, port: &mut CecPort<L, C>, mut state: CecState)
    where
        L: OutputPin + InputPin,
        C: EdgeCapture,
    {
        if state == CecState::Idle {
            self.tx.transfer.rewind();
            self.rx.restart();
            if self.tx.is_pending() {
                // Postponed send
                state = CecState::Initiator(Initiator::FreeTime);
            }
        }
        self.state = state;
        trace!("CEC state {:?}", state);

        let entry = match state {
            CecState::Disabled => {
                self.rx.clear();
                self.tx.clear();
                self.completion = None;
                Entry::default().drive(true)
            }
            CecState::Idle => Entry::wait(CaptureEdge::Falling, NO_TIMEOUT).drive(true),
            CecState::Initiator(s) => self.initiator_entry(port, s),
            CecState::Follower(s) => self.follower_entry(port, s),
        };

        if let Some(high) = entry.level {
            port.drive(high);
        }
        if let Some((edge, timeout)) = entry.arm {
            port.capture.arm(edge, timeout);
        }
    }

    fn initiator_entry<L, C>(&mut self, port: &mut CecPort<L, C>, state: Initiator) -> Entry
    where
        L: OutputPin + InputPin,
        C: EdgeCapture,
    {
        let tx = &mut self.tx;
        match state {
            Initiator::FreeTime => {
                Entry::wait(CaptureEdge::Falling, tx.signal_free_kind().required_free_time())
                    .drive(true)
            }
            Initiator::StartLow => {
                tx.present_initiator = true;
                tx.transfer.rewind();
                Entry::timeout(timing::START_BIT_LOW).drive(false)
            }
            Initiator::StartHigh => {
                Entry::wait(CaptureEdge::Falling, timing::START_BIT_HIGH).drive(true)
            }
            Initiator::Low(Field::Eom) => {
                Entry::timeout(timing::low_duration(tx.is_eom())).drive(false)
            }
            Initiator::Low(_) => {
                Entry::timeout(timing::low_duration(tx.transfer.get_bit())).drive(false)
            }
            Initiator::High(Field::Eom) => {
                Entry::timeout(timing::high_duration(tx.is_eom())).drive(true)
            }
            // Still in the arbitration phase, watch for someone else
            // pulling the line.
            Initiator::High(Field::HeaderInit) => Entry::wait(
                CaptureEdge::Falling,
                timing::high_duration(tx.transfer.get_bit()),
            )
            .drive(true),
            Initiator::High(_) => {
                Entry::timeout(timing::high_duration(tx.transfer.get_bit())).drive(true)
            }
            // The ACK slot starts out as a one bit
            Initiator::AckLow => Entry::timeout(timing::low_duration(true)).drive(false),
            Initiator::AckHigh => Entry::timeout(timing::ACK_HIGH_BEFORE_SAMPLE).drive(true),
            Initiator::AckVerify => {
                let pulled_low = port.is_low();
                // A follower NAKs a broadcast the way it would ACK a
                // directly addressed block.
                tx.ack = if tx.is_broadcast() {
                    !pulled_low
                } else {
                    pulled_low
                };
                Entry::timeout(timing::ACK_AFTER_SAMPLE)
            }
        }
    }

    fn follower_entry<L, C>(&mut self, port: &mut CecPort<L, C>, state: Follower) -> Entry
    where
        L: OutputPin + InputPin,
        C: EdgeCapture,
    {
        let rx = &mut self.rx;
        match state {
            Follower::StartLow => {
                self.tx.present_initiator = false;
                Entry::wait(CaptureEdge::Rising, timing::CAP_START_LOW)
            }
            Follower::StartHigh => {
                rx.debounce.reset();
                Entry::wait(CaptureEdge::Falling, timing::CAP_START_HIGH)
            }
            Follower::Debounce => Entry::timeout(rx.debounce.quiet_period()),
            Follower::Low(_) => Entry::wait(CaptureEdge::Rising, timing::CAP_DATA_LOW),
            Follower::High(_) => Entry::wait(CaptureEdge::Falling, timing::CAP_DATA_HIGH),
            Follower::AckLow => {
                let entry = Entry::timeout(timing::NOMINAL_SAMPLE_TIME);
                // Broadcasts are never ACKed, only NAKed
                if rx.destination() == self.addr {
                    entry.drive(false)
                } else {
                    entry
                }
            }
            Follower::AckVerify => {
                rx.broadcast_nak = rx.destination().is_broadcast() && port.is_low();
                Entry::timeout(timing::ACK_HOLD_AFTER_SAMPLE)
            }
            Follower::AckFinish => {
                let entry = Entry::default().drive(true);
                if rx.eom || rx.transfer.byte_index() >= MAX_CEC_MSG_LEN {
                    let dest = rx.destination();
                    if dest == self.addr || dest.is_broadcast() {
                        let msg = rx.message();
                        debug!("Received CEC: {:?}", &msg[..]);
                        self.completion = Some(Completion::Received(msg));
                    }
                    Entry {
                        arm: Some((CaptureEdge::None, timing::ACK_FINISH_LAST)),
                        ..entry
                    }
                } else {
                    Entry {
                        arm: Some((CaptureEdge::Falling, timing::CAP_DATA_HIGH)),
                        ..entry
                    }
                }
            }
        }
    }
}

impl Default for CecEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cec::debounce::{DEBOUNCE_WAIT_LONG, DEBOUNCE_WAIT_SHORT};
    use crate::cec::port::mock::{port, MockPort};
    use crate::cec::timing::{high_duration, low_duration, FREE_TIME_NEW_INITIATOR};

    fn enabled(addr: u8) -> (CecEngine, MockPort) {
        let mut engine = CecEngine::new();
        let mut port = port();
        engine.set_logical_address(addr).unwrap();
        engine.set_enabled(&mut port, true);
        (engine, port)
    }

    /// Runs the pending transmission to completion on timeouts alone.
    /// `ack(attempt)` decides whether a follower holds the ACK slots low.
    fn run_tx(
        engine: &mut CecEngine,
        port: &mut MockPort,
        mut ack: impl FnMut(u32) -> bool,
    ) -> (u32, std::vec::Vec<Completion>) {
        let mut attempts = 0;
        let mut completions = std::vec::Vec::new();
        engine.start_send(port);
        for _ in 0..10_000 {
            if let Some(c) = engine.on_timeout(port) {
                completions.push(c);
            }
            if engine.state() == CecState::Initiator(Initiator::StartLow) {
                attempts += 1;
                port.line.pulled_low = ack(attempts);
            }
            if !engine.is_sending() {
                break;
            }
        }
        port.line.pulled_low = false;
        (attempts, completions)
    }

    fn capture(engine: &mut CecEngine, port: &mut MockPort, t: Ticks) -> Option<Completion> {
        port.capture.elapsed = t;
        engine.on_capture(port)
    }

    /// Clocks one block into a follower, up to the ACK slot.
    fn receive_block(engine: &mut CecEngine, port: &mut MockPort, block: u8, eom: bool) {
        for i in 0..8 {
            let bit = block & (0x80 >> i) != 0;
            capture(engine, port, low_duration(bit));
            capture(engine, port, high_duration(bit));
        }
        capture(engine, port, low_duration(eom));
        capture(engine, port, high_duration(eom));
        assert_eq!(engine.state(), CecState::Follower(Follower::AckLow));
    }

    fn receive_start(engine: &mut CecEngine, port: &mut MockPort) {
        capture(engine, port, 0);
        capture(engine, port, timing::START_BIT_LOW);
        capture(engine, port, timing::START_BIT_HIGH);
        assert_eq!(
            engine.state(),
            CecState::Follower(Follower::Low(Field::HeaderInit))
        );
    }

    /// ACK slot as seen by a follower: sample, then release.
    fn finish_ack(engine: &mut CecEngine, port: &mut MockPort) -> Option<Completion> {
        assert_eq!(engine.on_timeout(port), None);
        engine.on_timeout(port)
    }

    #[test]
    fn enabling_waits_for_a_falling_edge() {
        let (engine, port) = enabled(4);
        assert_eq!(engine.state(), CecState::Idle);
        assert_eq!(port.capture.armed, Some((CaptureEdge::Falling, NO_TIMEOUT)));
        assert!(port.line.driven_high);
    }

    #[test]
    fn address_range() {
        let mut engine = CecEngine::new();
        assert_eq!(engine.logical_address(), LogicalAddress::UNREGISTERED);
        assert_eq!(engine.set_logical_address(14), Ok(()));
        assert_eq!(
            engine.set_logical_address(15),
            Err(ConfigError::InvalidAddress(15))
        );
        assert_eq!(
            engine.set_logical_address(200),
            Err(ConfigError::InvalidAddress(200))
        );
        assert_eq!(engine.set_logical_address(255), Ok(()));
        assert_eq!(engine.logical_address(), LogicalAddress::UNREGISTERED);
    }

    #[test]
    fn submit_is_rejected_when_disabled_or_busy() {
        let mut engine = CecEngine::new();
        let mut port = port();
        assert_eq!(engine.submit(&[0x40]), Err(SendError::Disabled));
        engine.set_enabled(&mut port, true);
        assert_eq!(engine.submit(&[]), Err(SendError::InvalidLength));
        assert_eq!(engine.send(&mut port, &[0x40, 0x04]), Ok(()));
        assert_eq!(engine.submit(&[0x40]), Err(SendError::Busy));
        assert_eq!(engine.state(), CecState::Initiator(Initiator::FreeTime));
        assert_eq!(
            port.capture.armed,
            Some((CaptureEdge::Falling, FREE_TIME_NEW_INITIATOR))
        );
    }

    #[test]
    fn acked_frame_completes_once() {
        let (mut engine, mut port) = enabled(4);
        engine.submit(&[0x40, 0x04]).unwrap();
        let (attempts, completions) = run_tx(&mut engine, &mut port, |_| true);
        assert_eq!(attempts, 1);
        assert_eq!(completions, [Completion::SendOk]);
        assert_eq!(engine.state(), CecState::Idle);
    }

    #[test]
    fn five_resends_then_failure() {
        let (mut engine, mut port) = enabled(4);
        engine.submit(&[0x40, 0x04]).unwrap();
        let (attempts, completions) = run_tx(&mut engine, &mut port, |_| false);
        assert_eq!(attempts, 6);
        assert_eq!(completions, [Completion::SendFailed]);
        assert_eq!(engine.on_timeout(&mut port), None);
        assert_eq!(engine.state(), CecState::Idle);
    }

    #[test]
    fn ack_on_third_attempt() {
        let (mut engine, mut port) = enabled(4);
        engine.submit(&[0x40, 0x04, 0x05]).unwrap();
        let (attempts, completions) = run_tx(&mut engine, &mut port, |n| n == 3);
        assert_eq!(attempts, 3);
        assert_eq!(completions, [Completion::SendOk]);
    }

    #[test]
    fn resend_uses_short_free_time_and_next_frame_long() {
        let (mut engine, mut port) = enabled(4);
        engine.submit(&[0x40]).unwrap();
        engine.start_send(&mut port);
        let mut free_times = std::vec::Vec::new();
        for _ in 0..200 {
            engine.on_timeout(&mut port);
            if engine.state() == CecState::Initiator(Initiator::FreeTime) {
                free_times.push(port.capture.armed.unwrap().1);
                port.line.pulled_low = true;
                break;
            }
        }
        assert_eq!(free_times, [timing::FREE_TIME_RESEND]);
        let (_, completions) = run_tx(&mut engine, &mut port, |_| true);
        assert_eq!(completions, [Completion::SendOk]);

        engine.send(&mut port, &[0x40]).unwrap();
        assert_eq!(
            port.capture.armed,
            Some((CaptureEdge::Falling, timing::FREE_TIME_PRESENT_INITIATOR))
        );
    }

    #[test]
    fn broadcast_ack_is_inverted() {
        let (mut engine, mut port) = enabled(4);
        engine.submit(&[0x4f, 0x36]).unwrap();
        let (attempts, completions) = run_tx(&mut engine, &mut port, |_| false);
        assert_eq!((attempts, completions), (1, vec![Completion::SendOk]));

        engine.submit(&[0x4f, 0x36]).unwrap();
        let (attempts, completions) = run_tx(&mut engine, &mut port, |_| true);
        assert_eq!((attempts, completions), (6, vec![Completion::SendFailed]));
    }

    #[test]
    fn falling_edge_during_free_time_defers_the_send() {
        let (mut engine, mut port) = enabled(4);
        engine.send(&mut port, &[0x40]).unwrap();
        assert_eq!(capture(&mut engine, &mut port, 500), None);
        assert_eq!(engine.state(), CecState::Follower(Follower::StartLow));
        assert!(engine.is_sending());

        // The other initiator goes quiet, we get our turn.
        assert_eq!(engine.on_timeout(&mut port), None);
        assert_eq!(engine.state(), CecState::Initiator(Initiator::FreeTime));
        assert_eq!(
            port.capture.armed,
            Some((CaptureEdge::Falling, FREE_TIME_NEW_INITIATOR))
        );
    }

    #[test]
    fn glitches_escalate_the_quiet_period() {
        let (mut engine, mut port) = enabled(4);
        for expected in [
            DEBOUNCE_WAIT_SHORT,
            DEBOUNCE_WAIT_SHORT,
            DEBOUNCE_WAIT_SHORT,
            DEBOUNCE_WAIT_LONG,
        ] {
            capture(&mut engine, &mut port, 0);
            capture(&mut engine, &mut port, 150);
            assert_eq!(engine.state(), CecState::Follower(Follower::Debounce));
            assert_eq!(port.capture.armed, Some((CaptureEdge::None, expected)));
            engine.on_timeout(&mut port);
            assert_eq!(engine.state(), CecState::Idle);
        }

        receive_start(&mut engine, &mut port);
        assert_eq!(engine.rx.debounce.count(), 0);
    }

    #[test]
    fn implausible_start_bit_returns_to_idle() {
        let (mut engine, mut port) = enabled(4);
        capture(&mut engine, &mut port, 0);
        capture(&mut engine, &mut port, 150);
        engine.on_timeout(&mut port);
        capture(&mut engine, &mut port, 0);
        capture(&mut engine, &mut port, 1500);
        assert_eq!(engine.state(), CecState::Idle);
        assert_eq!(engine.rx.debounce.count(), 1);
    }

    #[test]
    fn mismatched_high_period_drops_the_frame() {
        let (mut engine, mut port) = enabled(4);
        receive_start(&mut engine, &mut port);
        capture(&mut engine, &mut port, low_duration(true));
        capture(&mut engine, &mut port, high_duration(false));
        assert_eq!(engine.state(), CecState::Idle);
    }

    #[test]
    fn acks_only_our_address() {
        for (header, acked, delivered) in [
            (0x45, true, true),
            (0x47, false, false),
            (0x4f, false, true),
        ] {
            let (mut engine, mut port) = enabled(5);
            receive_start(&mut engine, &mut port);
            receive_block(&mut engine, &mut port, header, true);
            assert_eq!(!port.line.driven_high, acked, "header {:x}", header);
            let completion = finish_ack(&mut engine, &mut port);
            assert!(port.line.driven_high);
            let expected =
                delivered.then(|| Completion::Received(Message::from_slice(&[header]).unwrap()));
            assert_eq!(completion, expected, "header {:x}", header);
        }
    }

    #[test]
    fn broadcast_nak_drops_the_frame() {
        let (mut engine, mut port) = enabled(5);
        receive_start(&mut engine, &mut port);
        receive_block(&mut engine, &mut port, 0x4f, true);
        port.line.pulled_low = true;
        assert_eq!(finish_ack(&mut engine, &mut port), None);
        assert_eq!(engine.state(), CecState::Idle);
    }

    #[test]
    fn multi_block_frame_is_delivered_after_eom() {
        let (mut engine, mut port) = enabled(5);
        receive_start(&mut engine, &mut port);
        receive_block(&mut engine, &mut port, 0x45, false);
        assert_eq!(finish_ack(&mut engine, &mut port), None);
        assert_eq!(engine.state(), CecState::Follower(Follower::AckFinish));
        capture(&mut engine, &mut port, 900);
        receive_block(&mut engine, &mut port, 0x8f, true);
        assert_eq!(
            finish_ack(&mut engine, &mut port),
            Some(Completion::Received(Message::from_slice(&[0x45, 0x8f]).unwrap()))
        );
        assert_eq!(engine.on_timeout(&mut port), None);
        assert_eq!(engine.state(), CecState::Idle);
    }

    #[test]
    fn disabling_mid_frame_discards_everything() {
        let (mut engine, mut port) = enabled(4);
        engine.send(&mut port, &[0x40, 0x04]).unwrap();
        for _ in 0..12 {
            assert_eq!(engine.on_timeout(&mut port), None);
        }
        assert!(matches!(engine.state(), CecState::Initiator(_)));
        engine.set_enabled(&mut port, false);
        assert_eq!(engine.state(), CecState::Disabled);
        assert!(!engine.is_sending());
        assert_eq!(port.capture.armed, None);
        assert!(port.line.driven_high);
        assert_eq!(engine.on_timeout(&mut port), None);
        assert_eq!(engine.on_capture(&mut port), None);

        engine.set_enabled(&mut port, true);
        assert_eq!(engine.state(), CecState::Idle);
    }

    #[test]
    fn disabling_while_following_drops_the_deferred_send() {
        let (mut engine, mut port) = enabled(5);
        receive_start(&mut engine, &mut port);
        capture(&mut engine, &mut port, low_duration(false));
        capture(&mut engine, &mut port, high_duration(false));
        assert!(matches!(engine.state(), CecState::Follower(_)));
        assert_eq!(engine.submit(&[0x50, 0x8f]), Ok(()));
        assert!(engine.is_sending());

        engine.set_enabled(&mut port, false);
        assert_eq!(engine.state(), CecState::Disabled);
        assert!(!engine.is_sending());
        assert_eq!(engine.on_timeout(&mut port), None);

        engine.set_enabled(&mut port, true);
        receive_start(&mut engine, &mut port);
        receive_block(&mut engine, &mut port, 0x45, true);
        assert_eq!(
            finish_ack(&mut engine, &mut port),
            Some(Completion::Received(Message::from_slice(&[0x45]).unwrap()))
        );
        assert_eq!(engine.on_timeout(&mut port), None);
        assert_eq!(engine.state(), CecState::Idle);
    }
}
