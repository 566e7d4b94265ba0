//! Runs the CEC engine on an RP2040 open-drain GPIO.
//!
//! One task owns the pin and turns GPIO edges and timer deadlines into engine
//! events. Send results are settled right there; received frames are handed
//! to whoever runs [`run_completions`].

use core::cell::RefCell;
use core::future::pending;

use embassy_futures::select::{select, select3, Either, Either3};
use embassy_rp::gpio::OutputOpenDrain;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

use crate::cec::timing::Ticks;
use crate::cec::{
    CaptureEdge, CecConfig, CecEngine, CecHost, CecPort, CecService, Completion, ConfigError,
    EdgeCapture, HostEvents, Message, Notification, RxQueue, SendError, NO_TIMEOUT,
};

/// Edge capture on top of the embassy time driver. The line task records
/// when the armed event happened; the next arm counts from there.
pub struct EmbassyCapture {
    start: Instant,
    armed: Option<(CaptureEdge, Option<Instant>)>,
    event_at: Option<Instant>,
}

impl EmbassyCapture {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            armed: None,
            event_at: None,
        }
    }

    fn take_armed(&mut self) -> (CaptureEdge, Option<Instant>) {
        self.armed.take().unwrap_or((CaptureEdge::None, None))
    }
}

impl Default for EmbassyCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeCapture for EmbassyCapture {
    fn arm(&mut self, edge: CaptureEdge, timeout: Ticks) {
        self.start = self.event_at.unwrap_or_else(Instant::now);
        let deadline =
            (timeout != NO_TIMEOUT).then(|| self.start + Duration::from_micros(timeout.into()));
        self.armed = Some((edge, deadline));
    }

    fn elapsed(&self) -> Ticks {
        let now = self.event_at.unwrap_or_else(Instant::now);
        now.saturating_duration_since(self.start).as_micros() as Ticks
    }

    fn stop(&mut self) {
        self.armed = None;
    }
}

type RpPort = CecPort<OutputOpenDrain<'static>, EmbassyCapture>;

enum Control {
    Enable(bool),
    StartSend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum CecSendError {
    Rejected(SendError),
    Nack,
}

static ENGINE: BlockingMutex<CriticalSectionRawMutex, RefCell<CecEngine>> =
    BlockingMutex::new(RefCell::new(CecEngine::new()));
static RX_QUEUE: RxQueue = RxQueue::new();
static HOST_EVENTS: HostEvents = HostEvents::new();

static CEC_CONTROL_CHANNEL: Channel<CriticalSectionRawMutex, Control, 2> = Channel::new();
static CEC_RECEIVED_CHANNEL: Channel<CriticalSectionRawMutex, Message, 4> = Channel::new();
static CEC_EVENTS_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static CEC_SENDRESULT_SIGNAL: Signal<CriticalSectionRawMutex, Result<(), CecSendError>> =
    Signal::new();

fn with_engine<R>(f: impl FnOnce(&mut CecEngine) -> R) -> R {
    ENGINE.lock(|engine| f(&mut engine.borrow_mut()))
}

#[embassy_executor::task]
pub async fn cec_line_handler(pin: OutputOpenDrain<'static>) {
    let mut port: RpPort = CecPort::new(pin, EmbassyCapture::new());
    loop {
        let (edge, deadline) = port.capture.take_armed();
        let line = &mut port.line;
        let event = select3(
            async {
                match edge {
                    CaptureEdge::Rising => line.wait_for_rising_edge().await,
                    CaptureEdge::Falling => line.wait_for_falling_edge().await,
                    CaptureEdge::None => pending().await,
                }
            },
            async {
                match deadline {
                    Some(at) => Timer::at(at).await,
                    None => pending().await,
                }
            },
            CEC_CONTROL_CHANNEL.receive(),
        )
        .await;

        let completion = match event {
            Either3::First(()) => {
                port.capture.event_at = Some(Instant::now());
                with_engine(|engine| engine.on_capture(&mut port))
            }
            Either3::Second(()) => {
                port.capture.event_at = deadline;
                with_engine(|engine| engine.on_timeout(&mut port))
            }
            Either3::Third(control) => {
                // Control requests do not consume the armed event.
                port.capture.armed = Some((edge, deadline));
                with_engine(|engine| match control {
                    Control::Enable(false) if engine.is_sending() => {
                        engine.set_enabled(&mut port, false);
                        CEC_SENDRESULT_SIGNAL
                            .signal(Err(CecSendError::Rejected(SendError::Disabled)));
                    }
                    Control::Enable(enable) => engine.set_enabled(&mut port, enable),
                    Control::StartSend => engine.start_send(&mut port),
                });
                None
            }
        };
        port.capture.event_at = None;

        match completion {
            Some(Completion::Received(msg)) => {
                if CEC_RECEIVED_CHANNEL.try_send(msg).is_err() {
                    warn!("CEC receive channel full, dropping");
                }
            }
            Some(result) => {
                CEC_SENDRESULT_SIGNAL.signal(match result {
                    Completion::SendOk => Ok(()),
                    _ => Err(CecSendError::Nack),
                });
                HOST_EVENTS.record(&result);
                CEC_EVENTS_SIGNAL.signal(());
            }
            None => {}
        }
    }
}

pub async fn set_enabled(enable: bool) {
    CEC_CONTROL_CHANNEL.send(Control::Enable(enable)).await;
    if !enable {
        CecService::new(CecConfig::default(), &RX_QUEUE, &HOST_EVENTS).reset();
    }
}

pub fn is_enabled() -> bool {
    with_engine(|engine| engine.is_enabled())
}

pub fn set_logical_address(addr: u8) -> Result<(), ConfigError> {
    with_engine(|engine| engine.set_logical_address(addr))
}

/// Queues `msg` for transmission; the result arrives as a completion.
pub async fn send(msg: &[u8]) -> Result<(), SendError> {
    with_engine(|engine| engine.submit(msg))?;
    CEC_CONTROL_CHANNEL.send(Control::StartSend).await;
    Ok(())
}

pub fn pop_message() -> Option<Message> {
    RX_QUEUE.pop()
}

pub fn take_events() -> u32 {
    HOST_EVENTS.take()
}

static SEND_MUTEX: Mutex<CriticalSectionRawMutex, ()> = Mutex::new(());

/// Sends `msg` and waits until it was acknowledged, all resends failed or
/// CEC was disabled.
pub async fn send_with_result(msg: &[u8]) -> Result<(), CecSendError> {
    let _guard = SEND_MUTEX.lock().await;
    CEC_SENDRESULT_SIGNAL.reset();
    send(msg).await.map_err(CecSendError::Rejected)?;
    CEC_SENDRESULT_SIGNAL.wait().await
}

/// Feeds received frames through the CEC service and tells the host about
/// pending send results, forever.
pub async fn run_completions<H: CecHost>(config: CecConfig, host: &mut H) {
    let service = CecService::new(config, &RX_QUEUE, &HOST_EVENTS);
    loop {
        match select(CEC_RECEIVED_CHANNEL.receive(), CEC_EVENTS_SIGNAL.wait()).await {
            Either::First(msg) => service.handle(Completion::Received(msg), host),
            Either::Second(()) => host.notify(Notification::EventsPending),
        }
    }
}
