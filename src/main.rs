#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Input, Level, Output, OutputOpenDrain, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use heapless::Vec;
use {defmt_rtt as _, panic_probe as _};

use soft_cec::cec::{CecHost, Notification, OfflineHost};
use soft_cec::cec_types::{CecDeviceType, CecOpCode};
use soft_cec::{rp, send_with_result, CecConfig, CecFrame, LogicalAddress};

static POWER_BUTTON_PRESS: Signal<CriticalSectionRawMutex, u32> = Signal::new();
static MESSAGE_AVAILABLE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

struct Board {
    /// Low while the host is powered down.
    power_good: Input<'static>,
}

impl OfflineHost for Board {
    fn chipset_off(&self) -> bool {
        self.power_good.is_low()
    }

    fn power_button_simulate_press(&mut self, duration_ms: u32) {
        POWER_BUTTON_PRESS.signal(duration_ms);
    }
}

impl CecHost for Board {
    fn notify(&mut self, notification: Notification) {
        match notification {
            Notification::MessageAvailable => MESSAGE_AVAILABLE.signal(()),
            Notification::EventsPending => debug!("CEC events {:x}", rp::take_events()),
        }
    }
}

#[embassy_executor::task]
async fn alive_logger() {
    loop {
        Timer::after(Duration::from_millis(5000)).await;
        info!("Alive {}!", Instant::now());
    }
}

#[embassy_executor::task]
async fn power_button_task(mut button: Output<'static>) {
    loop {
        let duration_ms = POWER_BUTTON_PRESS.wait().await;
        info!("Pressing power button for {} ms", duration_ms);
        button.set_high();
        Timer::after(Duration::from_millis(duration_ms.into())).await;
        button.set_low();
    }
}

#[embassy_executor::task]
async fn cec_task(mut board: Board) {
    rp::run_completions(CecConfig::default(), &mut board).await
}

async fn handle_message(my_cec_address: LogicalAddress, frame: CecFrame) {
    let op_str: &str = frame
        .opcode
        .and_then(CecOpCode::name_of)
        .unwrap_or("(None)");
    info!(
        "{} -> {} {} {}",
        frame.initiator,
        frame.dest,
        op_str,
        frame.operands.as_slice(),
    );

    if frame.dest == my_cec_address && frame.opcode == Some(CecOpCode::GIVE_DEVICE_VENDOR_ID.into())
    {
        let mut reply = CecFrame::new(
            my_cec_address,
            LogicalAddress::broadcast(),
            CecOpCode::DEVICE_VENDOR_ID,
        );
        reply.operands = unwrap!(Vec::from_slice(&[0xAF, 0xFE, 0x42]));
        if let Err(e) = send_with_result(&reply.to_message()).await {
            warn!("Vendor id reply failed: {}", e);
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let cec0 = OutputOpenDrain::new(p.PIN_0, Level::High);
    let board = Board {
        power_good: Input::new(p.PIN_2, Pull::Down),
    };
    let power_button = Output::new(p.PIN_3, Level::Low);

    let my_cec_address = LogicalAddress(5);

    unwrap!(soft_cec::spawn_cec_handling_task(spawner, cec0));
    unwrap!(spawner.spawn(cec_task(board)));
    unwrap!(spawner.spawn(power_button_task(power_button)));
    unwrap!(spawner.spawn(alive_logger()));

    unwrap!(rp::set_logical_address(my_cec_address.0));
    rp::set_enabled(true).await;

    if send_with_result(&CecFrame::poll(my_cec_address).to_message())
        .await
        .is_ok()
    {
        defmt::panic!("Logical Addr for playback device already allocated");
    }

    let mut report = CecFrame::new(
        my_cec_address,
        LogicalAddress::broadcast(),
        CecOpCode::REPORT_PHYSICAL_ADDRESS,
    );
    report.operands = unwrap!(Vec::from_slice(&[
        0x12,
        0x34,
        CecDeviceType::PLAYBACK_DEVICE.into()
    ]));
    let _ = send_with_result(&report.to_message()).await;

    info!("Listening for messages");
    loop {
        MESSAGE_AVAILABLE.wait().await;
        while let Some(msg) = rp::pop_message() {
            match CecFrame::parse(&msg) {
                Some(frame) => handle_message(my_cec_address, frame).await,
                None => error!("Bad frame {}", msg.as_slice()),
            }
        }
    }
}
