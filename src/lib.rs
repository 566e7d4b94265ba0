#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod cec;
pub mod cec_types;
#[cfg(feature = "rp2040")]
pub mod rp;

pub use cec::CecConfig;
pub use cec::CecEngine;
pub use cec::CecFrame;
pub use cec::CecService;
pub use cec::Completion;
pub use cec::LogicalAddress;
pub use cec::SendError;

#[cfg(feature = "rp2040")]
pub use rp::{send_with_result, CecSendError};

#[cfg(feature = "rp2040")]
pub fn spawn_cec_handling_task(
    spawner: embassy_executor::Spawner,
    pin: embassy_rp::gpio::OutputOpenDrain<'static>,
) -> Result<(), embassy_executor::SpawnError> {
    spawner.spawn(rp::cec_line_handler(pin))
}
