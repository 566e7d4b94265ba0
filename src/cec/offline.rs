//! Handling of incoming frames while the system is powered off.

use super::error::OfflineError;
use crate::cec_types::CecOpCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CecAction {
    None,
    PowerButton,
}

#[derive(Debug, Clone, Copy)]
pub struct OfflinePolicy {
    pub command: CecOpCode,
    pub action: CecAction,
}

/// Turn the system on when a source asks the display to show something.
pub const DEFAULT_OFFLINE_POLICY: &[OfflinePolicy] = &[
    OfflinePolicy {
        command: CecOpCode::IMAGE_VIEW_ON,
        action: CecAction::PowerButton,
    },
    OfflinePolicy {
        command: CecOpCode::TEXT_VIEW_ON,
        action: CecAction::PowerButton,
    },
];

/// Power state and actions the policy needs from the board.
pub trait OfflineHost {
    /// The chipset is fully off.
    fn chipset_off(&self) -> bool;

    fn power_button_simulate_press(&mut self, duration_ms: u32);
}

pub fn find_action(policy: &[OfflinePolicy], command: u8) -> CecAction {
    policy
        .iter()
        .find(|p| u8::from(p.command) == command)
        .map_or(CecAction::None, |p| p.action)
}

/// Runs `msg` against the offline policy. `Ok` means the frame was consumed
/// here; it is still forwarded to the host afterwards.
pub fn process_offline_message<H: OfflineHost>(
    policy: &[OfflinePolicy],
    msg: &[u8],
    press_ms: u32,
    host: &mut H,
) -> Result<CecAction, OfflineError> {
    if !host.chipset_off() {
        return Err(OfflineError::NotHandled);
    }
    if msg.is_empty() {
        return Err(OfflineError::InvalidLength);
    }
    debug!("Offline MSG: {:?}", msg);

    // A header-only frame is a poll and carries no command.
    let action = match msg.get(1) {
        Some(&command) => find_action(policy, command),
        None => CecAction::None,
    };
    if action == CecAction::PowerButton {
        host.power_button_simulate_press(press_ms);
    }
    Ok(action)
}
