use super::offline::{OfflinePolicy, DEFAULT_OFFLINE_POLICY};

/// Board-level CEC settings.
#[derive(Debug, Clone, Copy)]
pub struct CecConfig {
    /// Commands acted on while the system is off.
    pub offline_policy: &'static [OfflinePolicy],
    /// Length of a simulated power button press.
    pub power_button_press_ms: u32,
}

impl CecConfig {
    pub const fn new() -> Self {
        Self {
            offline_policy: DEFAULT_OFFLINE_POLICY,
            power_button_press_ms: 200,
        }
    }
}

impl Default for CecConfig {
    fn default() -> Self {
        Self::new()
    }
}
