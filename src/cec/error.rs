//! Error types surfaced to callers of the CEC engine.
//!
//! Timing violations never show up here: the engine absorbs them by dropping
//! the frame and returning to idle.

use core::fmt;

/// Rejection of an outgoing frame at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// The engine is disabled.
    Disabled,
    /// Empty frame or longer than 16 blocks.
    InvalidLength,
    /// Another frame is still in flight.
    Busy,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Disabled => write!(f, "CEC disabled"),
            SendError::InvalidLength => write!(f, "invalid CEC frame length"),
            SendError::Busy => write!(f, "CEC transmission already pending"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Logical addresses are 0..=14, or 255 to unregister.
    InvalidAddress(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddress(addr) => write!(f, "invalid logical address {}", addr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    InvalidLength,
    Overflow,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::InvalidLength => write!(f, "invalid message length"),
            QueueError::Overflow => write!(f, "receive queue full"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OfflineError {
    /// The system is powered, the host handles the frame.
    NotHandled,
    InvalidLength,
}

impl fmt::Display for OfflineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineError::NotHandled => write!(f, "not handled offline"),
            OfflineError::InvalidLength => write!(f, "invalid message length"),
        }
    }
}
