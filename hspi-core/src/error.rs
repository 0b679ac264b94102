//! Controller error types

use crate::transfer::Request;

/// Device registration errors
///
/// Returned by [`crate::Controller::start_device`]. Controller state is
/// left unchanged when registration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Chip-select already claimed by another device
    ChipSelectInUse,
    /// Chip-select id out of range
    InvalidChipSelect,
    /// Devices must be routed to real pins
    InvalidPinSet,
    /// Pin set cannot be combined with the chip-select
    PinSetConflict,
    /// Manual chip-select without a registered select hook
    NoSelectHook,
    /// Device already registered under another chip-select
    AlreadyRegistered,
}

/// Request submission errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExecuteError {
    /// `begin()` has not been called
    NotStarted,
    /// Request names a device that is not registered
    UnknownDevice,
    /// All request slots are in use
    QueueFull,
}

/// A rejected submission, handing the request back
#[derive(Debug)]
pub struct Rejected<'b> {
    pub error: ExecuteError,
    pub request: Request<'b>,
}

impl<'b> Rejected<'b> {
    /// Discard the request, keeping the error
    pub fn into_error(self) -> ExecuteError {
        self.error
    }
}

impl From<Rejected<'_>> for ExecuteError {
    fn from(rejected: Rejected<'_>) -> Self {
        rejected.error
    }
}
