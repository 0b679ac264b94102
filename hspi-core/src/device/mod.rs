//! Device capability
//!
//! A device is anything that owns a chip-select on the bus. The
//! controller queries its settings each time it becomes the active
//! device and reports completed requests back to it.

mod base;

pub use base::DeviceBase;

use crate::config::{BitOrder, ClockMode, IoMode, PinSet};
use crate::transfer::Request;

/// Handle for a registered device, carried by its requests
///
/// Equal to the device's chip-select id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(u8);

impl DeviceId {
    pub(crate) const fn new(chip_select: u8) -> Self {
        Self(chip_select)
    }

    pub fn chip_select(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// A device on the shared bus
///
/// Settings are read through [`Device::base`] unless overridden.
pub trait Device: Sync {
    /// Settings storage
    fn base(&self) -> &DeviceBase;

    fn pin_set(&self) -> PinSet {
        self.base().settings().pin_set
    }

    fn chip_select(&self) -> u8 {
        self.base().settings().chip_select
    }

    /// Requested clock in Hz
    fn clock_speed(&self) -> u32 {
        self.base().settings().clock_speed
    }

    fn bit_order(&self) -> BitOrder {
        self.base().settings().bit_order
    }

    fn clock_mode(&self) -> ClockMode {
        self.base().settings().clock_mode
    }

    fn io_mode(&self) -> IoMode {
        self.base().settings().io_mode
    }

    /// Called once per finished request, in interrupt context
    fn transfer_complete(&self, request: &Request<'_>) {
        request.invoke_callback();
    }
}

/// Chip-select hook for ids without a hardware line
///
/// Called with `active = true` before a request's first burst and
/// `active = false` after its last, from interrupt context.
pub trait SelectDevice: Sync {
    fn select(&self, chip_select: u8, active: bool);
}

impl<F> SelectDevice for F
where
    F: Fn(u8, bool) + Sync,
{
    fn select(&self, chip_select: u8, active: bool) {
        self(chip_select, active)
    }
}
