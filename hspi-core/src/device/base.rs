//! Reusable device settings holder

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;
use hspi_hal::Hardware;

use crate::config::{BitOrder, ClockMode, DeviceSettings, IoMode, PinSet};
use crate::controller::Controller;
use crate::device::DeviceId;

/// Settings shared between a driver and the controller
///
/// Drivers embed one and return it from [`crate::Device::base`]. Setters
/// tell the controller to rebuild the register snapshot.
pub struct DeviceBase {
    settings: Mutex<Cell<DeviceSettings>>,
    id: Mutex<Cell<Option<DeviceId>>>,
}

impl DeviceBase {
    pub const fn new() -> Self {
        Self {
            settings: Mutex::new(Cell::new(DeviceSettings::new())),
            id: Mutex::new(Cell::new(None)),
        }
    }

    pub fn settings(&self) -> DeviceSettings {
        critical_section::with(|cs| self.settings.borrow(cs).get())
    }

    /// Handle while registered with a controller
    pub fn id(&self) -> Option<DeviceId> {
        critical_section::with(|cs| self.id.borrow(cs).get())
    }

    fn update(&self, f: impl FnOnce(&mut DeviceSettings)) {
        critical_section::with(|cs| {
            let cell = self.settings.borrow(cs);
            let mut settings = cell.get();
            f(&mut settings);
            cell.set(settings);
        });
    }

    fn notify<H: Hardware>(&self, controller: &Controller<'_, H>) {
        if let Some(id) = self.id() {
            controller.config_changed(id);
        }
    }

    /// Record registration; called by the controller
    pub(crate) fn attach(&self, id: DeviceId, pin_set: PinSet, clock_speed: u32) {
        self.update(|s| {
            s.pin_set = pin_set;
            s.chip_select = id.chip_select();
            s.clock_speed = clock_speed;
        });
        critical_section::with(|cs| self.id.borrow(cs).set(Some(id)));
    }

    /// Record release; called by the controller
    pub(crate) fn detach(&self) {
        self.update(|s| s.pin_set = PinSet::None);
        critical_section::with(|cs| self.id.borrow(cs).set(None));
    }

    pub fn set_speed<H: Hardware>(&self, controller: &Controller<'_, H>, hz: u32) {
        self.update(|s| s.clock_speed = hz);
        self.notify(controller);
    }

    pub fn set_bit_order<H: Hardware>(&self, controller: &Controller<'_, H>, order: BitOrder) {
        self.update(|s| s.bit_order = order);
        self.notify(controller);
    }

    pub fn set_clock_mode<H: Hardware>(&self, controller: &Controller<'_, H>, mode: ClockMode) {
        self.update(|s| s.clock_mode = mode);
        self.notify(controller);
    }

    /// Change the I/O mode
    ///
    /// Refused, returning `false`, if the device's pin set lacks the data
    /// lines the mode needs.
    pub fn set_io_mode<H: Hardware>(&self, controller: &Controller<'_, H>, mode: IoMode) -> bool {
        let pin_set = self.settings().pin_set;
        if pin_set != PinSet::None && !mode.is_supported_by(pin_set) {
            #[cfg(feature = "defmt")]
            defmt::warn!("I/O mode {} not supported on {}", mode, pin_set);
            return false;
        }
        self.update(|s| s.io_mode = mode);
        self.notify(controller);
        true
    }
}

impl fmt::Debug for DeviceBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBase")
            .field("settings", &self.settings())
            .field("id", &self.id())
            .finish()
    }
}

impl Default for DeviceBase {
    fn default() -> Self {
        Self::new()
    }
}
