//! Pin set routing and chip-select pin functions
//!
//! Pin functions are programmed only on change: switching between two
//! devices on the same pin set touches no IO MUX registers.

use hspi_hal::gpio::{pins, PinFunction};
use hspi_hal::regs::{self, Reg};
use hspi_hal::{PinMux, SpiRegisters, SpiUnit, SystemRegisters};

use crate::config::PinSet;
use crate::MAX_DEVICES;

/// Chip-selects driven by the SPI hardware; higher ids use the select hook
pub const HARDWARE_CS_COUNT: u8 = 3;

/// Pin and function for each hardware chip-select
const CS_PINS: [(u8, PinFunction); HARDWARE_CS_COUNT as usize] = [
    (pins::CS0, PinFunction::HspiCs0),
    (pins::CS1, PinFunction::SpiCs1),
    (pins::CS2, PinFunction::SpiCs2),
];

/// Data and clock pins of the normal pin set
const BUS_PINS: [u8; 3] = [pins::MISO, pins::MOSI, pins::CLK];

/// Tracks pin routing and chip-select ownership
#[derive(Debug)]
pub struct PinManager {
    active: PinSet,
    normal_pins: bool,
    overlap_configured: bool,
    /// Hardware chip-selects with their pin function selected
    cs_configured: u8,
    /// Chip-select ids claimed by a device
    claimed: u8,
}

impl PinManager {
    pub const fn new() -> Self {
        Self {
            active: PinSet::None,
            normal_pins: false,
            overlap_configured: false,
            cs_configured: 0,
            claimed: 0,
        }
    }

    /// Currently routed pin set
    pub fn active(&self) -> PinSet {
        self.active
    }

    /// Route the bus to `target`, doing nothing if already there
    pub fn configure<H>(&mut self, hw: &mut H, target: PinSet)
    where
        H: PinMux + SpiRegisters + SystemRegisters,
    {
        if target == self.active {
            return;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("HSPI pins: {} -> {}", self.active, target);

        if self.active == PinSet::Overlap {
            let host = hw.host_inf_sel() & !regs::host_inf::PERI_IO_CSPI_OVERLAP;
            hw.set_host_inf_sel(host);
            hw.clear_bits(SpiUnit::Spi0, Reg::Ext3, regs::ext3::INT_HOLD_ENA);
            hw.clear_bits(SpiUnit::Spi1, Reg::Ext3, regs::ext3::INT_HOLD_ENA);
        }

        match target {
            PinSet::Overlap => {
                let host = hw.host_inf_sel() | regs::host_inf::PERI_IO_CSPI_OVERLAP;
                hw.set_host_inf_sel(host);
                // HSPI wins arbitration against flash accesses on SPI0
                hw.modify_reg(SpiUnit::Spi0, Reg::Ext3, regs::ext3::INT_HOLD_ENA, 1);
                hw.modify_reg(SpiUnit::Spi1, Reg::Ext3, regs::ext3::INT_HOLD_ENA, 3);
                if !self.overlap_configured {
                    hw.write_reg(SpiUnit::Spi1, Reg::Ctrl2, 0);
                    self.overlap_configured = true;
                }
            }
            PinSet::Normal => {
                if !self.normal_pins {
                    for pin in BUS_PINS {
                        hw.select_function(pin, PinFunction::Hspi);
                    }
                    self.normal_pins = true;
                }
            }
            PinSet::None => {
                if self.normal_pins {
                    for pin in BUS_PINS {
                        hw.select_function(pin, PinFunction::Gpio);
                    }
                    self.normal_pins = false;
                }
                self.overlap_configured = false;
            }
        }

        self.active = target;
    }

    /// Select the pin function of a hardware chip-select, once
    ///
    /// Ids without a hardware line are ignored.
    pub fn configure_chip_select<H: PinMux>(&mut self, hw: &mut H, cs: u8) {
        let Some(&(pin, function)) = CS_PINS.get(usize::from(cs)) else {
            return;
        };
        let mask = 1 << cs;
        if self.cs_configured & mask == 0 {
            hw.select_function(pin, function);
            self.cs_configured |= mask;
        }
    }

    /// Revert every configured chip-select pin to GPIO
    pub fn release_chip_selects<H: PinMux>(&mut self, hw: &mut H) {
        for (cs, &(pin, _)) in CS_PINS.iter().enumerate() {
            if self.cs_configured & (1 << cs) != 0 {
                hw.select_function(pin, PinFunction::Gpio);
            }
        }
        self.cs_configured = 0;
    }

    pub fn is_claimed(&self, cs: u8) -> bool {
        usize::from(cs) < MAX_DEVICES && self.claimed & (1 << cs) != 0
    }

    /// Mark a chip-select id as owned
    pub fn claim(&mut self, cs: u8) {
        if usize::from(cs) < MAX_DEVICES {
            self.claimed |= 1 << cs;
        }
    }

    pub fn release(&mut self, cs: u8) {
        if usize::from(cs) < MAX_DEVICES {
            self.claimed &= !(1 << cs);
        }
    }

    /// Claimed chip-select ids, one bit each
    pub fn claimed(&self) -> u8 {
        self.claimed
    }
}

impl Default for PinManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hspi_hal_sim::SimBus;

    #[test]
    fn test_normal_pins_selected_once() {
        let mut hw = SimBus::new();
        let sim = hw.clone();
        let mut manager = PinManager::new();

        manager.configure(&mut hw, PinSet::Normal);
        assert_eq!(manager.active(), PinSet::Normal);
        for pin in BUS_PINS {
            assert_eq!(sim.pin_function(pin), PinFunction::Hspi);
        }

        // Re-entering normal after overlap must not reprogram the pins
        manager.configure(&mut hw, PinSet::Overlap);
        hw.select_function(pins::CLK, PinFunction::Gpio);
        manager.configure(&mut hw, PinSet::Normal);
        assert_eq!(sim.pin_function(pins::CLK), PinFunction::Gpio);
    }

    #[test]
    fn test_overlap_enter_and_leave() {
        let mut hw = SimBus::new();
        let sim = hw.clone();
        let mut manager = PinManager::new();

        manager.configure(&mut hw, PinSet::Overlap);
        assert_ne!(sim.host_inf() & regs::host_inf::PERI_IO_CSPI_OVERLAP, 0);
        assert_eq!(sim.reg(SpiUnit::Spi0, Reg::Ext3), 1);
        assert_eq!(sim.reg(SpiUnit::Spi1, Reg::Ext3), 3);

        manager.configure(&mut hw, PinSet::Normal);
        assert_eq!(sim.host_inf() & regs::host_inf::PERI_IO_CSPI_OVERLAP, 0);
        assert_eq!(sim.reg(SpiUnit::Spi0, Reg::Ext3), 0);
        assert_eq!(sim.reg(SpiUnit::Spi1, Reg::Ext3), 0);
    }

    #[test]
    fn test_same_target_is_noop() {
        let mut hw = SimBus::new();
        let sim = hw.clone();
        let mut manager = PinManager::new();

        manager.configure(&mut hw, PinSet::Overlap);
        hw.set_host_inf_sel(0);
        manager.configure(&mut hw, PinSet::Overlap);
        assert_eq!(sim.host_inf(), 0);
    }

    #[test]
    fn test_hold_time_programmed_on_first_overlap_only() {
        let mut hw = SimBus::new();
        let sim = hw.clone();
        let mut manager = PinManager::new();

        hw.write_reg(SpiUnit::Spi1, Reg::Ctrl2, 0x55);
        manager.configure(&mut hw, PinSet::Overlap);
        assert_eq!(sim.reg(SpiUnit::Spi1, Reg::Ctrl2), 0);

        hw.write_reg(SpiUnit::Spi1, Reg::Ctrl2, 0x55);
        manager.configure(&mut hw, PinSet::Normal);
        manager.configure(&mut hw, PinSet::Overlap);
        assert_eq!(sim.reg(SpiUnit::Spi1, Reg::Ctrl2), 0x55);

        // Shutdown forgets the overlap setup
        manager.configure(&mut hw, PinSet::None);
        manager.configure(&mut hw, PinSet::Overlap);
        assert_eq!(sim.reg(SpiUnit::Spi1, Reg::Ctrl2), 0);
    }

    #[test]
    fn test_none_reverts_pins() {
        let mut hw = SimBus::new();
        let sim = hw.clone();
        let mut manager = PinManager::new();

        manager.configure(&mut hw, PinSet::Normal);
        manager.configure(&mut hw, PinSet::None);
        for pin in BUS_PINS {
            assert_eq!(sim.pin_function(pin), PinFunction::Gpio);
        }
    }

    #[test]
    fn test_chip_select_function_once() {
        let mut hw = SimBus::new();
        let sim = hw.clone();
        let mut manager = PinManager::new();

        manager.configure_chip_select(&mut hw, 1);
        assert_eq!(sim.pin_function(pins::CS1), PinFunction::SpiCs1);
        hw.select_function(pins::CS1, PinFunction::Gpio);
        manager.configure_chip_select(&mut hw, 1);
        assert_eq!(sim.pin_function(pins::CS1), PinFunction::Gpio);

        manager.configure_chip_select(&mut hw, 2);
        manager.configure_chip_select(&mut hw, 5);
        assert_eq!(sim.pin_function(pins::CS2), PinFunction::SpiCs2);

        manager.release_chip_selects(&mut hw);
        assert_eq!(sim.pin_function(pins::CS2), PinFunction::Gpio);
        manager.configure_chip_select(&mut hw, 1);
        assert_eq!(sim.pin_function(pins::CS1), PinFunction::SpiCs1);
    }

    #[test]
    fn test_claims() {
        let mut manager = PinManager::new();
        manager.claim(0);
        manager.claim(7);
        manager.claim(8);
        assert!(manager.is_claimed(0));
        assert!(manager.is_claimed(7));
        assert!(!manager.is_claimed(8));
        assert_eq!(manager.claimed(), 0x81);
        manager.release(0);
        assert_eq!(manager.claimed(), 0x80);
    }
}
