//! Per-device register snapshots
//!
//! A device's settings map onto four SPI1 register words. They are
//! computed once per settings change and written as whole words when the
//! device becomes active.

use hspi_hal::regs::{self, clock_value, Reg};
use hspi_hal::{SpiRegisters, SpiUnit, SystemRegisters};

use crate::clock::{frequency_to_divider, BYPASS};
use crate::config::{BitOrder, DeviceSettings, IoMode, PinSet};

/// SPI0 clock while diverted: peripheral clock / 2
const SPI0_SAFE_CLOCK: u32 = clock_value(0, 1, 0, 1);

/// Register values for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceRegisters {
    pub ctrl: u32,
    pub clock: u32,
    pub pin: u32,
    /// Base user word; burst phase enables are added per transaction
    pub user: u32,
    pub pin_set: PinSet,
    pub bit_order: BitOrder,
}

impl DeviceRegisters {
    /// Compute the register values for `settings`
    ///
    /// # Panics
    ///
    /// If the I/O mode needs more data lines than the pin set provides.
    pub fn build(settings: &DeviceSettings) -> Self {
        assert!(
            settings.io_mode.is_supported_by(settings.pin_set),
            "I/O mode not supported by pin set"
        );

        let mut ctrl = regs::ctrl::WP_REG;
        let mut user = regs::user::CS_SETUP | regs::user::CS_HOLD;
        let mut pin = match settings.chip_select {
            0 => regs::pin::CS1_DIS | regs::pin::CS2_DIS,
            1 => regs::pin::CS0_DIS | regs::pin::CS2_DIS,
            2 => regs::pin::CS0_DIS | regs::pin::CS1_DIS,
            _ => regs::pin::CS_DIS_ALL,
        };

        if settings.bit_order == BitOrder::LsbFirst {
            ctrl |= regs::ctrl::WR_BIT_ORDER | regs::ctrl::RD_BIT_ORDER;
        }
        // Byte order stays little-endian: WR/RD_BYTE_ORDER clear

        match settings.io_mode {
            IoMode::Spi => user |= regs::user::DUPLEX,
            IoMode::SpiHd => {}
            IoMode::Sdi | IoMode::Dio => {
                ctrl |= regs::ctrl::FASTRD_MODE | regs::ctrl::FREAD_DIO;
                user |= regs::user::FWRITE_DIO;
            }
            IoMode::Dual => {
                ctrl |= regs::ctrl::FASTRD_MODE | regs::ctrl::FREAD_DUAL;
                user |= regs::user::FWRITE_DUAL;
            }
            IoMode::Sqi | IoMode::Qio => {
                ctrl |= regs::ctrl::FASTRD_MODE | regs::ctrl::FREAD_QIO;
                user |= regs::user::FWRITE_QIO;
            }
            IoMode::Quad => {
                ctrl |= regs::ctrl::FASTRD_MODE | regs::ctrl::FREAD_QUAD;
                user |= regs::user::FWRITE_QUAD;
            }
        }

        if settings.clock_mode.cpha() {
            user |= regs::user::CK_OUT_EDGE;
        }
        if settings.clock_mode.cpol() {
            pin |= regs::pin::CK_IDLE_EDGE;
        }

        Self {
            ctrl,
            clock: frequency_to_divider(settings.clock_speed),
            pin,
            user,
            pin_set: settings.pin_set,
            bit_order: settings.bit_order,
        }
    }

    /// Write the snapshot into SPI1, clock last
    pub fn load<H>(&self, hw: &mut H, mux: &mut ClockMux)
    where
        H: SpiRegisters + SystemRegisters,
    {
        hw.write_reg(SpiUnit::Spi1, Reg::Ctrl, self.ctrl);
        hw.write_reg(SpiUnit::Spi1, Reg::Ctrl1, 0);
        hw.write_reg(SpiUnit::Spi1, Reg::Pin, self.pin);
        hw.write_reg(SpiUnit::Spi1, Reg::User, self.user);
        mux.select(hw, self.clock, self.pin_set);
        hw.write_reg(SpiUnit::Spi1, Reg::Clock, self.clock);
    }
}

/// Clock source selection shared between SPI0 and SPI1
///
/// In overlap mode a full-speed SPI0 clock overrides the SPI1 divider,
/// so SPI0 is moved to a divided clock until the bus goes idle.
#[derive(Debug, Default)]
pub struct ClockMux {
    diverted: bool,
}

impl ClockMux {
    pub const fn new() -> Self {
        Self { diverted: false }
    }

    /// True while SPI0 runs from the substitute divider
    pub fn is_diverted(&self) -> bool {
        self.diverted
    }

    /// Set up the IO MUX clock selection for an SPI1 clock value
    pub fn select<H: SpiRegisters + SystemRegisters>(
        &mut self,
        hw: &mut H,
        clock: u32,
        pin_set: PinSet,
    ) {
        let mut io_mux = hw.io_mux_conf();
        if clock == BYPASS {
            io_mux |= regs::iomux::SPI1_CLK_EQU_SYS_CLK;
        } else {
            io_mux &= !regs::iomux::SPI1_CLK_EQU_SYS_CLK;
            if !self.diverted
                && pin_set == PinSet::Overlap
                && io_mux & regs::iomux::SPI0_CLK_EQU_SYS_CLK != 0
            {
                hw.write_reg(SpiUnit::Spi0, Reg::Clock, SPI0_SAFE_CLOCK);
                io_mux &= !regs::iomux::SPI0_CLK_EQU_SYS_CLK;
                self.diverted = true;

                #[cfg(feature = "defmt")]
                defmt::debug!("SPI0 clock diverted");
            }
        }
        hw.set_io_mux_conf(io_mux);
    }

    /// Give SPI0 its system clock back if it was diverted
    pub fn restore<H: SystemRegisters>(&mut self, hw: &mut H) {
        if !self.diverted {
            return;
        }
        let io_mux = hw.io_mux_conf() | regs::iomux::SPI0_CLK_EQU_SYS_CLK;
        hw.set_io_mux_conf(io_mux);
        self.diverted = false;

        #[cfg(feature = "defmt")]
        defmt::debug!("SPI0 clock restored");
    }
}
