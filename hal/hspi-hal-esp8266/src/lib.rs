//! ESP8266 HSPI hardware
//!
//! Implements the `hspi-hal` traits with volatile accesses to the SPI0
//! and SPI1 register blocks, the IO MUX and the DPORT registers. The SPI
//! interrupt is attached through the ROM's ETS interrupt API.
//!
//! # Usage
//!
//! ```ignore
//! static CONTROLLER: StaticCell<Controller<'static, Esp8266Hspi>> = StaticCell::new();
//!
//! extern "C" fn spi_isr(arg: *mut c_void) {
//!     let controller = unsafe { &*(arg as *const Controller<'static, Esp8266Hspi>) };
//!     controller.on_interrupt();
//! }
//!
//! let controller = CONTROLLER.init(Controller::new(Esp8266Hspi::take()?));
//! interrupt::attach(spi_isr, controller as *const _ as *mut c_void);
//! controller.begin();
//! ```

#![no_std]
#![deny(unsafe_code)]
#![cfg_attr(target_arch = "xtensa", feature(asm_experimental_arch))]

pub mod interrupt;
mod mmio;
pub mod pinmux;

use core::sync::atomic::{AtomicBool, Ordering};

use hspi_hal::gpio::PinFunction;
use hspi_hal::regs::Reg;
use hspi_hal::spi::FIFO_SIZE;
use hspi_hal::{CycleCounter, InterruptControl, PinMux, SpiRegisters, SpiUnit, SystemRegisters};

/// SPI0 (flash) register block
const SPI0_BASE: usize = 0x6000_0200;
/// SPI1 (HSPI) register block
const SPI1_BASE: usize = 0x6000_0100;
/// First FIFO word (W0) within a register block
const FIFO_OFFSET: usize = 0x40;
/// IO MUX configuration register
const IO_MUX_CONF: usize = 0x6000_0800;
/// Host interface select (DPORT)
const HOST_INF_SEL: usize = 0x3FF0_0028;
/// Shared SPI interrupt status (DPORT)
const SPI_INT_STATUS: usize = 0x3FF0_0020;

static TAKEN: AtomicBool = AtomicBool::new(false);

fn base(unit: SpiUnit) -> usize {
    match unit {
        SpiUnit::Spi0 => SPI0_BASE,
        SpiUnit::Spi1 => SPI1_BASE,
    }
}

/// Handle to the HSPI peripheral and the registers it shares
///
/// Only one handle exists; see [`Esp8266Hspi::take`].
#[derive(Debug)]
pub struct Esp8266Hspi {
    _private: (),
}

impl Esp8266Hspi {
    /// Claim the peripheral, once
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self { _private: () })
        }
    }
}

impl SpiRegisters for Esp8266Hspi {
    fn read_reg(&mut self, unit: SpiUnit, reg: Reg) -> u32 {
        mmio::read(base(unit) + reg.offset())
    }

    fn write_reg(&mut self, unit: SpiUnit, reg: Reg, value: u32) {
        mmio::write(base(unit) + reg.offset(), value);
    }

    fn write_fifo(&mut self, data: &[u8]) {
        let len = data.len().min(FIFO_SIZE);
        for (i, chunk) in data[..len].chunks(4).enumerate() {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            mmio::write(SPI1_BASE + FIFO_OFFSET + i * 4, u32::from_le_bytes(word));
        }
    }

    fn read_fifo(&mut self, buf: &mut [u8]) {
        let len = buf.len().min(FIFO_SIZE);
        for (i, chunk) in buf[..len].chunks_mut(4).enumerate() {
            let word = mmio::read(SPI1_BASE + FIFO_OFFSET + i * 4).to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn read_fifo_word(&mut self) -> u32 {
        mmio::read(SPI1_BASE + FIFO_OFFSET)
    }
}

impl PinMux for Esp8266Hspi {
    fn select_function(&mut self, pin: u8, function: PinFunction) {
        let Some((offset, code)) = pinmux::function_code(pin, function) else {
            return;
        };
        let addr = IO_MUX_CONF + offset;
        let value = pinmux::with_function(mmio::read(addr), code);
        mmio::write(addr, value);
    }
}

impl SystemRegisters for Esp8266Hspi {
    fn io_mux_conf(&mut self) -> u32 {
        mmio::read(IO_MUX_CONF)
    }

    fn set_io_mux_conf(&mut self, value: u32) {
        mmio::write(IO_MUX_CONF, value);
    }

    fn host_inf_sel(&mut self) -> u32 {
        mmio::read(HOST_INF_SEL)
    }

    fn set_host_inf_sel(&mut self, value: u32) {
        mmio::write(HOST_INF_SEL, value);
    }
}

impl InterruptControl for Esp8266Hspi {
    fn enable_interrupt(&mut self) {
        interrupt::unmask();
    }

    fn disable_interrupt(&mut self) {
        interrupt::mask();
    }

    fn interrupt_status(&mut self) -> u32 {
        mmio::read(SPI_INT_STATUS)
    }
}

impl CycleCounter for Esp8266Hspi {
    fn cycle_count() -> u32 {
        mmio::ccount()
    }
}
