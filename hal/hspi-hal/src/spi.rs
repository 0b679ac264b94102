//! SPI register access
//!
//! Provides the raw register and FIFO access the transaction engine
//! drives. Implementations perform plain word reads and writes; all
//! sequencing and bit composition lives in `hspi-core`.

use crate::regs::Reg;

/// Size of the SPI1 data FIFO (16 words) in bytes
pub const FIFO_SIZE: usize = 64;

/// SPI unit on the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiUnit {
    /// SPI0, wired to the program flash
    Spi0,
    /// SPI1 (HSPI), the user bus
    Spi1,
}

/// SPI register blocks
///
/// Only SPI1 is driven for transactions. SPI0 is touched to arbitrate
/// priority and clocking when both units share the flash pins.
pub trait SpiRegisters {
    /// Read a register word
    fn read_reg(&mut self, unit: SpiUnit, reg: Reg) -> u32;

    /// Write a register word
    fn write_reg(&mut self, unit: SpiUnit, reg: Reg, value: u32);

    /// Read-modify-write a register: clear `clear`, then set `set`
    fn modify_reg(&mut self, unit: SpiUnit, reg: Reg, clear: u32, set: u32) {
        let value = self.read_reg(unit, reg);
        self.write_reg(unit, reg, (value & !clear) | set);
    }

    /// Set bits in a register
    fn set_bits(&mut self, unit: SpiUnit, reg: Reg, bits: u32) {
        self.modify_reg(unit, reg, 0, bits);
    }

    /// Clear bits in a register
    fn clear_bits(&mut self, unit: SpiUnit, reg: Reg, bits: u32) {
        self.modify_reg(unit, reg, bits, 0);
    }

    /// Copy bytes into the SPI1 FIFO starting at word 0
    ///
    /// `data` is at most [`FIFO_SIZE`] bytes. Bytes are packed
    /// little-endian into words; a trailing partial word is zero-padded.
    fn write_fifo(&mut self, data: &[u8]);

    /// Copy bytes out of the SPI1 FIFO starting at word 0
    ///
    /// `buf` is at most [`FIFO_SIZE`] bytes.
    fn read_fifo(&mut self, buf: &mut [u8]);

    /// Read the first FIFO word
    fn read_fifo_word(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.read_fifo(&mut bytes);
        u32::from_le_bytes(bytes)
    }
}
