//! SPI register layout
//!
//! Word offsets and bit fields of the SPI0/SPI1 register blocks and the
//! few system registers the controller touches. Values are composed with
//! these constants and written a whole word at a time.

/// SPI register within a unit's register block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Reg {
    /// Command (start bit)
    Cmd = 0x00,
    /// Address phase value
    Addr = 0x04,
    /// Control: bit order and fast read modes
    Ctrl = 0x08,
    /// Control 1
    Ctrl1 = 0x0C,
    /// Control 2: hold and delay timing
    Ctrl2 = 0x14,
    /// Clock divider
    Clock = 0x18,
    /// User phase enables and line modes
    User = 0x1C,
    /// Phase bit lengths
    User1 = 0x20,
    /// Command phase value and length
    User2 = 0x24,
    /// Chip-select enables and clock idle level
    Pin = 0x2C,
    /// Slave control: interrupt enables and status
    Slave = 0x30,
    /// Extension 3: transaction priority hold
    Ext3 = 0xFC,
}

impl Reg {
    /// Byte offset from the unit's base address
    pub const fn offset(self) -> usize {
        self as usize
    }
}

/// `Cmd` register
pub mod cmd {
    /// Start a user-defined transaction
    pub const USR: u32 = 1 << 18;
}

/// `Ctrl` register
pub mod ctrl {
    /// Transmit LSB first
    pub const WR_BIT_ORDER: u32 = 1 << 26;
    /// Receive LSB first
    pub const RD_BIT_ORDER: u32 = 1 << 25;
    /// Quad I/O read (address and data on four lines)
    pub const FREAD_QIO: u32 = 1 << 24;
    /// Dual I/O read (address and data on two lines)
    pub const FREAD_DIO: u32 = 1 << 23;
    /// Write protect level
    pub const WP_REG: u32 = 1 << 21;
    /// Quad output read (data only on four lines)
    pub const FREAD_QUAD: u32 = 1 << 20;
    /// Dual output read (data only on two lines)
    pub const FREAD_DUAL: u32 = 1 << 14;
    /// Fast read enable, required by all multi-line modes
    pub const FASTRD_MODE: u32 = 1 << 13;
}

/// `Clock` register
pub mod clock {
    /// SPI clock equals the peripheral clock (divider bypass)
    pub const EQU_SYSCLK: u32 = 1 << 31;
    /// Prescaler field shift
    pub const PRE_SHIFT: u32 = 18;
    /// Prescaler field mask (after shift)
    pub const PRE_MASK: u32 = 0x1FFF;
    /// Counter field shift
    pub const N_SHIFT: u32 = 12;
    /// Counter field mask (after shift)
    pub const N_MASK: u32 = 0x3F;
    /// High duty field shift
    pub const H_SHIFT: u32 = 6;
    /// Low duty field shift
    pub const L_SHIFT: u32 = 0;
    /// Duty field mask (after shift)
    pub const DUTY_MASK: u32 = 0x3F;
}

/// `User` register
pub mod user {
    /// Command phase enable
    pub const USR_COMMAND: u32 = 1 << 31;
    /// Address phase enable
    pub const USR_ADDR: u32 = 1 << 30;
    /// Dummy phase enable
    pub const USR_DUMMY: u32 = 1 << 29;
    /// Read (MISO) phase enable
    pub const USR_MISO: u32 = 1 << 28;
    /// Write (MOSI) phase enable
    pub const USR_MOSI: u32 = 1 << 27;
    /// Quad I/O write
    pub const FWRITE_QIO: u32 = 1 << 15;
    /// Dual I/O write
    pub const FWRITE_DIO: u32 = 1 << 14;
    /// Quad output write
    pub const FWRITE_QUAD: u32 = 1 << 13;
    /// Dual output write
    pub const FWRITE_DUAL: u32 = 1 << 12;
    /// Transmit words big-endian
    pub const WR_BYTE_ORDER: u32 = 1 << 11;
    /// Receive words big-endian
    pub const RD_BYTE_ORDER: u32 = 1 << 10;
    /// Data changes on the clock edge selected by CPHA
    pub const CK_OUT_EDGE: u32 = 1 << 7;
    /// Chip-select setup time enable
    pub const CS_SETUP: u32 = 1 << 5;
    /// Chip-select hold time enable
    pub const CS_HOLD: u32 = 1 << 4;
    /// Full duplex: read during the MOSI phase
    pub const DUPLEX: u32 = 1 << 0;
}

/// `User1` register
pub mod user1 {
    /// Address bit length minus one
    pub const ADDR_BITLEN_SHIFT: u32 = 26;
    /// MOSI bit length minus one
    pub const MOSI_BITLEN_SHIFT: u32 = 17;
    /// MISO bit length minus one
    pub const MISO_BITLEN_SHIFT: u32 = 8;
    /// Dummy cycle count minus one
    pub const DUMMY_CYCLELEN_SHIFT: u32 = 0;
    /// Address bit length mask (after shift)
    pub const ADDR_BITLEN_MASK: u32 = 0x3F;
    /// Data bit length mask (after shift)
    pub const DATA_BITLEN_MASK: u32 = 0x1FF;
    /// Dummy cycle mask (after shift)
    pub const DUMMY_CYCLELEN_MASK: u32 = 0xFF;
}

/// `User2` register
pub mod user2 {
    /// Command bit length minus one
    pub const COMMAND_BITLEN_SHIFT: u32 = 28;
    /// Command bit length mask (after shift)
    pub const COMMAND_BITLEN_MASK: u32 = 0xF;
    /// Command value mask
    pub const COMMAND_VALUE_MASK: u32 = 0xFFFF;
}

/// `Pin` register
pub mod pin {
    /// Clock idles high (CPOL)
    pub const CK_IDLE_EDGE: u32 = 1 << 29;
    /// Disable hardware CS2
    pub const CS2_DIS: u32 = 1 << 2;
    /// Disable hardware CS1
    pub const CS1_DIS: u32 = 1 << 1;
    /// Disable hardware CS0
    pub const CS0_DIS: u32 = 1 << 0;
    /// All hardware chip-selects disabled
    pub const CS_DIS_ALL: u32 = CS0_DIS | CS1_DIS | CS2_DIS;
}

/// `Slave` register
pub mod slave {
    /// Reset the SPI state machine
    pub const SYNC_RESET: u32 = 1 << 31;
    /// Operate as slave
    pub const SLAVE_MODE: u32 = 1 << 30;
    /// Transaction-done interrupt enable
    pub const TRANS_INTEN: u32 = 1 << 9;
    /// Transaction-done status
    pub const TRANS_DONE: u32 = 1 << 4;
    /// All interrupt enables and status flags
    pub const INT_MASK: u32 = 0x3FF;
}

/// `Ext3` register
pub mod ext3 {
    /// Transaction priority hold mask
    pub const INT_HOLD_ENA: u32 = 0x3;
}

/// IO MUX configuration register (shared clock source selection)
pub mod iomux {
    /// SPI0 clock bypasses its divider
    pub const SPI0_CLK_EQU_SYS_CLK: u32 = 1 << 8;
    /// SPI1 clock bypasses its divider
    pub const SPI1_CLK_EQU_SYS_CLK: u32 = 1 << 9;
}

/// Host interface select register
pub mod host_inf {
    /// Route SPI1 onto the SPI0 (flash) pins
    pub const PERI_IO_CSPI_OVERLAP: u32 = 1 << 7;
}

/// Shared SPI interrupt status register
pub mod int_status {
    /// SPI0 raised the interrupt
    pub const SPI0: u32 = 1 << 4;
    /// SPI1 (HSPI) raised the interrupt
    pub const SPI1: u32 = 1 << 7;
}

/// Compose a clock register value from its fields
pub const fn clock_value(pre: u32, n: u32, h: u32, l: u32) -> u32 {
    ((pre & clock::PRE_MASK) << clock::PRE_SHIFT)
        | ((n & clock::N_MASK) << clock::N_SHIFT)
        | ((h & clock::DUTY_MASK) << clock::H_SHIFT)
        | ((l & clock::DUTY_MASK) << clock::L_SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_value_fields() {
        assert_eq!(clock_value(0x1FFF, 0x3F, 0, 0), 0x7FFF_F000);
        assert_eq!(clock_value(0, 1, 0, 1), (1 << 12) | 1);
    }

    #[test]
    fn test_clock_value_masks_fields() {
        // Out-of-range fields must not bleed into neighbours
        assert_eq!(clock_value(0x2000, 0, 0, 0), 0);
        assert_eq!(clock_value(0, 0x40, 0, 0), 0);
    }
}
