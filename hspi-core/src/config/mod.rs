//! Device configuration types
//!
//! Settings a device carries and the controller turns into register
//! values. All types convert from raw bytes for configuration sources.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Physical pin routing for the HSPI signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PinSet {
    /// Not routed
    #[default]
    None,
    /// Dedicated HSPI pins (GPIO12..=15)
    Normal,
    /// Shared with the flash on the SPI0 pins
    Overlap,
}

impl PinSet {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PinSet::None),
            1 => Some(PinSet::Normal),
            2 => Some(PinSet::Overlap),
            _ => None,
        }
    }
}

/// Bit order for command, address and data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BitOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

impl BitOrder {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BitOrder::LsbFirst),
            1 => Some(BitOrder::MsbFirst),
            _ => None,
        }
    }
}

/// Clock polarity and phase
///
/// The discriminant holds CPOL in bit 4 and CPHA in bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ClockMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0 = 0x00,
    /// CPOL=0, CPHA=1
    Mode1 = 0x01,
    /// CPOL=1, CPHA=0
    Mode2 = 0x10,
    /// CPOL=1, CPHA=1
    Mode3 = 0x11,
}

impl ClockMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(ClockMode::Mode0),
            0x01 => Some(ClockMode::Mode1),
            0x10 => Some(ClockMode::Mode2),
            0x11 => Some(ClockMode::Mode3),
            _ => None,
        }
    }

    /// Clock idles high
    pub fn cpol(self) -> bool {
        (self as u8) & 0x10 != 0
    }

    /// Data sampled on the second clock edge
    pub fn cpha(self) -> bool {
        (self as u8) & 0x01 != 0
    }
}

/// Data line usage
///
/// Names give the line count per phase: command, address, data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IoMode {
    /// One bit per clock, full duplex
    #[default]
    Spi,
    /// One bit per clock, half duplex
    SpiHd,
    /// Two bits per clock for everything
    Sdi,
    /// Command on one line, address and data on two
    Dio,
    /// Command and address on one line, data on two
    Dual,
    /// Four bits per clock for everything
    Sqi,
    /// Command on one line, address and data on four
    Qio,
    /// Command and address on one line, data on four
    Quad,
}

impl IoMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(IoMode::Spi),
            1 => Some(IoMode::SpiHd),
            2 => Some(IoMode::Sdi),
            3 => Some(IoMode::Dio),
            4 => Some(IoMode::Dual),
            5 => Some(IoMode::Sqi),
            6 => Some(IoMode::Qio),
            7 => Some(IoMode::Quad),
            _ => None,
        }
    }

    /// Data bits transferred per clock cycle
    pub fn bits_per_clock(self) -> u8 {
        match self {
            IoMode::Spi | IoMode::SpiHd => 1,
            IoMode::Sdi | IoMode::Dio | IoMode::Dual => 2,
            IoMode::Sqi | IoMode::Qio | IoMode::Quad => 4,
        }
    }

    /// Whether the mode uses four data lines
    pub fn is_quad(self) -> bool {
        self.bits_per_clock() == 4
    }

    /// Whether `pin_set` provides enough data lines for this mode
    ///
    /// The dedicated HSPI pins carry two data lines; four need the
    /// flash pins of the overlap set.
    pub fn is_supported_by(self, pin_set: PinSet) -> bool {
        match pin_set {
            PinSet::None => false,
            PinSet::Normal => !self.is_quad(),
            PinSet::Overlap => true,
        }
    }
}

/// All settings the controller reads from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceSettings {
    pub pin_set: PinSet,
    /// Chip-select id; above 2 the select hook drives it
    pub chip_select: u8,
    /// Requested clock in Hz
    pub clock_speed: u32,
    pub bit_order: BitOrder,
    pub clock_mode: ClockMode,
    pub io_mode: IoMode,
}

impl DeviceSettings {
    /// Unattached device: 4 MHz, MSB first, mode 0, full duplex
    pub const fn new() -> Self {
        Self {
            pin_set: PinSet::None,
            chip_select: 0,
            clock_speed: 4_000_000,
            bit_order: BitOrder::MsbFirst,
            clock_mode: ClockMode::Mode0,
            io_mode: IoMode::Spi,
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self::new()
    }
}
