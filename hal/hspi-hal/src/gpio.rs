//! Pin function selection
//!
//! HSPI signals reach the pads through the IO MUX. The controller only
//! ever switches a fixed set of pins between their SPI function and
//! plain GPIO.

/// GPIO numbers carrying HSPI signals
pub mod pins {
    /// HSPI MISO
    pub const MISO: u8 = 12;
    /// HSPI MOSI
    pub const MOSI: u8 = 13;
    /// HSPI clock
    pub const CLK: u8 = 14;
    /// Hardware chip-select 0
    pub const CS0: u8 = 15;
    /// Hardware chip-select 1 (shared with UART0 TX)
    pub const CS1: u8 = 1;
    /// Hardware chip-select 2
    pub const CS2: u8 = 0;
}

/// Function routed to a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinFunction {
    /// Plain GPIO
    Gpio,
    /// HSPI data or clock signal (GPIO12..=14)
    Hspi,
    /// HSPI chip-select 0 (GPIO15)
    HspiCs0,
    /// SPI chip-select 1 (GPIO1)
    SpiCs1,
    /// SPI chip-select 2 (GPIO0)
    SpiCs2,
}

/// Pin multiplexer
pub trait PinMux {
    /// Route `function` to GPIO `pin`
    ///
    /// The controller only requests combinations listed in [`pins`];
    /// implementations may ignore anything else.
    fn select_function(&mut self, pin: u8, function: PinFunction);
}
