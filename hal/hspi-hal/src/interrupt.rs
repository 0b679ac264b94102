//! Shared SPI interrupt line
//!
//! SPI0 and SPI1 raise the same CPU interrupt. The handler reads the
//! shared status word to find out which unit fired.

/// SPI interrupt control
pub trait InterruptControl {
    /// Unmask the SPI interrupt
    fn enable_interrupt(&mut self);

    /// Mask the SPI interrupt
    fn disable_interrupt(&mut self);

    /// Read the shared SPI interrupt status word
    ///
    /// See [`crate::regs::int_status`] for the bit layout.
    fn interrupt_status(&mut self) -> u32;
}
