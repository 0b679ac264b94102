//! HSPI Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the controller in `hspi-core`
//! is written against. Chip crates implement them over real registers
//! (`hspi-hal-esp8266`) or over a simulated register file
//! (`hspi-hal-sim`), so the same transaction engine runs on the target
//! and in host tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  hspi-core (Controller, engine)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hspi-hal (this crate - traits + regs)  │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  hspi-hal-    │       │  hspi-hal-    │
//! │   esp8266     │       │     sim       │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`spi::SpiRegisters`] - SPI0/SPI1 register blocks and the SPI1 FIFO
//! - [`gpio::PinMux`] - Pin function selection
//! - [`system::SystemRegisters`] - IO MUX clock config and host interface select
//! - [`interrupt::InterruptControl`] - Shared SPI interrupt line
//! - [`system::CycleCounter`] - CPU cycle counter for wait accounting

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod interrupt;
pub mod regs;
pub mod spi;
pub mod system;

// Re-export key traits at crate root for convenience
pub use gpio::PinMux;
pub use interrupt::InterruptControl;
pub use spi::{SpiRegisters, SpiUnit};
pub use system::{CycleCounter, SystemRegisters};

/// Peripheral (APB) clock feeding the SPI clock dividers, in Hz
pub const APB_CLK_FREQ: u32 = 80_000_000;

/// Everything the controller needs from the platform
///
/// Implemented automatically for any type providing all the
/// individual register traits.
pub trait Hardware:
    SpiRegisters + PinMux + SystemRegisters + InterruptControl + CycleCounter
{
}

// Blanket implementation for types that implement every register trait
impl<T> Hardware for T where
    T: SpiRegisters + PinMux + SystemRegisters + InterruptControl + CycleCounter
{
}
