//! Shared-bus HSPI master controller
//!
//! This crate multiplexes several slave devices over the single HSPI
//! peripheral. It is written against the `hspi-hal` traits and contains
//! no target-specific code:
//!
//! - Clock divider search and its inverse
//! - Pin set and chip-select routing
//! - Per-device register snapshots, rebuilt only after a settings change
//! - Request queue and the interrupt-driven transaction engine
//! - Device capability traits
//!
//! # Usage
//!
//! ```ignore
//! let controller = Controller::new(hardware);
//! controller.begin();
//! let id = controller.start_device(&ram, PinSet::Normal, 0, 40_000_000)?;
//! let request = controller.execute(Request::new(id).command8(0x05).in8())?;
//! ```
//!
//! The platform interrupt handler calls [`Controller::on_interrupt`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod bus;
pub mod clock;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod transfer;

pub use config::{BitOrder, ClockMode, DeviceSettings, IoMode, PinSet};
pub use controller::{Controller, Stats};
pub use device::{Device, DeviceBase, DeviceId, SelectDevice};
pub use error::{ConfigError, ExecuteError, Rejected};
pub use transfer::{Address, Callback, Command, InData, OutData, Request, Ticket};

pub use hspi_hal::APB_CLK_FREQ;

/// Hardware FIFO capacity in bytes, the largest single burst
pub const HARDWARE_BUFFER_SIZE: usize = hspi_hal::spi::FIFO_SIZE;

/// Chip-select ids: 0..=2 are hardware lines, the rest need a select hook
pub const MAX_DEVICES: usize = 8;

/// Requests the controller can hold at once, in flight or queued
pub const MAX_REQUESTS: usize = 8;
