//! Device drivers for the shared HSPI bus
//!
//! Concrete implementations of the `hspi-core` device capability:
//!
//! - Memory devices: a read/write helper layer and the IS62/65WVS2568
//!   serial RAM
//! - Chip-select decoders: 74HC138 3-to-8 line decoder driving the
//!   manual chip-selects

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod select;

pub use memory::{MemoryDevice, SpiRam};
pub use select::Hc138Select;
