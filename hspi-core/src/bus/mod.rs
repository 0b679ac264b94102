//! Bus routing and per-device register state
//!
//! - [`pins`] - Pin set transitions and chip-select claims
//! - [`registers`] - Register snapshots and the shared clock source

pub mod pins;
pub mod registers;

pub use pins::PinManager;
pub use registers::{ClockMux, DeviceRegisters};
