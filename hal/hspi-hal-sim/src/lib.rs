//! HSPI Hardware Simulator
//!
//! Host-side implementation of the `hspi-hal` traits. A [`SimBus`] holds
//! the SPI0/SPI1 register files, the 64-byte FIFO, the IO MUX and the
//! shared interrupt status. Writing the start bit runs the programmed
//! burst to completion immediately: command and address phases are
//! decoded bit-accurately according to the bit-order configuration,
//! data is shifted through the selected [`Slave`], and the
//! transaction-done status is raised for the interrupt handler to
//! consume.
//!
//! Multi-line I/O modes are simulated as a logical bit stream; the line
//! configuration is recorded in each [`Burst`] for inspection.
//!
//! # Example
//!
//! ```ignore
//! let sim = SimBus::new();
//! let ram = SpiRamModel::new();
//! sim.attach(0, ram.clone());
//! // ... drive a controller built over `sim.clone()`,
//! // pumping `on_interrupt()` while `sim.interrupt_pending()`
//! ```

pub mod bus;
pub mod slave;
mod wire;

pub use bus::{Burst, Phase, SimBus};
pub use slave::{Frame, Loopback, RamIo, Recorder, Slave, SpiRamModel};
