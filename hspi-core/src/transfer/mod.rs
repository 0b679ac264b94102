//! Transfer descriptors and the request queue
//!
//! - [`request`] - What to clock out and where to put what comes back
//! - [`queue`] - Fixed slot arena holding requests while the controller owns them

pub mod queue;
pub mod request;

pub use queue::{Queue, Ticket};
pub use request::{Address, Callback, Command, InData, OutData, Request};
