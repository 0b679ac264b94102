//! Chip-select hooks for ids without a hardware line

pub mod hc138;

pub use hc138::Hc138Select;
