//! System registers outside the SPI blocks

/// Shared configuration registers
pub trait SystemRegisters {
    /// Read the IO MUX configuration register
    fn io_mux_conf(&mut self) -> u32;

    /// Write the IO MUX configuration register
    fn set_io_mux_conf(&mut self, value: u32);

    /// Read the host interface select register
    fn host_inf_sel(&mut self) -> u32;

    /// Write the host interface select register
    fn set_host_inf_sel(&mut self, value: u32);
}

/// Free-running CPU cycle counter
///
/// Used for wait accounting only; wraps silently.
pub trait CycleCounter {
    /// Current cycle count
    fn cycle_count() -> u32;
}
