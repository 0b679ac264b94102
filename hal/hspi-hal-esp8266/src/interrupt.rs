//! SPI interrupt through the ROM's ETS API

#![allow(unsafe_code)]

use core::ffi::c_void;

/// CPU interrupt number shared by SPI0 and SPI1
pub const ETS_SPI_INUM: i32 = 2;

/// Interrupt handler signature expected by the ROM
pub type Handler = extern "C" fn(*mut c_void);

extern "C" {
    fn ets_isr_attach(intr: i32, handler: Handler, arg: *mut c_void);
    fn ets_isr_mask(mask: u32);
    fn ets_isr_unmask(mask: u32);
}

/// Install `handler` for the SPI interrupt, called with `arg`
///
/// The handler should call `Controller::on_interrupt`. Attach before
/// `Controller::begin`, which unmasks the interrupt.
pub fn attach(handler: Handler, arg: *mut c_void) {
    // SAFETY: ROM routine, valid for any handler and argument
    unsafe { ets_isr_attach(ETS_SPI_INUM, handler, arg) }
}

pub(crate) fn unmask() {
    // SAFETY: ROM routine
    unsafe { ets_isr_unmask(1 << ETS_SPI_INUM) }
}

pub(crate) fn mask() {
    // SAFETY: ROM routine
    unsafe { ets_isr_mask(1 << ETS_SPI_INUM) }
}
