//! Raw register access

#![allow(unsafe_code)]

/// Volatile read of a peripheral register
#[inline(always)]
pub fn read(addr: usize) -> u32 {
    // SAFETY: callers only pass addresses of ESP8266 peripheral registers,
    // which are always mapped and 4-byte aligned.
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

/// Volatile write of a peripheral register
#[inline(always)]
pub fn write(addr: usize, value: u32) {
    // SAFETY: as for `read`
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

/// CPU cycle counter (CCOUNT special register)
#[cfg(target_arch = "xtensa")]
#[inline(always)]
pub fn ccount() -> u32 {
    let count: u32;
    // SAFETY: reading CCOUNT has no side effects
    unsafe { core::arch::asm!("rsr.ccount {0}", out(reg) count, options(nomem, nostack)) };
    count
}

#[cfg(not(target_arch = "xtensa"))]
pub fn ccount() -> u32 {
    0
}
