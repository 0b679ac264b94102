//! Transaction statistics

use portable_atomic::{AtomicU32, Ordering};

/// Snapshot of the controller counters
///
/// Advisory only: each counter is read atomically, the set is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Completed requests
    pub request_count: u32,
    /// Completed hardware bursts
    pub trans_count: u32,
    /// CPU cycles spent blocked in synchronous waits
    pub wait_cycles: u32,
}

impl Stats {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Live counters, updated from both contexts
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    request_count: AtomicU32,
    trans_count: AtomicU32,
    wait_cycles: AtomicU32,
}

impl StatCounters {
    pub const fn new() -> Self {
        Self {
            request_count: AtomicU32::new(0),
            trans_count: AtomicU32::new(0),
            wait_cycles: AtomicU32::new(0),
        }
    }

    pub fn request_done(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn burst_done(&self) {
        self.trans_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_wait(&self, cycles: u32) {
        self.wait_cycles.fetch_add(cycles, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            request_count: self.request_count.load(Ordering::Relaxed),
            trans_count: self.trans_count.load(Ordering::Relaxed),
            wait_cycles: self.wait_cycles.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.request_count.store(0, Ordering::Relaxed);
        self.trans_count.store(0, Ordering::Relaxed);
        self.wait_cycles.store(0, Ordering::Relaxed);
    }
}
