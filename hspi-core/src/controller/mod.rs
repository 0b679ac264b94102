//! Bus controller
//!
//! One [`Controller`] owns the HSPI peripheral. Devices register a
//! chip-select with [`Controller::start_device`] and then submit
//! [`Request`]s, either blocking with [`Controller::execute`] or
//! asynchronously with [`Controller::submit`]. Requests from all devices
//! run in submission order; the controller reconfigures the bus whenever
//! the owning device changes.
//!
//! The platform routes the SPI interrupt to [`Controller::on_interrupt`].
//!
//! # Concurrency
//!
//! Engine state lives behind a `critical_section::Mutex`, the only
//! exclusion between foreground code and the interrupt handler.
//! Completion flags and statistics are atomics so waits can poll them
//! without masking interrupts. Completion callbacks run outside the
//! engine borrow and may submit further requests.

mod engine;
mod stats;

pub use stats::Stats;

use core::cell::RefCell;
use core::hint::spin_loop;

use critical_section::Mutex;
use hspi_hal::regs::{self, Reg};
use hspi_hal::{Hardware, SpiUnit};
use portable_atomic::{AtomicBool, Ordering};

use crate::bus::pins::HARDWARE_CS_COUNT;
use crate::config::PinSet;
use crate::device::{Device, DeviceId, SelectDevice};
use crate::error::{ConfigError, ExecuteError, Rejected};
use crate::transfer::{Request, Ticket};
use crate::{MAX_DEVICES, MAX_REQUESTS};

use engine::{DeviceEntry, Engine, Finished};
use stats::StatCounters;

/// Shared-bus HSPI master
///
/// `'d` is the lifetime of registered devices, the select hook and the
/// buffers of asynchronous requests.
pub struct Controller<'d, H> {
    engine: Mutex<RefCell<Engine<'d, H>>>,
    /// Set while a slot's request is queued or on the wire
    pending: [AtomicBool; MAX_REQUESTS],
    stats: StatCounters,
}

impl<'d, H: Hardware> Controller<'d, H> {
    pub fn new(hw: H) -> Self {
        Self {
            engine: Mutex::new(RefCell::new(Engine::new(hw))),
            pending: core::array::from_fn(|_| AtomicBool::new(false)),
            stats: StatCounters::new(),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Engine<'d, H>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.engine.borrow_ref_mut(cs)))
    }

    /// Put SPI1 into master mode and unmask its interrupt
    pub fn begin(&self) {
        self.with(|engine| {
            if engine.begun {
                return;
            }
            engine.reset_peripheral();
            engine.hw.enable_interrupt();
            engine.begun = true;

            #[cfg(feature = "defmt")]
            defmt::info!("HSPI controller started");
        });
    }

    /// Wait for outstanding requests, then release the peripheral
    ///
    /// Bus pins and chip-selects revert to GPIO. Calling `end` on a
    /// stopped controller does nothing.
    pub fn end(&self) {
        while !self.is_idle() {
            spin_loop();
        }
        self.with(|engine| {
            if !engine.begun {
                return;
            }
            engine.hw.disable_interrupt();
            engine.release_bus();
            engine.begun = false;

            #[cfg(feature = "defmt")]
            defmt::info!("HSPI controller stopped");
        });
    }

    /// Register the hook driving chip-selects without a hardware line
    pub fn on_select_device(&self, hook: &'d dyn SelectDevice) {
        self.with(|engine| engine.select = Some(hook));
    }

    /// Register `device` on `chip_select`
    ///
    /// Chip-selects 0 to 2 use the hardware lines, 3 to 7 are driven
    /// through the select hook. On success the device's settings are
    /// updated with the pin set, chip-select and clock speed.
    pub fn start_device(
        &self,
        device: &'d dyn Device,
        pin_set: PinSet,
        chip_select: u8,
        clock_speed: u32,
    ) -> Result<DeviceId, ConfigError> {
        let result = self.with(|engine| {
            if usize::from(chip_select) >= MAX_DEVICES {
                return Err(ConfigError::InvalidChipSelect);
            }
            if pin_set == PinSet::None {
                return Err(ConfigError::InvalidPinSet);
            }
            let registered = engine
                .devices
                .iter()
                .flatten()
                .any(|entry| core::ptr::addr_eq(entry.device, device));
            if registered {
                return Err(ConfigError::AlreadyRegistered);
            }
            if engine.pins.is_claimed(chip_select) {
                return Err(ConfigError::ChipSelectInUse);
            }
            let manual = chip_select >= HARDWARE_CS_COUNT;
            // CS0 is the flash chip-select once the pins overlap
            if pin_set == PinSet::Overlap && (chip_select == 0 || manual) {
                return Err(ConfigError::PinSetConflict);
            }
            if !device.io_mode().is_supported_by(pin_set) {
                return Err(ConfigError::PinSetConflict);
            }
            if manual && engine.select.is_none() {
                return Err(ConfigError::NoSelectHook);
            }

            let id = DeviceId::new(chip_select);
            engine.pins.claim(chip_select);
            match pin_set {
                PinSet::Normal => engine.normal_devices += 1,
                PinSet::Overlap => engine.overlap_devices += 1,
                PinSet::None => {}
            }
            engine.devices[id.index()] = Some(DeviceEntry {
                device,
                pin_set,
                registers: Default::default(),
                dirty: true,
            });
            device.base().attach(id, pin_set, clock_speed);
            Ok(id)
        });

        match result {
            Ok(_id) => {
                #[cfg(feature = "defmt")]
                defmt::debug!(
                    "Device started: cs {} on {} at {} Hz",
                    chip_select,
                    pin_set,
                    clock_speed
                );
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Device rejected on cs {}: {}", chip_select, _e);
            }
        }
        result
    }

    /// Release a device's chip-select
    ///
    /// Blocks until the device's queued requests have completed. The
    /// pending check and the removal happen in one critical section, so a
    /// completion callback cannot slip a request in between.
    pub fn stop_device(&self, id: DeviceId) {
        let entry = loop {
            match self.with(|engine| engine.remove_device(id)) {
                Some(entry) => break entry,
                None => spin_loop(),
            }
        };

        if let Some(entry) = entry {
            entry.device.base().detach();

            #[cfg(feature = "defmt")]
            defmt::debug!("Device stopped: cs {}", id.chip_select());
        }
    }

    /// Rebuild a device's registers before its next request
    pub fn config_changed(&self, id: DeviceId) {
        self.with(|engine| {
            if let Some(entry) = engine.devices.get_mut(id.index()).and_then(Option::as_mut) {
                entry.dirty = true;
            }
            if engine.active_device == Some(id) {
                engine.active_device = None;
            }
        });
    }

    /// Queue a request, starting it at once if the bus is idle
    pub fn submit(&self, request: Request<'d>) -> Result<Ticket, Rejected<'d>> {
        let (ticket, orphans) = self.with(|engine| {
            if !engine.begun {
                return Err(Rejected {
                    error: ExecuteError::NotStarted,
                    request,
                });
            }
            if !engine.is_registered(request.device()) {
                return Err(Rejected {
                    error: ExecuteError::UnknownDevice,
                    request,
                });
            }
            let ticket = engine.queue.push(request).map_err(|request| Rejected {
                error: ExecuteError::QueueFull,
                request,
            })?;
            self.pending[ticket.index()].store(true, Ordering::Release);
            if !engine.busy {
                engine.start_transaction();
            }
            Ok((ticket, engine.take_orphans()))
        })?;
        self.release_orphans(orphans);
        Ok(ticket)
    }

    /// Publish completion of requests dropped for a stopped device
    fn release_orphans(&self, orphans: u8) {
        for (index, pending) in self.pending.iter().enumerate() {
            if orphans & (1 << index) != 0 {
                pending.store(false, Ordering::Release);
            }
        }
    }

    /// Run a request to completion and hand it back
    ///
    /// Spins until the interrupt handler has finished the request, so
    /// the interrupt must be able to preempt the caller.
    #[allow(unsafe_code)]
    pub fn execute<'b>(&self, request: Request<'b>) -> Result<Request<'b>, Rejected<'b>> {
        // SAFETY: the queue owns the request until `wait` hands it back,
        // and this function does not return before then, so no borrow in
        // it is used beyond `'b`. A rejected request never entered the
        // queue.
        match self.submit(unsafe { relabel(request) }) {
            Ok(ticket) => Ok(unsafe { relabel(self.wait(ticket)) }),
            Err(Rejected { error, request }) => Err(Rejected {
                error,
                request: unsafe { relabel(request) },
            }),
        }
    }

    /// Block until a submitted request completes and take it back
    pub fn wait(&self, ticket: Ticket) -> Request<'d> {
        let start = H::cycle_count();
        while self.pending[ticket.index()].load(Ordering::Acquire) {
            spin_loop();
        }
        self.stats.add_wait(H::cycle_count().wrapping_sub(start));
        self.collect(ticket)
    }

    /// Like [`Controller::wait`], giving up after `max_cycles` CPU cycles
    ///
    /// The ticket is handed back on timeout; the request stays queued.
    pub fn wait_timeout(&self, ticket: Ticket, max_cycles: u32) -> Result<Request<'d>, Ticket> {
        let start = H::cycle_count();
        while self.pending[ticket.index()].load(Ordering::Acquire) {
            let elapsed = H::cycle_count().wrapping_sub(start);
            if elapsed >= max_cycles {
                self.stats.add_wait(elapsed);
                return Err(ticket);
            }
            spin_loop();
        }
        self.stats.add_wait(H::cycle_count().wrapping_sub(start));
        Ok(self.collect(ticket))
    }

    fn collect(&self, ticket: Ticket) -> Request<'d> {
        match self.with(|engine| engine.queue.release(ticket)) {
            Some(request) => request,
            None => panic!("request slot released twice"),
        }
    }

    /// Non-blocking completion check
    pub fn is_complete(&self, ticket: &Ticket) -> bool {
        !self.pending[ticket.index()].load(Ordering::Acquire)
    }

    /// Drop interest in a request; its slot is freed when it completes
    pub fn detach(&self, ticket: Ticket) {
        self.with(|engine| engine.queue.detach(ticket));
    }

    /// Interrupt handler body
    ///
    /// Returns without side effects if SPI1 did not raise the shared
    /// interrupt line.
    pub fn on_interrupt(&self) {
        let finished = self.with(|engine| {
            if engine.hw.interrupt_status() & regs::int_status::SPI1 == 0 {
                return None;
            }
            engine
                .hw
                .clear_bits(SpiUnit::Spi1, Reg::Slave, regs::slave::TRANS_DONE);
            engine.advance(&self.stats)
        });

        let Some(Finished {
            index,
            request,
            device,
        }) = finished
        else {
            return;
        };

        match device {
            Some(device) => device.transfer_complete(&request),
            None => request.invoke_callback(),
        }

        let orphans = self.with(|engine| {
            engine.retire(index, request);
            self.stats.request_done();
            self.pending[usize::from(index)].store(false, Ordering::Release);
            engine.take_orphans()
        });
        self.release_orphans(orphans);
    }

    /// Pin set the bus is currently routed to
    pub fn active_pin_set(&self) -> PinSet {
        self.with(|engine| engine.pins.active())
    }

    /// True when no request is queued or on the wire
    pub fn is_idle(&self) -> bool {
        self.with(|engine| !engine.busy && engine.queue.is_empty())
    }

    /// Registered devices using `pin_set`
    pub fn device_count(&self, pin_set: PinSet) -> u8 {
        self.with(|engine| match pin_set {
            PinSet::Normal => engine.normal_devices,
            PinSet::Overlap => engine.overlap_devices,
            PinSet::None => 0,
        })
    }

    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    pub fn clear_stats(&self) {
        self.stats.clear();
    }
}

/// Change the lifetime of the buffers a request borrows
///
/// The only unsafe code in the crate; `Controller::execute` uses it to
/// queue requests borrowing short-lived buffers.
///
/// # Safety
///
/// Every buffer the request borrows must stay alive, and unaliased, for
/// as long as the returned request is in use.
#[allow(unsafe_code)]
unsafe fn relabel<'a, 'b>(request: Request<'a>) -> Request<'b> {
    // SAFETY: lifetimes do not affect layout; the caller upholds the rest
    unsafe { core::mem::transmute::<Request<'a>, Request<'b>>(request) }
}
