//! Transaction engine
//!
//! Owns all state shared between the submission path and the interrupt
//! handler. Every method runs inside the controller's critical section.
//!
//! A request is carried out as a series of bursts of at most one FIFO
//! each. The interrupt raised at the end of a burst collects inbound
//! data, then either programs the next burst or retires the request and
//! starts the next one in the chain.

use hspi_hal::regs::{self, Reg};
use hspi_hal::spi::FIFO_SIZE;
use hspi_hal::{Hardware, SpiUnit};

use crate::bus::pins::HARDWARE_CS_COUNT;
use crate::bus::{ClockMux, DeviceRegisters, PinManager};
use crate::config::{BitOrder, DeviceSettings, PinSet};
use crate::controller::stats::StatCounters;
use crate::device::{Device, DeviceId, SelectDevice};
use crate::transfer::{InData, Queue, Request};
use crate::MAX_DEVICES;

/// A registered device and its cached registers
pub(crate) struct DeviceEntry<'d> {
    pub device: &'d dyn Device,
    /// Pin set claimed at registration
    pub pin_set: PinSet,
    pub registers: DeviceRegisters,
    /// Settings changed since `registers` was built
    pub dirty: bool,
}

impl DeviceEntry<'_> {
    fn settings(&self) -> DeviceSettings {
        DeviceSettings {
            pin_set: self.device.pin_set(),
            chip_select: self.device.chip_select(),
            clock_speed: self.device.clock_speed(),
            bit_order: self.device.bit_order(),
            clock_mode: self.device.clock_mode(),
            io_mode: self.device.io_mode(),
        }
    }

    /// Registers for the device, rebuilt if stale
    fn registers(&mut self) -> &DeviceRegisters {
        if self.dirty {
            self.registers = DeviceRegisters::build(&self.settings());
            self.dirty = false;
        }
        &self.registers
    }
}

/// Progress through the request in flight
#[derive(Debug, Clone, Copy, Default)]
struct Transfer {
    /// Offset added to the request address
    addr_offset: u32,
    out_offset: usize,
    in_offset: usize,
    /// Bytes the last burst received
    in_len: usize,
    /// Bytes the last burst clocked
    burst_len: usize,
    /// At least one burst issued
    started: bool,
    /// Device user word without phase enables
    user: u32,
    bit_order: BitOrder,
    /// Software chip-select held for the whole request
    manual_cs: Option<u8>,
}

/// A request retired by the interrupt path, awaiting its callbacks
pub(crate) struct Finished<'d> {
    pub index: u8,
    pub request: Request<'d>,
    pub device: Option<&'d dyn Device>,
}

pub(crate) struct Engine<'d, H> {
    pub hw: H,
    pub queue: Queue<'d>,
    pub pins: PinManager,
    pub mux: ClockMux,
    pub devices: [Option<DeviceEntry<'d>>; MAX_DEVICES],
    pub select: Option<&'d dyn SelectDevice>,
    pub active_device: Option<DeviceId>,
    /// A request is on the wire
    pub busy: bool,
    pub begun: bool,
    pub normal_devices: u8,
    pub overlap_devices: u8,
    trans: Transfer,
    /// Slots completed without reaching the wire, one bit per slot
    orphans: u8,
}

impl<'d, H: Hardware> Engine<'d, H> {
    pub fn new(hw: H) -> Self {
        Self {
            hw,
            queue: Queue::new(),
            pins: PinManager::new(),
            mux: ClockMux::new(),
            devices: core::array::from_fn(|_| None),
            select: None,
            active_device: None,
            busy: false,
            begun: false,
            normal_devices: 0,
            overlap_devices: 0,
            trans: Transfer::default(),
            orphans: 0,
        }
    }

    pub fn is_registered(&self, id: DeviceId) -> bool {
        self.devices.get(id.index()).is_some_and(Option::is_some)
    }

    /// Whether the device has requests queued or on the wire
    pub fn has_pending(&self, id: DeviceId) -> bool {
        self.queue.has_device(id)
    }

    /// Start the request at the head of the chain
    ///
    /// Requests whose device has been stopped are completed unsent and
    /// reported through [`Engine::take_orphans`].
    pub fn start_transaction(&mut self) {
        let id = loop {
            let Some(index) = self.queue.head() else {
                self.mux.restore(&mut self.hw);
                self.active_device = None;
                return;
            };
            let Some(id) = self.queue.get(index).map(Request::device) else {
                return;
            };
            if self.is_registered(id) {
                break id;
            }
            if let Some((index, request)) = self.queue.pop_front() {
                self.queue.complete(index, request);
                self.orphans |= 1 << index;
            }
        };
        let Some(entry) = self.devices.get_mut(id.index()).and_then(Option::as_mut) else {
            return;
        };

        let cs = id.chip_select();
        let registers = *entry.registers();
        if self.active_device != Some(id) {
            self.pins.configure(&mut self.hw, registers.pin_set);
            self.pins.configure_chip_select(&mut self.hw, cs);
            registers.load(&mut self.hw, &mut self.mux);
            self.active_device = Some(id);
        }

        self.trans = Transfer {
            user: registers.user,
            bit_order: registers.bit_order,
            manual_cs: (cs >= HARDWARE_CS_COUNT).then_some(cs),
            ..Transfer::default()
        };
        self.busy = true;

        if let (Some(cs), Some(select)) = (self.trans.manual_cs, self.select) {
            select.select(cs, true);
        }
        self.next_burst();
    }

    /// Handle the end of a burst
    ///
    /// Returns the request if it is now complete. The caller runs its
    /// callbacks and then calls [`Engine::retire`].
    pub fn advance(&mut self, stats: &StatCounters) -> Option<Finished<'d>> {
        if !self.busy {
            return None;
        }
        stats.burst_done();
        let index = self.queue.head()?;

        if self.trans.in_len != 0 {
            let (offset, len) = (self.trans.in_offset, self.trans.in_len);
            if let Some(request) = self.queue.get_mut(index) {
                if matches!(request.input, InData::Inline { .. }) {
                    let word = self.hw.read_fifo_word();
                    request.input.store_word(word);
                } else if let Some(window) = request.input.window(offset, len) {
                    self.hw.read_fifo(window);
                }
            }
            self.trans.in_offset += len;
            self.trans.in_len = 0;
        }

        let request = self.queue.get(index)?;
        let complete = self.trans.started
            && self.trans.out_offset >= request.out.len()
            && self.trans.in_offset >= request.input.len();
        if !complete {
            self.next_burst();
            return None;
        }

        let (index, request) = self.queue.pop_front()?;
        self.busy = false;
        if let (Some(cs), Some(select)) = (self.trans.manual_cs, self.select) {
            select.select(cs, false);
        }
        let device = self
            .devices
            .get(request.device().index())
            .and_then(Option::as_ref)
            .map(|entry| entry.device);
        Some(Finished {
            index,
            request,
            device,
        })
    }

    /// Slots completed by [`Engine::start_transaction`] since the last call
    pub fn take_orphans(&mut self) -> u8 {
        core::mem::take(&mut self.orphans)
    }

    /// Remove a device unless it still has requests queued or on the wire
    ///
    /// `None` while requests are pending, otherwise the entry, if any.
    pub fn remove_device(&mut self, id: DeviceId) -> Option<Option<DeviceEntry<'d>>> {
        if self.has_pending(id) {
            return None;
        }
        let Some(slot) = self.devices.get_mut(id.index()) else {
            return Some(None);
        };
        let entry = slot.take();
        if let Some(entry) = &entry {
            self.pins.release(id.chip_select());
            match entry.pin_set {
                PinSet::Normal => self.normal_devices -= 1,
                PinSet::Overlap => self.overlap_devices -= 1,
                PinSet::None => {}
            }
            if self.active_device == Some(id) {
                self.active_device = None;
            }
        }
        Some(entry)
    }

    /// Put a finished request back after its callbacks ran, then move on
    ///
    /// A callback may already have started a new request; it is left
    /// alone.
    pub fn retire(&mut self, index: u8, request: Request<'d>) {
        self.queue.complete(index, request);
        if !self.busy {
            self.start_transaction();
        }
    }

    /// Program and trigger the next burst of the request in flight
    fn next_burst(&mut self) {
        let Some(request) = self.queue.head().and_then(|index| self.queue.get(index)) else {
            return;
        };
        let trans = &mut self.trans;

        if trans.started {
            trans.addr_offset = trans.addr_offset.wrapping_add(trans.burst_len as u32);
        }
        let out_len = request
            .out
            .len()
            .saturating_sub(trans.out_offset)
            .min(FIFO_SIZE);
        let in_len = request
            .input
            .len()
            .saturating_sub(trans.in_offset)
            .min(FIFO_SIZE);

        // Hardware chip-selects frame every burst, so the phases go out
        // each time; a manual chip-select frames the whole request.
        let phases = !trans.started || trans.manual_cs.is_none();
        let msb_first = trans.bit_order == BitOrder::MsbFirst;
        let duplex = trans.user & regs::user::DUPLEX != 0;

        let mut user = trans.user;
        let mut user1 = 0;
        let mut user2 = 0;
        let mut addr = 0;

        if phases && request.command.bits != 0 {
            let bits = u32::from(request.command.bits);
            let mut value = u32::from(request.command.value);
            if msb_first {
                // Command shifts out low byte first
                value = u32::from(((value << (16 - bits)) as u16).swap_bytes());
            }
            user |= regs::user::USR_COMMAND;
            user2 = ((bits - 1) << regs::user2::COMMAND_BITLEN_SHIFT)
                | (value & regs::user2::COMMAND_VALUE_MASK);
        }

        if phases && request.address.bits != 0 {
            let bits = u32::from(request.address.bits);
            addr = request.address.value.wrapping_add(trans.addr_offset);
            if msb_first {
                addr <<= 32 - bits;
            }
            user |= regs::user::USR_ADDR;
            user1 |= (bits - 1) << regs::user1::ADDR_BITLEN_SHIFT;
        }

        if phases && request.dummy_len != 0 {
            user |= regs::user::USR_DUMMY;
            user1 |= u32::from(request.dummy_len - 1) & regs::user1::DUMMY_CYCLELEN_MASK;
        }

        // Full duplex reads during the MOSI phase, which then spans both
        let mosi_len = if duplex { out_len.max(in_len) } else { out_len };
        if mosi_len != 0 {
            user |= regs::user::USR_MOSI;
            user1 |= ((mosi_len * 8 - 1) as u32) << regs::user1::MOSI_BITLEN_SHIFT;

            let mut buf = [0u8; FIFO_SIZE];
            request.out.copy_to(trans.out_offset, &mut buf[..out_len]);
            self.hw.write_fifo(&buf[..mosi_len]);
        }
        if !duplex && in_len != 0 {
            user |= regs::user::USR_MISO;
            user1 |= ((in_len * 8 - 1) as u32) << regs::user1::MISO_BITLEN_SHIFT;
        }

        trans.out_offset += out_len;
        trans.in_len = in_len;
        trans.burst_len = out_len.max(in_len);
        trans.started = true;

        self.hw.write_reg(SpiUnit::Spi1, Reg::Addr, addr);
        self.hw.write_reg(SpiUnit::Spi1, Reg::User, user);
        self.hw.write_reg(SpiUnit::Spi1, Reg::User1, user1);
        self.hw.write_reg(SpiUnit::Spi1, Reg::User2, user2);
        self.hw.write_reg(SpiUnit::Spi1, Reg::Cmd, regs::cmd::USR);
    }

    /// Bring SPI1 into master mode with only the completion interrupt
    pub fn reset_peripheral(&mut self) {
        self.hw
            .clear_bits(SpiUnit::Spi0, Reg::Slave, regs::slave::INT_MASK);
        let slave = self.hw.read_reg(SpiUnit::Spi1, Reg::Slave);
        let slave = (slave & !(regs::slave::INT_MASK | regs::slave::SLAVE_MODE))
            | regs::slave::TRANS_INTEN
            | regs::slave::SYNC_RESET;
        self.hw.write_reg(SpiUnit::Spi1, Reg::Slave, slave);
    }

    /// Return pins and chip-selects to GPIO
    pub fn release_bus(&mut self) {
        self.pins.configure(&mut self.hw, PinSet::None);
        self.hw
            .set_bits(SpiUnit::Spi1, Reg::Pin, regs::pin::CS_DIS_ALL);
        self.pins.release_chip_selects(&mut self.hw);
        self.mux.restore(&mut self.hw);
        self.active_device = None;
    }
}
