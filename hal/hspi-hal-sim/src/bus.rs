//! Simulated SPI peripheral
//!
//! Implements every `hspi-hal` trait over shared in-memory state, so a
//! test can hand one clone to the controller and inspect another.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use hspi_hal::gpio::PinFunction;
use hspi_hal::regs::{self, Reg};
use hspi_hal::spi::FIFO_SIZE;
use hspi_hal::{CycleCounter, InterruptControl, PinMux, SpiRegisters, SpiUnit, SystemRegisters};

use crate::slave::Slave;
use crate::wire::{collect_bytes, BitStream};

/// Words in one SPI register block
const REG_WORDS: usize = 64;

/// Slave slots, one per chip-select id
const SLAVE_SLOTS: usize = 8;

/// Cycle counter shared by every simulated bus
static CYCLES: AtomicU32 = AtomicU32::new(0);

/// A decoded command or address phase
///
/// `value` holds the bits in the order they were clocked onto the wire,
/// first bit most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub value: u32,
    pub bits: u8,
}

/// Record of one hardware transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burst {
    /// Slave addressed: hardware chip-select line or manual select
    pub chip_select: Option<u8>,
    /// True when a hardware chip-select line framed the burst
    pub hardware_cs: bool,
    pub command: Option<Phase>,
    pub address: Option<Phase>,
    pub dummy_cycles: u32,
    /// Data sent, as stored in the FIFO
    pub mosi: heapless::Vec<u8, FIFO_SIZE>,
    /// Data received, as stored back into the FIFO
    pub miso: heapless::Vec<u8, FIFO_SIZE>,
    /// SPI1 register snapshot
    pub ctrl: u32,
    pub user: u32,
    pub pin: u32,
    pub clock: u32,
    /// SPI0 clock register snapshot
    pub spi0_clock: u32,
    pub io_mux_conf: u32,
    pub host_inf_sel: u32,
}

struct State {
    spi: [[u32; REG_WORDS]; 2],
    fifo: [u8; FIFO_SIZE],
    pins: [PinFunction; 16],
    io_mux_conf: u32,
    host_inf_sel: u32,
    interrupt_enabled: bool,
    slaves: Vec<Option<Box<dyn Slave>>>,
    manual: Option<u8>,
    bursts: Vec<Burst>,
}

fn block(unit: SpiUnit) -> usize {
    match unit {
        SpiUnit::Spi0 => 0,
        SpiUnit::Spi1 => 1,
    }
}

impl State {
    fn reg(&self, unit: SpiUnit, reg: Reg) -> u32 {
        self.spi[block(unit)][reg.offset() / 4]
    }

    fn set_reg(&mut self, unit: SpiUnit, reg: Reg, value: u32) {
        self.spi[block(unit)][reg.offset() / 4] = value;
    }

    fn slave(&mut self, cs: Option<u8>) -> Option<&mut dyn Slave> {
        let slot = self.slaves.get_mut(usize::from(cs?))?;
        match slot {
            Some(slave) => Some(slave.as_mut()),
            None => None,
        }
    }

    /// Execute the burst programmed into SPI1
    fn run_burst(&mut self) {
        let ctrl = self.reg(SpiUnit::Spi1, Reg::Ctrl);
        let user = self.reg(SpiUnit::Spi1, Reg::User);
        let user1 = self.reg(SpiUnit::Spi1, Reg::User1);
        let user2 = self.reg(SpiUnit::Spi1, Reg::User2);
        let addr = self.reg(SpiUnit::Spi1, Reg::Addr);
        let pin = self.reg(SpiUnit::Spi1, Reg::Pin);
        let wr_lsb = ctrl & regs::ctrl::WR_BIT_ORDER != 0;
        let rd_lsb = ctrl & regs::ctrl::RD_BIT_ORDER != 0;

        let hardware_cs = if pin & regs::pin::CS0_DIS == 0 {
            Some(0)
        } else if pin & regs::pin::CS1_DIS == 0 {
            Some(1)
        } else if pin & regs::pin::CS2_DIS == 0 {
            Some(2)
        } else {
            None
        };
        let target = hardware_cs.or(self.manual);

        // Command, address
        let mut head = BitStream::default();
        let mut command = None;
        if user & regs::user::USR_COMMAND != 0 {
            let bits = ((user2 >> regs::user2::COMMAND_BITLEN_SHIFT)
                & regs::user2::COMMAND_BITLEN_MASK)
                + 1;
            let value = user2 & regs::user2::COMMAND_VALUE_MASK;
            let mut stream = BitStream::default();
            if wr_lsb {
                stream.push_lsb(value, bits);
            } else {
                // Low byte leaves first
                let wire = u32::from((value as u16).swap_bytes());
                stream.push_msb(wire >> (16 - bits), bits);
            }
            command = Some(Phase {
                value: stream.value(),
                bits: bits as u8,
            });
            head.append(&stream);
        }
        let mut address = None;
        if user & regs::user::USR_ADDR != 0 {
            let bits =
                ((user1 >> regs::user1::ADDR_BITLEN_SHIFT) & regs::user1::ADDR_BITLEN_MASK) + 1;
            let mut stream = BitStream::default();
            if wr_lsb {
                stream.push_lsb(addr, bits);
            } else {
                stream.push_msb(addr >> (32 - bits), bits);
            }
            address = Some(Phase {
                value: stream.value(),
                bits: bits as u8,
            });
            head.append(&stream);
        }
        let dummy_cycles = if user & regs::user::USR_DUMMY != 0 {
            (user1 & regs::user1::DUMMY_CYCLELEN_MASK) + 1
        } else {
            0
        };

        // Data
        let duplex = user & regs::user::DUPLEX != 0;
        let mut data = BitStream::default();
        let mut mosi = heapless::Vec::new();
        let mut mosi_bits = 0;
        if user & regs::user::USR_MOSI != 0 {
            mosi_bits = ((user1 >> regs::user1::MOSI_BITLEN_SHIFT)
                & regs::user1::DATA_BITLEN_MASK) as usize
                + 1;
            let len = mosi_bits.div_ceil(8).min(FIFO_SIZE);
            for &byte in &self.fifo[..len] {
                data.push_byte(byte, wr_lsb);
                let _ = mosi.push(byte);
            }
            data.truncate(mosi_bits);
        }
        let mut miso_range = 0..0;
        if duplex && mosi_bits != 0 {
            miso_range = 0..mosi_bits;
        } else if user & regs::user::USR_MISO != 0 {
            let miso_bits = ((user1 >> regs::user1::MISO_BITLEN_SHIFT)
                & regs::user1::DATA_BITLEN_MASK) as usize
                + 1;
            miso_range = data.len()..data.len() + miso_bits;
            data.push_msb(0, miso_bits as u32);
        }

        if hardware_cs.is_some() {
            if let Some(slave) = self.slave(target) {
                slave.select();
            }
        }
        head.shift(self.slave(target));
        if dummy_cycles != 0 {
            if let Some(slave) = self.slave(target) {
                slave.dummy(dummy_cycles);
            }
        }
        let received = data.shift(self.slave(target));
        if hardware_cs.is_some() {
            if let Some(slave) = self.slave(target) {
                slave.deselect();
            }
        }

        let mut miso = heapless::Vec::new();
        if !miso_range.is_empty() {
            let bytes = collect_bytes(&received[miso_range], rd_lsb);
            let len = bytes.len().min(FIFO_SIZE);
            self.fifo[..len].copy_from_slice(&bytes[..len]);
            let _ = miso.extend_from_slice(&bytes[..len]);
        }

        self.bursts.push(Burst {
            chip_select: target,
            hardware_cs: hardware_cs.is_some(),
            command,
            address,
            dummy_cycles,
            mosi,
            miso,
            ctrl,
            user,
            pin,
            clock: self.reg(SpiUnit::Spi1, Reg::Clock),
            spi0_clock: self.reg(SpiUnit::Spi0, Reg::Clock),
            io_mux_conf: self.io_mux_conf,
            host_inf_sel: self.host_inf_sel,
        });

        let cmd = self.reg(SpiUnit::Spi1, Reg::Cmd) & !regs::cmd::USR;
        self.set_reg(SpiUnit::Spi1, Reg::Cmd, cmd);
        let slave = self.reg(SpiUnit::Spi1, Reg::Slave) | regs::slave::TRANS_DONE;
        self.set_reg(SpiUnit::Spi1, Reg::Slave, slave);
    }
}

/// Simulated HSPI peripheral
///
/// Cloning yields another handle to the same peripheral.
#[derive(Clone)]
pub struct SimBus {
    state: Arc<Mutex<State>>,
}

impl SimBus {
    pub fn new() -> Self {
        let mut slaves = Vec::with_capacity(SLAVE_SLOTS);
        slaves.resize_with(SLAVE_SLOTS, || None);
        Self {
            state: Arc::new(Mutex::new(State {
                spi: [[0; REG_WORDS]; 2],
                fifo: [0; FIFO_SIZE],
                pins: [PinFunction::Gpio; 16],
                io_mux_conf: 0,
                host_inf_sel: 0,
                interrupt_enabled: false,
                slaves,
                manual: None,
                bursts: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach a slave to chip-select id `cs` (0..=7)
    pub fn attach(&self, cs: u8, slave: impl Slave + 'static) {
        if let Some(slot) = self.lock().slaves.get_mut(usize::from(cs)) {
            *slot = Some(Box::new(slave));
        }
    }

    /// Drive a manual chip-select, as an external decoder would
    pub fn set_manual_select(&self, cs: u8, active: bool) {
        let mut state = self.lock();
        if active {
            state.manual = Some(cs);
            if let Some(slave) = state.slave(Some(cs)) {
                slave.select();
            }
        } else {
            if let Some(slave) = state.slave(Some(cs)) {
                slave.deselect();
            }
            if state.manual == Some(cs) {
                state.manual = None;
            }
        }
    }

    /// Manual chip-select currently asserted
    pub fn manual_select(&self) -> Option<u8> {
        self.lock().manual
    }

    /// True when the SPI interrupt is unmasked and a transaction is done
    pub fn interrupt_pending(&self) -> bool {
        let state = self.lock();
        let slave = state.reg(SpiUnit::Spi1, Reg::Slave);
        state.interrupt_enabled
            && slave & regs::slave::TRANS_DONE != 0
            && slave & regs::slave::TRANS_INTEN != 0
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.lock().interrupt_enabled
    }

    /// Register value without side effects
    pub fn reg(&self, unit: SpiUnit, reg: Reg) -> u32 {
        self.lock().reg(unit, reg)
    }

    pub fn io_mux(&self) -> u32 {
        self.lock().io_mux_conf
    }

    pub fn set_io_mux(&self, value: u32) {
        self.lock().io_mux_conf = value;
    }

    pub fn host_inf(&self) -> u32 {
        self.lock().host_inf_sel
    }

    pub fn pin_function(&self, pin: u8) -> PinFunction {
        self.lock().pins[usize::from(pin) % 16]
    }

    /// All bursts executed so far, oldest first
    pub fn bursts(&self) -> Vec<Burst> {
        self.lock().bursts.clone()
    }

    pub fn burst_count(&self) -> usize {
        self.lock().bursts.len()
    }

    pub fn clear_bursts(&self) {
        self.lock().bursts.clear();
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiRegisters for SimBus {
    fn read_reg(&mut self, unit: SpiUnit, reg: Reg) -> u32 {
        self.lock().reg(unit, reg)
    }

    fn write_reg(&mut self, unit: SpiUnit, reg: Reg, value: u32) {
        let mut state = self.lock();
        match (unit, reg) {
            (SpiUnit::Spi1, Reg::Cmd) if value & regs::cmd::USR != 0 => {
                state.set_reg(unit, reg, value);
                state.run_burst();
            }
            (_, Reg::Slave) if value & regs::slave::SYNC_RESET != 0 => {
                let value = value & !(regs::slave::SYNC_RESET | regs::slave::TRANS_DONE);
                state.set_reg(unit, reg, value);
            }
            _ => state.set_reg(unit, reg, value),
        }
    }

    fn write_fifo(&mut self, data: &[u8]) {
        let mut state = self.lock();
        let len = data.len().min(FIFO_SIZE);
        state.fifo[..len].copy_from_slice(&data[..len]);
        let padded = len.next_multiple_of(4).min(FIFO_SIZE);
        state.fifo[len..padded].fill(0);
    }

    fn read_fifo(&mut self, buf: &mut [u8]) {
        let state = self.lock();
        let len = buf.len().min(FIFO_SIZE);
        buf[..len].copy_from_slice(&state.fifo[..len]);
    }
}

impl PinMux for SimBus {
    fn select_function(&mut self, pin: u8, function: PinFunction) {
        if let Some(slot) = self.lock().pins.get_mut(usize::from(pin)) {
            *slot = function;
        }
    }
}

impl SystemRegisters for SimBus {
    fn io_mux_conf(&mut self) -> u32 {
        self.lock().io_mux_conf
    }

    fn set_io_mux_conf(&mut self, value: u32) {
        self.lock().io_mux_conf = value;
    }

    fn host_inf_sel(&mut self) -> u32 {
        self.lock().host_inf_sel
    }

    fn set_host_inf_sel(&mut self, value: u32) {
        self.lock().host_inf_sel = value;
    }
}

impl InterruptControl for SimBus {
    fn enable_interrupt(&mut self) {
        self.lock().interrupt_enabled = true;
    }

    fn disable_interrupt(&mut self) {
        self.lock().interrupt_enabled = false;
    }

    fn interrupt_status(&mut self) -> u32 {
        let slave = self.lock().reg(SpiUnit::Spi1, Reg::Slave);
        if slave & regs::slave::TRANS_DONE != 0 {
            regs::int_status::SPI1
        } else {
            0
        }
    }
}

impl CycleCounter for SimBus {
    fn cycle_count() -> u32 {
        CYCLES.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slave::{Loopback, Recorder};

    fn start(sim: &mut SimBus) {
        sim.write_reg(SpiUnit::Spi1, Reg::Cmd, regs::cmd::USR);
    }

    #[test]
    fn test_msb_command_and_address_decode() {
        let mut sim = SimBus::new();
        let rec = Recorder::new();
        sim.attach(0, rec.clone());
        sim.write_reg(SpiUnit::Spi1, Reg::Pin, regs::pin::CS1_DIS | regs::pin::CS2_DIS);
        sim.write_reg(
            SpiUnit::Spi1,
            Reg::User,
            regs::user::USR_COMMAND | regs::user::USR_ADDR,
        );
        // Command 0x02 over 8 bits, address 0x123456 over 24 bits, MSB first
        sim.write_reg(SpiUnit::Spi1, Reg::User2, (7 << 28) | 0x0002);
        sim.write_reg(SpiUnit::Spi1, Reg::User1, 23 << 26);
        sim.write_reg(SpiUnit::Spi1, Reg::Addr, 0x0012_3456 << 8);
        start(&mut sim);

        let burst = &sim.bursts()[0];
        assert_eq!(burst.command, Some(Phase { value: 0x02, bits: 8 }));
        assert_eq!(
            burst.address,
            Some(Phase {
                value: 0x12_3456,
                bits: 24
            })
        );
        assert_eq!(rec.frames()[0].bytes, vec![0x02, 0x12, 0x34, 0x56]);
        assert_eq!(sim.interrupt_status(), regs::int_status::SPI1);
    }

    #[test]
    fn test_duplex_loopback() {
        let mut sim = SimBus::new();
        sim.attach(1, Loopback);
        sim.write_reg(SpiUnit::Spi1, Reg::Pin, regs::pin::CS0_DIS | regs::pin::CS2_DIS);
        sim.write_reg(
            SpiUnit::Spi1,
            Reg::User,
            regs::user::USR_MOSI | regs::user::DUPLEX,
        );
        sim.write_reg(SpiUnit::Spi1, Reg::User1, 23 << 17);
        sim.write_fifo(&[0xA5, 0x5A, 0xFF]);
        start(&mut sim);

        let mut buf = [0u8; 3];
        sim.read_fifo(&mut buf);
        assert_eq!(buf, [0xA5, 0x5A, 0xFF]);
        assert_eq!(sim.bursts()[0].chip_select, Some(1));
    }

    #[test]
    fn test_transaction_done_and_reset() {
        let mut sim = SimBus::new();
        sim.enable_interrupt();
        sim.write_reg(SpiUnit::Spi1, Reg::Slave, regs::slave::TRANS_INTEN);
        start(&mut sim);
        assert!(sim.interrupt_pending());
        assert_eq!(sim.read_reg(SpiUnit::Spi1, Reg::Cmd) & regs::cmd::USR, 0);
        sim.clear_bits(SpiUnit::Spi1, Reg::Slave, regs::slave::TRANS_DONE);
        assert!(!sim.interrupt_pending());
    }

    #[test]
    fn test_fifo_pads_partial_word() {
        let mut sim = SimBus::new();
        sim.write_fifo(&[0xFF; 8]);
        sim.write_fifo(&[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 8];
        sim.read_fifo(&mut buf);
        assert_eq!(buf, [1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn test_pin_mux() {
        let mut sim = SimBus::new();
        sim.select_function(14, PinFunction::Hspi);
        assert_eq!(sim.pin_function(14), PinFunction::Hspi);
        assert_eq!(sim.pin_function(12), PinFunction::Gpio);
    }
}
