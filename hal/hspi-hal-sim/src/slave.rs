//! Slave device models
//!
//! Models are cheap handles over shared state: attach a clone to the
//! [`crate::SimBus`] and keep one in the test to inspect the result.

use std::sync::{Arc, Mutex, MutexGuard};

/// A device on the simulated bus
///
/// Bytes are exchanged in wire order: the first bit clocked is the most
/// significant bit of the byte.
pub trait Slave: Send {
    /// Chip-select asserted
    fn select(&mut self) {}

    /// Chip-select released
    fn deselect(&mut self) {}

    /// Shift one byte out on MOSI, returning the byte shifted in on MISO
    fn exchange(&mut self, mosi: u8) -> u8;

    /// Dummy clock cycles between address and data
    fn dummy(&mut self, _cycles: u32) {}
}

fn lock<T>(inner: &Mutex<T>) -> MutexGuard<'_, T> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

/// MISO wired straight back to MOSI
#[derive(Debug, Clone, Copy, Default)]
pub struct Loopback;

impl Slave for Loopback {
    fn exchange(&mut self, mosi: u8) -> u8 {
        mosi
    }
}

/// Everything clocked while one chip-select assertion was held
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Bytes received on MOSI
    pub bytes: Vec<u8>,
    /// Dummy cycles, summed over the frame
    pub dummy_cycles: u32,
}

/// Records chip-select frames, answering every byte with `0xFF`
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames recorded so far, the last one possibly still open
    pub fn frames(&self) -> Vec<Frame> {
        lock(&self.frames).clone()
    }

    pub fn clear(&self) {
        lock(&self.frames).clear();
    }
}

impl Slave for Recorder {
    fn select(&mut self) {
        lock(&self.frames).push(Frame::default());
    }

    fn exchange(&mut self, mosi: u8) -> u8 {
        let mut frames = lock(&self.frames);
        if frames.is_empty() {
            frames.push(Frame::default());
        }
        if let Some(frame) = frames.last_mut() {
            frame.bytes.push(mosi);
        }
        0xFF
    }

    fn dummy(&mut self, cycles: u32) {
        if let Some(frame) = lock(&self.frames).last_mut() {
            frame.dummy_cycles += cycles;
        }
    }
}

/// Serial RAM interface mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamIo {
    /// Single line
    Spi,
    /// Dual line (EDIO)
    Sdi,
    /// Quad line (EQIO)
    Sqi,
}

/// Serial RAM command set
mod op {
    pub const WRMR: u8 = 0x01;
    pub const WRITE: u8 = 0x02;
    pub const READ: u8 = 0x03;
    pub const RDMR: u8 = 0x05;
    pub const EQIO: u8 = 0x38;
    pub const EDIO: u8 = 0x3B;
    pub const RSTIO: u8 = 0xFF;
}

/// Mode register values
mod mode {
    pub const BYTE: u8 = 0x00;
    pub const PAGE: u8 = 0x80;
    pub const MASK: u8 = 0xC0;
}

const PAGE_SIZE: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RamState {
    Command,
    Address { command: u8, count: u8 },
    Write,
    Read,
    WriteMode,
    ReadMode,
    Ignore,
}

#[derive(Debug)]
struct Ram {
    mem: Vec<u8>,
    mode: u8,
    io: RamIo,
    state: RamState,
    address: u32,
    accessed: bool,
}

impl Ram {
    fn data_byte(&mut self, mosi: u8, write: bool) -> u8 {
        if self.mode & mode::MASK == mode::BYTE && self.accessed {
            self.state = RamState::Ignore;
            return 0xFF;
        }
        let index = self.address as usize % self.mem.len();
        let value = self.mem[index];
        if write {
            self.mem[index] = mosi;
        }
        self.accessed = true;
        self.address = if self.mode & mode::MASK == mode::PAGE {
            (self.address & !(PAGE_SIZE - 1)) | ((self.address + 1) & (PAGE_SIZE - 1))
        } else {
            self.address.wrapping_add(1)
        };
        value
    }
}

/// IS62/65WVS2568 serial SRAM
///
/// Implements the byte-level command set: WRITE (0x02), READ (0x03),
/// WRMR (0x01), RDMR (0x05) and the interface mode commands EDIO (0x3B),
/// EQIO (0x38) and RSTIO (0xFF). Address bytes follow the command most
/// significant first. Dummy cycles are accepted and ignored.
#[derive(Debug, Clone)]
pub struct SpiRamModel {
    inner: Arc<Mutex<Ram>>,
}

impl SpiRamModel {
    /// Memory size in bytes
    pub const SIZE: usize = 256 * 1024;

    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ram {
                mem: vec![0; Self::SIZE],
                mode: 0x40,
                io: RamIo::Spi,
                state: RamState::Command,
                address: 0,
                accessed: false,
            })),
        }
    }

    /// Copy memory contents starting at `address`
    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        let ram = lock(&self.inner);
        (0..len)
            .map(|i| ram.mem[(address as usize + i) % ram.mem.len()])
            .collect()
    }

    /// Overwrite memory contents starting at `address`
    pub fn poke(&self, address: u32, data: &[u8]) {
        let mut ram = lock(&self.inner);
        let size = ram.mem.len();
        for (i, &byte) in data.iter().enumerate() {
            ram.mem[(address as usize + i) % size] = byte;
        }
    }

    /// Current mode register value
    pub fn mode(&self) -> u8 {
        lock(&self.inner).mode
    }

    /// Current interface mode
    pub fn io(&self) -> RamIo {
        lock(&self.inner).io
    }
}

impl Default for SpiRamModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Slave for SpiRamModel {
    fn select(&mut self) {
        let mut ram = lock(&self.inner);
        ram.state = RamState::Command;
        ram.accessed = false;
    }

    fn deselect(&mut self) {
        lock(&self.inner).state = RamState::Command;
    }

    fn exchange(&mut self, mosi: u8) -> u8 {
        let mut ram = lock(&self.inner);
        match ram.state {
            RamState::Command => {
                ram.state = match mosi {
                    op::WRITE | op::READ => {
                        ram.address = 0;
                        RamState::Address { command: mosi, count: 0 }
                    }
                    op::WRMR => RamState::WriteMode,
                    op::RDMR => RamState::ReadMode,
                    op::EQIO => {
                        ram.io = RamIo::Sqi;
                        RamState::Ignore
                    }
                    op::EDIO => {
                        ram.io = RamIo::Sdi;
                        RamState::Ignore
                    }
                    op::RSTIO => {
                        ram.io = RamIo::Spi;
                        RamState::Ignore
                    }
                    _ => RamState::Ignore,
                };
                0xFF
            }
            RamState::Address { command, count } => {
                ram.address = (ram.address << 8) | u32::from(mosi);
                ram.state = if count < 2 {
                    RamState::Address {
                        command,
                        count: count + 1,
                    }
                } else if command == op::WRITE {
                    RamState::Write
                } else {
                    RamState::Read
                };
                0xFF
            }
            RamState::Write => {
                ram.data_byte(mosi, true);
                0xFF
            }
            RamState::Read => ram.data_byte(mosi, false),
            RamState::WriteMode => {
                ram.mode = mosi & mode::MASK;
                ram.state = RamState::Ignore;
                0xFF
            }
            RamState::ReadMode => ram.mode,
            RamState::Ignore => 0xFF,
        }
    }
}
