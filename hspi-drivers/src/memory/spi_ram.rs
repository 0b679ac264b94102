//! IS62/65WVS2568 serial SRAM
//!
//! 256 KiB of SRAM with SPI, SDI (dual) and SQI (quad) interfaces. The
//! interface mode is switched with EDIO/EQIO and left with RSTIO; the
//! mode register selects byte, page or sequential access.

use core::cell::Cell;

use critical_section::Mutex;
use hspi_core::{
    BitOrder, ClockMode, ConfigError, Controller, Device, DeviceBase, DeviceId, ExecuteError,
    IoMode, PinSet, Rejected, Request,
};
use hspi_hal::Hardware;

use super::MemoryDevice;

/// Instruction set
mod op {
    pub const WRMR: u8 = 0x01;
    pub const WRITE: u8 = 0x02;
    pub const READ: u8 = 0x03;
    pub const RDMR: u8 = 0x05;
    pub const EQIO: u8 = 0x38;
    pub const EDIO: u8 = 0x3B;
    pub const RSTIO: u8 = 0xFF;
}

/// Clock used by [`SpiRam::begin`]
pub const DEFAULT_SPEED: u32 = 40_000_000;

/// Access mode held in the mode register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// One byte per access
    Byte = 0x00,
    /// Address wraps within a 32-byte page
    Page = 0x80,
    /// Address runs through the whole array
    Sequential = 0x40,
}

impl Mode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Mode::Byte),
            0x80 => Some(Mode::Page),
            0x40 => Some(Mode::Sequential),
            _ => None,
        }
    }
}

/// Serial RAM errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiRamError {
    /// Registration with the controller failed
    Config(ConfigError),
    /// A request could not be submitted
    Execute(ExecuteError),
    /// The chip or the pin set does not support the I/O mode
    UnsupportedIoMode,
    /// Mode register read back a reserved value
    InvalidMode(u8),
}

impl From<ConfigError> for SpiRamError {
    fn from(e: ConfigError) -> Self {
        SpiRamError::Config(e)
    }
}

impl From<ExecuteError> for SpiRamError {
    fn from(e: ExecuteError) -> Self {
        SpiRamError::Execute(e)
    }
}

/// IS62/65WVS2568 driver
pub struct SpiRam {
    base: DeviceBase,
    mode: Mutex<Cell<Mode>>,
}

impl SpiRam {
    /// Capacity in bytes
    pub const SIZE: usize = 256 * 1024;

    pub const fn new() -> Self {
        Self {
            base: DeviceBase::new(),
            mode: Mutex::new(Cell::new(Mode::Sequential)),
        }
    }

    /// Register on the bus and bring the chip into a known state
    ///
    /// The chip may be left in SDI or SQI mode by an earlier session, so
    /// RSTIO is sent in every mode the pins can carry. The RAM ends up in
    /// sequential mode, using the widest interface the pin set supports.
    pub fn begin<'d, H: Hardware>(
        &'d self,
        controller: &Controller<'d, H>,
        pin_set: PinSet,
        chip_select: u8,
    ) -> Result<(), SpiRamError> {
        controller.start_device(self, pin_set, chip_select, DEFAULT_SPEED)?;
        self.base.set_bit_order(controller, BitOrder::MsbFirst);
        self.base.set_clock_mode(controller, ClockMode::Mode0);

        let quad = IoMode::Sqi.is_supported_by(pin_set);
        let id = self.device_id()?;
        let reset_modes: &[IoMode] = if quad {
            &[IoMode::Sqi, IoMode::Sdi]
        } else {
            &[IoMode::Sdi]
        };
        for &mode in reset_modes {
            self.apply_io_mode(controller, mode)?;
            controller.execute(Request::new(id).out8(op::RSTIO)).map_err(Rejected::into_error)?;
        }
        self.apply_io_mode(controller, IoMode::SpiHd)?;

        let _mode = self.read_mode(controller)?;
        #[cfg(feature = "defmt")]
        defmt::info!("SPI RAM on cs {}: RDMR = {}", chip_select, _mode);

        self.write_mode(controller, Mode::Sequential)?;
        self.set_io_mode(controller, if quad { IoMode::Sqi } else { IoMode::Sdi })?;
        Ok(())
    }

    /// Leave the bus
    pub fn end<H: Hardware>(&self, controller: &Controller<'_, H>) {
        if let Some(id) = self.base.id() {
            controller.stop_device(id);
        }
    }

    /// Switch the chip and the device between SPI, SDI and SQI
    ///
    /// Returns the previous mode.
    pub fn set_io_mode<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        mode: IoMode,
    ) -> Result<IoMode, SpiRamError> {
        let old = self.io_mode();
        if old == mode {
            return Ok(old);
        }
        if !matches!(mode, IoMode::SpiHd | IoMode::Sdi | IoMode::Sqi)
            || !mode.is_supported_by(self.pin_set())
        {
            #[cfg(feature = "defmt")]
            defmt::warn!("SPI RAM: I/O mode {} not supported", mode);
            return Err(SpiRamError::UnsupportedIoMode);
        }

        let id = self.device_id()?;
        if old != IoMode::SpiHd {
            controller.execute(Request::new(id).out8(op::RSTIO)).map_err(Rejected::into_error)?;
            self.apply_io_mode(controller, IoMode::SpiHd)?;
        }
        if mode != IoMode::SpiHd {
            let enter = if mode == IoMode::Sdi { op::EDIO } else { op::EQIO };
            controller.execute(Request::new(id).out8(enter)).map_err(Rejected::into_error)?;
            self.apply_io_mode(controller, mode)?;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("SPI RAM: I/O mode {} -> {}", old, mode);
        Ok(old)
    }

    /// Switch the controller side only, without commanding the chip
    fn apply_io_mode<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        mode: IoMode,
    ) -> Result<(), SpiRamError> {
        if self.base.set_io_mode(controller, mode) {
            Ok(())
        } else {
            Err(SpiRamError::UnsupportedIoMode)
        }
    }

    /// Program the mode register (WRMR)
    pub fn write_mode<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        mode: Mode,
    ) -> Result<(), SpiRamError> {
        let saved = self.set_io_mode(controller, IoMode::SpiHd)?;
        let request = Request::new(self.device_id()?)
            .command8(op::WRMR)
            .out8(mode as u8);
        controller.execute(request).map_err(Rejected::into_error)?;
        critical_section::with(|cs| self.mode.borrow(cs).set(mode));

        #[cfg(feature = "defmt")]
        defmt::info!("SPI RAM: WRMR {}", mode);

        self.set_io_mode(controller, saved)?;
        Ok(())
    }

    /// Read back the mode register (RDMR)
    pub fn read_mode<H: Hardware>(&self, controller: &Controller<'_, H>) -> Result<Mode, SpiRamError> {
        let saved = self.set_io_mode(controller, IoMode::SpiHd)?;
        let request = Request::new(self.device_id()?).command8(op::RDMR).in8();
        let value = controller.execute(request).map_err(Rejected::into_error)?.read_value() as u8;
        self.set_io_mode(controller, saved)?;

        let mode = Mode::from_u8(value).ok_or(SpiRamError::InvalidMode(value))?;
        critical_section::with(|cs| self.mode.borrow(cs).set(mode));
        Ok(mode)
    }

    /// Mode last written or read
    pub fn mode(&self) -> Mode {
        critical_section::with(|cs| self.mode.borrow(cs).get())
    }
}

impl Default for SpiRam {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for SpiRam {
    fn base(&self) -> &DeviceBase {
        &self.base
    }
}

impl MemoryDevice for SpiRam {
    fn size(&self) -> usize {
        Self::SIZE
    }

    fn prepare_write<'b>(&self, id: DeviceId, address: u32) -> Request<'b> {
        Request::new(id).command8(op::WRITE).address24(address)
    }

    fn prepare_read<'b>(&self, id: DeviceId, address: u32) -> Request<'b> {
        // One dummy byte
        let dummy = 8 / self.io_mode().bits_per_clock();
        Request::new(id)
            .command8(op::READ)
            .address24(address)
            .dummy(dummy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hspi_core::InData;
    use hspi_hal_sim::{RamIo, SimBus, SpiRamModel};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn with_interrupts<R>(
        sim: &SimBus,
        controller: &Controller<'_, SimBus>,
        f: impl FnOnce() -> R,
    ) -> R {
        let stop = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                while !stop.load(Ordering::Acquire) {
                    if sim.interrupt_pending() {
                        controller.on_interrupt();
                    } else {
                        std::thread::yield_now();
                    }
                }
            });
            let result = f();
            stop.store(true, Ordering::Release);
            result
        })
    }

    #[test]
    fn test_mode_from_u8() {
        assert_eq!(Mode::from_u8(0x40), Some(Mode::Sequential));
        assert_eq!(Mode::from_u8(0x80), Some(Mode::Page));
        assert_eq!(Mode::from_u8(0x00), Some(Mode::Byte));
        assert_eq!(Mode::from_u8(0xC0), None);
    }

    #[test]
    fn test_begin_on_normal_pins() {
        let ram = SpiRam::new();
        let sim = SimBus::new();
        let model = SpiRamModel::new();
        sim.attach(0, model.clone());
        let controller = Controller::new(sim.clone());
        controller.begin();

        with_interrupts(&sim, &controller, || ram.begin(&controller, PinSet::Normal, 0)).unwrap();

        assert_eq!(ram.io_mode(), IoMode::Sdi);
        assert_eq!(model.io(), RamIo::Sdi);
        assert_eq!(model.mode(), 0x40);
        assert_eq!(ram.mode(), Mode::Sequential);
        assert_eq!(ram.clock_speed(), DEFAULT_SPEED);
        assert_eq!(ram.bit_order(), BitOrder::MsbFirst);

        // No quad reset on pins that cannot carry it
        let first = &sim.bursts()[0];
        assert_eq!(first.mosi.as_slice(), &[op::RSTIO]);
        assert_eq!(sim.bursts()[1].command.map(|c| c.value), Some(u32::from(op::RDMR)));
    }

    #[test]
    fn test_begin_on_overlap_pins_uses_quad() {
        let ram = SpiRam::new();
        let sim = SimBus::new();
        let model = SpiRamModel::new();
        sim.attach(1, model.clone());
        let controller = Controller::new(sim.clone());
        controller.begin();

        with_interrupts(&sim, &controller, || ram.begin(&controller, PinSet::Overlap, 1)).unwrap();

        assert_eq!(ram.io_mode(), IoMode::Sqi);
        assert_eq!(model.io(), RamIo::Sqi);
        let resets = sim
            .bursts()
            .iter()
            .take_while(|b| b.command.is_none())
            .count();
        assert_eq!(resets, 2);
    }

    #[test]
    fn test_memory_round_trip() {
        let ram = SpiRam::new();
        let sim = SimBus::new();
        let model = SpiRamModel::new();
        sim.attach(2, model.clone());
        let controller = Controller::new(sim.clone());
        controller.begin();

        let data: Vec<u8> = (0..150u32).map(|i| (i ^ 0x55) as u8).collect();
        let mut buf = vec![0u8; 150];
        let (word, byte, half) = with_interrupts(&sim, &controller, || {
            ram.begin(&controller, PinSet::Normal, 2).unwrap();
            ram.write(&controller, 0x3_0000, &data).unwrap();
            ram.read(&controller, 0x3_0000, &mut buf).unwrap();
            ram.write32(&controller, 0x10, 0xDEAD_BEEF).unwrap();
            ram.write8(&controller, 0x20, 0x7E).unwrap();
            ram.write16(&controller, 0x30, 0x1234).unwrap();
            (
                ram.read32(&controller, 0x10).unwrap(),
                ram.read8(&controller, 0x20).unwrap(),
                ram.read16(&controller, 0x30).unwrap(),
            )
        });

        assert_eq!(buf, data);
        assert_eq!(model.peek(0x3_0000, 150), data);
        assert_eq!(model.peek(0x10, 4), [0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(word, 0xDEAD_BEEF);
        assert_eq!(byte, 0x7E);
        assert_eq!(half, 0x1234);
        assert_eq!(ram.size(), SpiRam::SIZE);

        // Dual reads carry one dummy byte at two bits per clock
        let read = sim
            .bursts()
            .into_iter()
            .rev()
            .find(|b| b.command.map(|c| c.value) == Some(u32::from(op::READ)))
            .unwrap();
        assert_eq!(read.dummy_cycles, 4);
    }

    #[test]
    fn test_async_write_then_read() {
        static DATA: [u8; 70] = [0xC3; 70];

        let mut buf = [0u8; 70];
        let ram = SpiRam::new();
        let sim = SimBus::new();
        let model = SpiRamModel::new();
        sim.attach(0, model.clone());
        let controller = Controller::new(sim.clone());
        controller.begin();
        with_interrupts(&sim, &controller, || ram.begin(&controller, PinSet::Normal, 0)).unwrap();

        let write = ram
            .write_async(&controller, 0x500, &DATA, None, 0)
            .unwrap();
        let read = ram
            .read_async(&controller, 0x500, &mut buf, None, 0)
            .unwrap();
        assert!(!controller.is_complete(&read));
        while sim.interrupt_pending() {
            controller.on_interrupt();
        }
        assert!(controller.is_complete(&write));
        drop(controller.wait(write));
        assert_eq!(model.peek(0x500, 70), DATA);

        let request = controller.wait(read);
        match &request.input {
            InData::Slice(data) => assert_eq!(&data[..], &DATA[..]),
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_device() {
        let ram = SpiRam::new();
        let sim = SimBus::new();
        let controller: Controller<'_, SimBus> = Controller::new(sim);
        assert_eq!(
            ram.write8(&controller, 0, 1),
            Err(ExecuteError::UnknownDevice)
        );
        assert_eq!(
            ram.set_io_mode(&controller, IoMode::Dual),
            Err(SpiRamError::UnsupportedIoMode)
        );
    }

    #[test]
    fn test_refused_io_mode_is_reported() {
        let ram = SpiRam::new();
        let sim = SimBus::new();
        sim.attach(0, SpiRamModel::new());
        let controller = Controller::new(sim.clone());
        controller.begin();
        with_interrupts(&sim, &controller, || ram.begin(&controller, PinSet::Normal, 0)).unwrap();
        let bursts = sim.burst_count();

        assert_eq!(
            ram.apply_io_mode(&controller, IoMode::Sqi),
            Err(SpiRamError::UnsupportedIoMode)
        );
        assert_eq!(ram.io_mode(), IoMode::Sdi);
        assert_eq!(sim.burst_count(), bursts);
    }
}
