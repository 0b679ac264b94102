//! Addressable memory devices
//!
//! A memory device only describes how a read or write request starts
//! (command, address, dummy cycles). The transfer helpers are provided.

pub mod spi_ram;

pub use spi_ram::{Mode, SpiRam, SpiRamError};

use hspi_core::{Callback, Controller, Device, DeviceId, ExecuteError, Request, Ticket};
use hspi_hal::Hardware;

/// Read/write addressable device
pub trait MemoryDevice: Device {
    /// Capacity in bytes
    fn size(&self) -> usize;

    /// Request header for a write at `address`
    fn prepare_write<'b>(&self, id: DeviceId, address: u32) -> Request<'b>;

    /// Request header for a read at `address`
    fn prepare_read<'b>(&self, id: DeviceId, address: u32) -> Request<'b>;

    /// Handle assigned at registration
    fn device_id(&self) -> Result<DeviceId, ExecuteError> {
        self.base().id().ok_or(ExecuteError::UnknownDevice)
    }

    /// Write a block, blocking until done
    fn write<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
        data: &[u8],
    ) -> Result<(), ExecuteError> {
        let request = self.prepare_write(self.device_id()?, address).write(data);
        controller.execute(request)?;
        Ok(())
    }

    /// Write the low `len` bytes of `value`, least significant first
    fn write_word<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
        value: u32,
        len: u8,
    ) -> Result<(), ExecuteError> {
        let request = self
            .prepare_write(self.device_id()?, address)
            .out_word(value, len);
        controller.execute(request)?;
        Ok(())
    }

    fn write8<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
        value: u8,
    ) -> Result<(), ExecuteError> {
        self.write_word(controller, address, u32::from(value), 1)
    }

    fn write16<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
        value: u16,
    ) -> Result<(), ExecuteError> {
        self.write_word(controller, address, u32::from(value), 2)
    }

    fn write32<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
        value: u32,
    ) -> Result<(), ExecuteError> {
        self.write_word(controller, address, value, 4)
    }

    /// Queue a block write, returning at once
    ///
    /// `callback` runs in interrupt context when the write completes.
    fn write_async<'d, H: Hardware>(
        &self,
        controller: &Controller<'d, H>,
        address: u32,
        data: &'d [u8],
        callback: Option<Callback>,
        param: usize,
    ) -> Result<Ticket, ExecuteError> {
        let mut request = self.prepare_write(self.device_id()?, address).write(data);
        if let Some(callback) = callback {
            request = request.on_complete(callback, param);
        }
        Ok(controller.submit(request)?)
    }

    /// Fill `buf`, blocking until done
    fn read<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
        buf: &mut [u8],
    ) -> Result<(), ExecuteError> {
        let request = self.prepare_read(self.device_id()?, address).read_into(buf);
        controller.execute(request)?;
        Ok(())
    }

    /// Read `len` bytes (at most 4) as a little-endian word
    fn read_word<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
        len: u8,
    ) -> Result<u32, ExecuteError> {
        let request = self.prepare_read(self.device_id()?, address).in_word(len);
        Ok(controller.execute(request)?.read_value())
    }

    fn read8<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
    ) -> Result<u8, ExecuteError> {
        Ok(self.read_word(controller, address, 1)? as u8)
    }

    fn read16<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
    ) -> Result<u16, ExecuteError> {
        Ok(self.read_word(controller, address, 2)? as u16)
    }

    fn read32<H: Hardware>(
        &self,
        controller: &Controller<'_, H>,
        address: u32,
    ) -> Result<u32, ExecuteError> {
        self.read_word(controller, address, 4)
    }

    /// Queue a block read into `buf`, returning at once
    ///
    /// The data is in place once the ticket completes.
    fn read_async<'d, H: Hardware>(
        &self,
        controller: &Controller<'d, H>,
        address: u32,
        buf: &'d mut [u8],
        callback: Option<Callback>,
        param: usize,
    ) -> Result<Ticket, ExecuteError> {
        let mut request = self.prepare_read(self.device_id()?, address).read_into(buf);
        if let Some(callback) = callback {
            request = request.on_complete(callback, param);
        }
        Ok(controller.submit(request)?)
    }
}
