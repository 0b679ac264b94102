//! Transfer request descriptor
//!
//! A request describes one chip-select framed exchange: optional command,
//! address and dummy phases followed by outgoing and incoming data. Data
//! of up to four bytes can be held inline, so small register accesses
//! need no buffer.

use core::fmt;

use crate::device::DeviceId;

/// Completion callback
///
/// Runs in interrupt context; must not block.
pub type Callback = fn(&Request<'_>);

/// Command phase, sent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub value: u16,
    /// 0..=16; zero disables the phase
    pub bits: u8,
}

/// Address phase, after the command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address {
    pub value: u32,
    /// 0..=32; zero disables the phase
    pub bits: u8,
}

/// Outgoing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutData<'b> {
    #[default]
    None,
    /// Up to four bytes, sent least significant byte first
    Inline { value: u32, len: u8 },
    Slice(&'b [u8]),
}

impl<'b> OutData<'b> {
    pub fn len(&self) -> usize {
        match self {
            OutData::None => 0,
            OutData::Inline { len, .. } => usize::from(*len),
            OutData::Slice(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy up to `buf.len()` bytes starting at `offset`, returning the count
    pub(crate) fn copy_to(&self, offset: usize, buf: &mut [u8]) -> usize {
        let inline;
        let src: &[u8] = match self {
            OutData::None => &[],
            OutData::Inline { value, len } => {
                inline = value.to_le_bytes();
                &inline[..usize::from(*len)]
            }
            OutData::Slice(data) => data,
        };
        let src = src.get(offset..).unwrap_or(&[]);
        let count = src.len().min(buf.len());
        buf[..count].copy_from_slice(&src[..count]);
        count
    }
}

/// Incoming data
#[derive(Debug, PartialEq, Eq, Default)]
pub enum InData<'b> {
    #[default]
    None,
    /// Up to four bytes, received least significant byte first
    Inline { value: u32, len: u8 },
    Slice(&'b mut [u8]),
}

impl<'b> InData<'b> {
    pub fn len(&self) -> usize {
        match self {
            InData::None => 0,
            InData::Inline { len, .. } => usize::from(*len),
            InData::Slice(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inline result; zero for the other variants
    pub fn value(&self) -> u32 {
        match self {
            InData::Inline { value, .. } => *value,
            _ => 0,
        }
    }

    /// Mutable window of `len` bytes at `offset`, for slice targets
    pub(crate) fn window(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        match self {
            InData::Slice(buf) => buf.get_mut(offset..offset + len),
            _ => None,
        }
    }

    /// Store an inline result from the first FIFO word
    pub(crate) fn store_word(&mut self, word: u32) {
        if let InData::Inline { value, len } = self {
            *value = match *len {
                0 => 0,
                1..=3 => word & ((1 << (u32::from(*len) * 8)) - 1),
                _ => word,
            };
        }
    }
}

/// A transfer submitted to the controller
pub struct Request<'b> {
    device: DeviceId,
    pub command: Command,
    pub address: Address,
    /// Dummy clock cycles between address and data
    pub dummy_len: u8,
    pub out: OutData<'b>,
    pub input: InData<'b>,
    pub(crate) next: Option<u8>,
    pub(crate) busy: bool,
    callback: Option<Callback>,
    param: usize,
}

impl<'b> Request<'b> {
    /// Empty request for a registered device
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            command: Command::default(),
            address: Address::default(),
            dummy_len: 0,
            out: OutData::None,
            input: InData::None,
            next: None,
            busy: false,
            callback: None,
            param: 0,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Command of `bits` (up to 16) bits
    pub fn command(mut self, value: u16, bits: u8) -> Self {
        self.command = Command {
            value,
            bits: bits.min(16),
        };
        self
    }

    pub fn command8(self, value: u8) -> Self {
        self.command(u16::from(value), 8)
    }

    pub fn command16(self, value: u16) -> Self {
        self.command(value, 16)
    }

    /// Address of `bits` (up to 32) bits
    pub fn address(mut self, value: u32, bits: u8) -> Self {
        self.address = Address {
            value,
            bits: bits.min(32),
        };
        self
    }

    pub fn address24(self, value: u32) -> Self {
        self.address(value & 0x00FF_FFFF, 24)
    }

    pub fn address32(self, value: u32) -> Self {
        self.address(value, 32)
    }

    pub fn dummy(mut self, cycles: u8) -> Self {
        self.dummy_len = cycles;
        self
    }

    /// Send `data`
    pub fn write(mut self, data: &'b [u8]) -> Self {
        self.out = OutData::Slice(data);
        self
    }

    /// Send the low `len` bytes of `value`
    pub fn out_word(mut self, value: u32, len: u8) -> Self {
        self.out = OutData::Inline {
            value,
            len: len.min(4),
        };
        self
    }

    pub fn out8(self, value: u8) -> Self {
        self.out_word(u32::from(value), 1)
    }

    pub fn out16(self, value: u16) -> Self {
        self.out_word(u32::from(value), 2)
    }

    pub fn out32(self, value: u32) -> Self {
        self.out_word(value, 4)
    }

    /// Receive into `buf`
    pub fn read_into(mut self, buf: &'b mut [u8]) -> Self {
        self.input = InData::Slice(buf);
        self
    }

    /// Receive `len` bytes inline, see [`Request::read_value`]
    pub fn in_word(mut self, len: u8) -> Self {
        self.input = InData::Inline {
            value: 0,
            len: len.min(4),
        };
        self
    }

    pub fn in8(self) -> Self {
        self.in_word(1)
    }

    pub fn in16(self) -> Self {
        self.in_word(2)
    }

    pub fn in32(self) -> Self {
        self.in_word(4)
    }

    /// Callback and opaque parameter, invoked once on completion
    pub fn on_complete(mut self, callback: Callback, param: usize) -> Self {
        self.callback = Some(callback);
        self.param = param;
        self
    }

    pub fn param(&self) -> usize {
        self.param
    }

    /// Inline read result
    pub fn read_value(&self) -> u32 {
        self.input.value()
    }

    /// True while the controller owns the request
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// True while another request is linked behind this one
    pub fn is_chained(&self) -> bool {
        self.next.is_some()
    }

    /// Run the completion callback, if any
    pub fn invoke_callback(&self) {
        if let Some(callback) = self.callback {
            callback(self);
        }
    }
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("device", &self.device)
            .field("command", &self.command)
            .field("address", &self.address)
            .field("dummy_len", &self.dummy_len)
            .field("out", &self.out)
            .field("input", &self.input)
            .field("busy", &self.busy)
            .field("next", &self.next)
            .field("param", &self.param)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> DeviceId {
        DeviceId::new(0)
    }

    #[test]
    fn test_builder() {
        let data = [1u8, 2, 3];
        let req = Request::new(id())
            .command8(0x02)
            .address24(0x1234_5678)
            .dummy(8)
            .write(&data);
        assert_eq!(req.command, Command { value: 0x02, bits: 8 });
        assert_eq!(
            req.address,
            Address {
                value: 0x34_5678,
                bits: 24
            }
        );
        assert_eq!(req.dummy_len, 8);
        assert_eq!(req.out.len(), 3);
        assert!(req.input.is_empty());
        assert!(!req.is_busy());
        assert!(!req.is_chained());
    }

    #[test]
    fn test_lengths_clamped() {
        let req = Request::new(id()).command(0xFFFF, 20).address(1, 40).out_word(0, 9);
        assert_eq!(req.command.bits, 16);
        assert_eq!(req.address.bits, 32);
        assert_eq!(req.out.len(), 4);
    }

    #[test]
    fn test_inline_out_bytes() {
        let out = OutData::Inline {
            value: 0x0403_0201,
            len: 3,
        };
        let mut buf = [0u8; 8];
        assert_eq!(out.copy_to(0, &mut buf), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_slice_out_offset() {
        let data = [1u8, 2, 3, 4, 5];
        let out = OutData::Slice(&data);
        let mut buf = [0u8; 2];
        assert_eq!(out.copy_to(3, &mut buf), 2);
        assert_eq!(buf, [4, 5]);
        assert_eq!(out.copy_to(5, &mut buf), 0);
    }

    #[test]
    fn test_inline_in_masked() {
        let mut input = InData::Inline { value: 0, len: 2 };
        input.store_word(0xAABB_CCDD);
        assert_eq!(input.value(), 0xCCDD);

        let mut input = InData::Inline { value: 0, len: 4 };
        input.store_word(0xAABB_CCDD);
        assert_eq!(input.value(), 0xAABB_CCDD);
    }

    #[test]
    fn test_in_window() {
        let mut buf = [0u8; 4];
        let mut input = InData::Slice(&mut buf);
        input.window(1, 2).unwrap().copy_from_slice(&[7, 8]);
        assert!(input.window(3, 2).is_none());
        drop(input);
        assert_eq!(buf, [0, 7, 8, 0]);
    }

    #[test]
    fn test_callback_receives_param() {
        use core::sync::atomic::{AtomicUsize, Ordering};
        static SEEN: AtomicUsize = AtomicUsize::new(0);

        fn done(req: &Request<'_>) {
            SEEN.store(req.param(), Ordering::SeqCst);
        }

        let req = Request::new(id()).on_complete(done, 42);
        req.invoke_callback();
        assert_eq!(SEEN.load(Ordering::SeqCst), 42);
    }
}
