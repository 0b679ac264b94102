//! Serial bit stream between the master and a slave

use crate::slave::Slave;

/// Bits driven onto MOSI for one segment of a burst
#[derive(Default)]
pub(crate) struct BitStream {
    bits: Vec<bool>,
}

impl BitStream {
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn append(&mut self, other: &BitStream) {
        self.bits.extend_from_slice(&other.bits);
    }

    pub fn truncate(&mut self, len: usize) {
        self.bits.truncate(len);
    }

    /// The stream read as an integer, first bit most significant
    pub fn value(&self) -> u32 {
        bits_to_value(&self.bits)
    }

    /// Push the low `count` bits of `value`, most significant first
    pub fn push_msb(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.bits.push((value >> i) & 1 != 0);
        }
    }

    /// Push the low `count` bits of `value`, least significant first
    pub fn push_lsb(&mut self, value: u32, count: u32) {
        for i in 0..count {
            self.bits.push((value >> i) & 1 != 0);
        }
    }

    /// Push a byte in the given bit order
    pub fn push_byte(&mut self, byte: u8, lsb_first: bool) {
        if lsb_first {
            self.push_lsb(u32::from(byte), 8);
        } else {
            self.push_msb(u32::from(byte), 8);
        }
    }

    /// Clock the stream through a slave, returning the MISO bits
    ///
    /// Slaves exchange whole bytes, so a trailing partial byte is padded
    /// with zero bits. Without a selected slave MISO floats high.
    pub fn shift(&self, slave: Option<&mut dyn Slave>) -> Vec<bool> {
        let mut miso = Vec::with_capacity(self.bits.len() + 7);
        let Some(slave) = slave else {
            miso.resize(self.bits.len(), true);
            return miso;
        };
        for chunk in self.bits.chunks(8) {
            let mut out = 0u8;
            for (i, &bit) in chunk.iter().enumerate() {
                if bit {
                    out |= 0x80 >> i;
                }
            }
            let input = slave.exchange(out);
            for i in 0..chunk.len() {
                miso.push(input & (0x80 >> i) != 0);
            }
        }
        miso
    }
}

/// Assemble bytes from received bits in the given bit order
pub(crate) fn collect_bytes(bits: &[bool], lsb_first: bool) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk.iter().enumerate().fold(0u8, |acc, (i, &bit)| {
                if !bit {
                    acc
                } else if lsb_first {
                    acc | (1 << i)
                } else {
                    acc | (0x80 >> i)
                }
            })
        })
        .collect()
}

/// Read bits as an integer, first bit most significant
pub(crate) fn bits_to_value(bits: &[bool]) -> u32 {
    bits.iter().fold(0u32, |acc, &bit| (acc << 1) | u32::from(bit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_orders() {
        let mut msb = BitStream::default();
        msb.push_byte(0x81, false);
        msb.push_byte(0x03, true);
        assert_eq!(bits_to_value(&msb.bits[..8]), 0x81);
        assert_eq!(bits_to_value(&msb.bits[8..]), 0xC0);
    }

    #[test]
    fn test_collect_bytes() {
        let bits = [true, false, false, false, false, false, false, false];
        assert_eq!(collect_bytes(&bits, false), vec![0x80]);
        assert_eq!(collect_bytes(&bits, true), vec![0x01]);
    }

    #[test]
    fn test_shift_without_slave_floats_high() {
        let mut stream = BitStream::default();
        stream.push_msb(0, 12);
        let miso = stream.shift(None);
        assert_eq!(miso.len(), 12);
        assert!(miso.iter().all(|&b| b));
    }
}
