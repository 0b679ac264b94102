//! IO MUX pin function encoding

use hspi_hal::gpio::{pins, PinFunction};

/// Function field within a pin's IO MUX register: bits 4, 5 and 8
const FUNC_MASK: u32 = 0x13 << 4;

/// IO MUX register offset and function code for `function` on `pin`
///
/// `None` for combinations the pin cannot route.
pub fn function_code(pin: u8, function: PinFunction) -> Option<(usize, u32)> {
    let code = match (pin, function) {
        (pins::MISO | pins::MOSI | pins::CLK, PinFunction::Hspi) => 2,
        (pins::CS0, PinFunction::HspiCs0) => 2,
        (pins::MISO | pins::MOSI | pins::CLK | pins::CS0, PinFunction::Gpio) => 3,
        (pins::CS1, PinFunction::SpiCs1) => 1,
        (pins::CS1, PinFunction::Gpio) => 3,
        (pins::CS2, PinFunction::SpiCs2) => 1,
        (pins::CS2, PinFunction::Gpio) => 0,
        _ => return None,
    };
    Some((register_offset(pin)?, code))
}

fn register_offset(pin: u8) -> Option<usize> {
    Some(match pin {
        0 => 0x34,
        1 => 0x18,
        12 => 0x04,
        13 => 0x08,
        14 => 0x0C,
        15 => 0x10,
        _ => return None,
    })
}

/// Replace the function field of an IO MUX register value
///
/// The three code bits are split: bits 0-1 land at 4-5, bit 2 at 8.
pub fn with_function(reg: u32, code: u32) -> u32 {
    let field = (((code & 4) << 2) | (code & 3)) << 4;
    (reg & !FUNC_MASK) | field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hspi_pins() {
        assert_eq!(function_code(pins::MOSI, PinFunction::Hspi), Some((0x08, 2)));
        assert_eq!(function_code(pins::CS0, PinFunction::HspiCs0), Some((0x10, 2)));
        assert_eq!(function_code(pins::CS2, PinFunction::Gpio), Some((0x34, 0)));
        assert_eq!(function_code(pins::CS1, PinFunction::Hspi), None);
    }

    #[test]
    fn test_function_field() {
        assert_eq!(with_function(0, 3), 0x30);
        assert_eq!(with_function(0, 4), 0x100);
        // Pull-ups and other bits survive
        assert_eq!(with_function(0x0000_0180, 2), 0x0000_00A0);
        assert_eq!(with_function(0xFFFF_FFFF, 0), !FUNC_MASK);
    }
}
