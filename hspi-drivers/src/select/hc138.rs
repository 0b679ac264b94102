//! 74HC138 3-to-8 line decoder
//!
//! Turns three address pins and an active-low enable into eight
//! chip-select lines. The chip-select id picks the output; the decoder
//! is disabled between requests, so every output idles high.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::{OutputPin, PinState};
use hspi_core::SelectDevice;

struct Pins<P> {
    address: [P; 3],
    /// /G2A, low enables the outputs
    enable: P,
}

/// Chip-select hook driving a 74HC138
///
/// Output `Yn` goes low for chip-select id `n` (modulo 8). Pin errors
/// cannot be reported from interrupt context; they are ignored.
pub struct Hc138Select<P> {
    pins: Mutex<RefCell<Pins<P>>>,
}

impl<P: OutputPin + Send> Hc138Select<P> {
    /// Take the address pins A0..A2 and the enable pin
    ///
    /// The decoder starts disabled.
    pub fn new(a0: P, a1: P, a2: P, mut enable: P) -> Self {
        let _ = enable.set_high();
        Self {
            pins: Mutex::new(RefCell::new(Pins {
                address: [a0, a1, a2],
                enable,
            })),
        }
    }
}

impl<P: OutputPin + Send> SelectDevice for Hc138Select<P> {
    fn select(&self, chip_select: u8, active: bool) {
        critical_section::with(|cs| {
            let mut pins = self.pins.borrow_ref_mut(cs);
            if active {
                for (bit, pin) in pins.address.iter_mut().enumerate() {
                    let _ = pin.set_state(PinState::from(chip_select & (1 << bit) != 0));
                }
                let _ = pins.enable.set_low();
            } else {
                let _ = pins.enable.set_high();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MockPin(Arc<AtomicBool>);

    impl MockPin {
        fn is_high(&self) -> bool {
            self.0.load(Ordering::Relaxed)
        }
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.store(false, Ordering::Relaxed);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn decoder() -> (Hc138Select<MockPin>, [MockPin; 4]) {
        let pins: [MockPin; 4] = Default::default();
        let select = Hc138Select::new(
            pins[0].clone(),
            pins[1].clone(),
            pins[2].clone(),
            pins[3].clone(),
        );
        (select, pins)
    }

    fn address(pins: &[MockPin; 4]) -> u8 {
        (0..3).filter(|&i| pins[i].is_high()).map(|i| 1 << i).sum()
    }

    #[test]
    fn test_starts_disabled() {
        let (_select, pins) = decoder();
        assert!(pins[3].is_high());
    }

    #[test]
    fn test_select_sets_address_and_enables() {
        let (select, pins) = decoder();
        for cs in 3..8 {
            select.select(cs, true);
            assert_eq!(address(&pins), cs);
            assert!(!pins[3].is_high());

            select.select(cs, false);
            assert!(pins[3].is_high());
        }
    }

    #[test]
    fn test_drives_controller_requests() {
        use hspi_core::{Controller, Device, DeviceBase, PinSet, Request};
        use hspi_hal_sim::SimBus;

        struct Sensor(DeviceBase);
        impl Device for Sensor {
            fn base(&self) -> &DeviceBase {
                &self.0
            }
        }

        let sensor = Sensor(DeviceBase::new());
        let (select, pins) = decoder();
        let sim = SimBus::new();
        let controller = Controller::new(sim.clone());
        controller.begin();
        controller.on_select_device(&select);
        let id = controller
            .start_device(&sensor, PinSet::Normal, 6, 1_000_000)
            .unwrap();

        let ticket = controller.submit(Request::new(id).out8(0xA0)).unwrap();
        assert_eq!(address(&pins), 6);
        assert!(!pins[3].is_high());

        while sim.interrupt_pending() {
            controller.on_interrupt();
        }
        drop(controller.wait(ticket));
        assert!(pins[3].is_high());
        assert!(!sim.bursts()[0].hardware_cs);
    }
}
