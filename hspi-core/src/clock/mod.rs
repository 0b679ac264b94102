//! SPI clock divider calculation
//!
//! The SPI clock is the 80 MHz peripheral clock divided by
//! `(pre + 1) * (n + 1)`, with `pre` in 0..=8191 and `n` in 1..=63, or
//! the peripheral clock itself when the divider is bypassed.

use hspi_hal::regs::{self, clock_value};
use hspi_hal::APB_CLK_FREQ;

/// Encoding for an undivided clock
pub const BYPASS: u32 = regs::clock::EQU_SYSCLK;

const MAX_PRE: u32 = regs::clock::PRE_MASK;
const MAX_N: u32 = regs::clock::N_MASK;

/// Lowest achievable SPI clock in Hz
pub const MIN_FREQ: u32 = APB_CLK_FREQ / ((MAX_PRE + 1) * (MAX_N + 1));

fn divided(pre: u32, n: u32) -> u32 {
    APB_CLK_FREQ / ((pre + 1) * (n + 1))
}

/// Find the clock register value closest to, but not above, `freq`
///
/// Requests below [`MIN_FREQ`] get the slowest clock.
pub fn frequency_to_divider(freq: u32) -> u32 {
    if freq >= APB_CLK_FREQ {
        return BYPASS;
    }
    let freq = freq.max(MIN_FREQ);

    let mut best_reg = 0;
    let mut best_freq = 0;
    for n in 1..=MAX_N {
        let base = ((APB_CLK_FREQ / (n + 1)) / freq) as i32 - 1;
        for pre in [base - 1, base, base + 1] {
            let pre = pre.clamp(0, MAX_PRE as i32) as u32;
            let actual = divided(pre, n);
            if actual > freq {
                continue;
            }
            let reg = clock_value(pre, n, 0, (n + 1) / 2);
            if actual == freq {
                return reg;
            }
            if actual > best_freq {
                best_freq = actual;
                best_reg = reg;
            }
        }
    }
    best_reg
}

/// Frequency produced by a clock register value
pub fn divider_to_frequency(reg: u32) -> u32 {
    if reg & BYPASS != 0 {
        return APB_CLK_FREQ;
    }
    let pre = (reg >> regs::clock::PRE_SHIFT) & regs::clock::PRE_MASK;
    let n = (reg >> regs::clock::N_SHIFT) & regs::clock::N_MASK;
    divided(pre, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Best achievable frequency not above `freq`, by exhaustive search
    fn brute_force(freq: u32) -> u32 {
        let mut best = 0;
        for n in 1..=MAX_N {
            // Frequency falls as pre rises; the first fit is the best for this n
            if let Some(pre) = (0..=MAX_PRE).find(|&pre| divided(pre, n) <= freq) {
                best = best.max(divided(pre, n));
            }
        }
        best
    }

    #[test]
    fn test_bypass_at_and_above_apb() {
        assert_eq!(frequency_to_divider(APB_CLK_FREQ), BYPASS);
        assert_eq!(frequency_to_divider(u32::MAX), BYPASS);
        assert_eq!(divider_to_frequency(BYPASS), APB_CLK_FREQ);
    }

    #[test]
    fn test_exact_divisors() {
        assert_eq!(divider_to_frequency(frequency_to_divider(40_000_000)), 40_000_000);
        assert_eq!(divider_to_frequency(frequency_to_divider(20_000_000)), 20_000_000);
        assert_eq!(divider_to_frequency(frequency_to_divider(1_000_000)), 1_000_000);
    }

    #[test]
    fn test_just_below_apb_rounds_down() {
        assert_eq!(
            divider_to_frequency(frequency_to_divider(APB_CLK_FREQ - 1)),
            40_000_000
        );
    }

    #[test]
    fn test_symmetric_duty() {
        let reg = frequency_to_divider(10_000_000);
        let n = (reg >> regs::clock::N_SHIFT) & regs::clock::N_MASK;
        let h = (reg >> regs::clock::H_SHIFT) & regs::clock::DUTY_MASK;
        let l = reg & regs::clock::DUTY_MASK;
        assert_eq!(h, 0);
        assert_eq!(l, (n + 1) / 2);
    }

    #[test]
    fn test_below_minimum_uses_slowest_clock() {
        assert_eq!(MIN_FREQ, 152);
        let reg = frequency_to_divider(1);
        assert_eq!(reg, frequency_to_divider(MIN_FREQ));
        assert_eq!(divider_to_frequency(reg), MIN_FREQ);
        assert_eq!(frequency_to_divider(0), reg);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn test_never_exceeds_and_is_closest(freq in MIN_FREQ..APB_CLK_FREQ) {
            let actual = divider_to_frequency(frequency_to_divider(freq));
            prop_assert!(actual <= freq);
            prop_assert_eq!(actual, brute_force(freq));
        }

        #[test]
        fn test_low_frequencies_are_closest(freq in MIN_FREQ..100_000u32) {
            prop_assert_eq!(divider_to_frequency(frequency_to_divider(freq)), brute_force(freq));
        }

        #[test]
        fn test_reencoding_is_idempotent(freq in 1..=APB_CLK_FREQ) {
            let reg = frequency_to_divider(freq);
            prop_assert_eq!(frequency_to_divider(divider_to_frequency(reg)), reg);
        }
    }
}
