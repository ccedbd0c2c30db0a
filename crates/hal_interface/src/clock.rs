//! Clock tree description for the SAM3X main PLL.
//!
//! The vendor clock driver programs the PLL from compile-time settings. This module holds the
//! same settings on the Rust side so the expected core frequency can be checked before the
//! kernel starts and reported in the boot log.

use crate::{HalError, HalResult};

/// Lowest frequency the PLL accepts on its input (after the divider).
pub const K_PLL_INPUT_MIN_HZ: u32 = 8_000_000;
/// Highest frequency the PLL accepts on its input (after the divider).
pub const K_PLL_INPUT_MAX_HZ: u32 = 32_000_000;
/// Lowest frequency the PLL can generate.
pub const K_PLL_OUTPUT_MIN_HZ: u32 = 84_000_000;
/// Highest frequency the PLL can generate.
pub const K_PLL_OUTPUT_MAX_HZ: u32 = 192_000_000;
/// Largest value accepted by the 11-bit loop multiplier field (stored as `mul - 1`).
pub const K_PLL_MUL_MAX: u32 = 2048;
/// Largest value accepted by the 8-bit input divider field.
pub const K_PLL_DIV_MAX: u32 = 255;

/// Prescaler values the master clock controller can apply to the PLL output.
const K_CPU_PRESCALERS: [u32; 8] = [1, 2, 3, 4, 8, 16, 32, 64];

/// PLL configuration: the PLL runs at `source_hz * mul / div`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PllConfig {
    pub source_hz: u32,
    pub div: u32,
    pub mul: u32,
}

impl PllConfig {
    pub const fn new(p_source_hz: u32, p_div: u32, p_mul: u32) -> Self {
        Self {
            source_hz: p_source_hz,
            div: p_div,
            mul: p_mul,
        }
    }

    /// Computes the PLL output frequency.
    ///
    /// # Errors
    /// - `InvalidPllDivider` / `InvalidPllMultiplier` when a field does not fit the register.
    /// - `PllInputOutOfRange` when `source_hz / div` is outside the PLL input range.
    /// - `PllOutputOutOfRange` when the resulting frequency cannot be generated.
    pub fn output_hz(&self) -> HalResult<u32> {
        if self.div == 0 || self.div > K_PLL_DIV_MAX {
            return Err(HalError::InvalidPllDivider(self.div));
        }
        if self.mul < 2 || self.mul > K_PLL_MUL_MAX {
            return Err(HalError::InvalidPllMultiplier(self.mul));
        }

        let l_input_hz = self.source_hz / self.div;
        if !(K_PLL_INPUT_MIN_HZ..=K_PLL_INPUT_MAX_HZ).contains(&l_input_hz) {
            return Err(HalError::PllInputOutOfRange(l_input_hz));
        }

        let l_output_hz = l_input_hz as u64 * self.mul as u64;
        if l_output_hz < K_PLL_OUTPUT_MIN_HZ as u64 || l_output_hz > K_PLL_OUTPUT_MAX_HZ as u64 {
            return Err(HalError::PllOutputOutOfRange(
                l_output_hz.min(u32::MAX as u64) as u32,
            ));
        }

        Ok(l_output_hz as u32)
    }
}

/// Hardware initialization settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McuConfig {
    /// Main PLL settings.
    pub pll: PllConfig,
    /// Divider applied between the PLL output and the CPU clock.
    pub cpu_prescaler: u32,
    /// NVIC priority grouping. 0 assigns every priority bit to preemption.
    pub priority_grouping: u8,
}

impl McuConfig {
    /// Settings of the Arduino Due: 12 MHz crystal, PLL at 168 MHz, CPU at 84 MHz.
    pub const fn arduino_due() -> Self {
        Self {
            pll: PllConfig::new(12_000_000, 1, 14),
            cpu_prescaler: 2,
            priority_grouping: 0,
        }
    }

    /// Returns the CPU clock produced by this configuration.
    ///
    /// # Errors
    /// Propagates PLL errors, and returns `InvalidCpuPrescaler` for a prescaler the master
    /// clock controller does not provide.
    pub fn core_clock_hz(&self) -> HalResult<u32> {
        if !K_CPU_PRESCALERS.contains(&self.cpu_prescaler) {
            return Err(HalError::InvalidCpuPrescaler(self.cpu_prescaler));
        }
        Ok(self.pll.output_hz()? / self.cpu_prescaler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arduino_due_runs_at_84_mhz() {
        let l_config = McuConfig::arduino_due();
        assert_eq!(l_config.pll.output_hz(), Ok(168_000_000));
        assert_eq!(l_config.core_clock_hz(), Ok(84_000_000));
    }

    #[test]
    fn divider_and_multiplier_are_range_checked() {
        assert_eq!(
            PllConfig::new(12_000_000, 0, 14).output_hz(),
            Err(HalError::InvalidPllDivider(0))
        );
        assert_eq!(
            PllConfig::new(12_000_000, 1, 1).output_hz(),
            Err(HalError::InvalidPllMultiplier(1))
        );
        assert_eq!(
            PllConfig::new(12_000_000, 1, 4096).output_hz(),
            Err(HalError::InvalidPllMultiplier(4096))
        );
    }

    #[test]
    fn frequencies_outside_the_pll_range_are_rejected() {
        // 12 MHz / 3 = 4 MHz, below the PLL input range
        assert_eq!(
            PllConfig::new(12_000_000, 3, 30).output_hz(),
            Err(HalError::PllInputOutOfRange(4_000_000))
        );
        // 12 MHz * 20 = 240 MHz
        assert_eq!(
            PllConfig::new(12_000_000, 1, 20).output_hz(),
            Err(HalError::PllOutputOutOfRange(240_000_000))
        );
    }

    #[test]
    fn unsupported_prescaler_is_rejected() {
        let l_config = McuConfig {
            cpu_prescaler: 5,
            ..McuConfig::arduino_due()
        };
        assert_eq!(
            l_config.core_clock_hz(),
            Err(HalError::InvalidCpuPrescaler(5))
        );
    }
}
