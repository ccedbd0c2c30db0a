use crate::{HalError, HalResult, McuConfig};

/// Highest NVIC priority grouping value (PRIGROUP is a 3-bit field).
pub const K_MAX_PRIORITY_GROUPING: u8 = 7;

/// Identifier of a digital output line driven by the board's LED test harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPin(pub u8);

/// A set of digital output lines.
///
/// Implementors are shared between the boot code and callbacks running in kernel task
/// context, so the level is owned by the peripheral and every method takes `&self`.
pub trait DigitalOutput: Sync {
    /// Inverts the level of `pin`.
    ///
    /// # Errors
    /// Returns `HalError::OutputNotFound` if the line does not exist.
    fn toggle(&self, pin: OutputPin) -> HalResult<()>;
}

/// Board-level entry points supplied by the vendor platform layer.
pub trait Platform: DigitalOutput {
    /// Configures the system clocks and returns the resulting CPU clock in Hz.
    fn clock_init(&self, config: &McuConfig) -> HalResult<u32>;

    /// Sets the NVIC priority grouping.
    fn set_priority_grouping(&self, grouping: u8) -> HalResult<()>;

    /// Performs the evaluation kit pin setup.
    fn board_init(&self) -> HalResult<()>;

    /// Initializes the LED test harness IO.
    fn io_init(&self) -> HalResult<()>;
}

/// Information gathered while bringing the MCU up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McuInfo {
    pub core_clock_hz: u32,
}

/// One-shot microcontroller initialization.
pub struct Mcu;

impl Mcu {
    /// Brings the microcontroller up before any task runs.
    ///
    /// The whole configuration is checked first, then the platform is driven in order:
    /// 1. clocks,
    /// 2. interrupt priority grouping,
    /// 3. board pins,
    /// 4. LED test harness.
    ///
    /// # Errors
    /// - Configuration errors are returned before the platform is touched.
    /// - `ClockMismatch` if the clock driver does not produce the configured frequency.
    /// - Any error returned by a platform step, later steps are not run.
    pub fn init<P: Platform + ?Sized>(p_platform: &P, p_config: &McuConfig) -> HalResult<McuInfo> {
        let l_expected_hz = p_config.core_clock_hz()?;
        if p_config.priority_grouping > K_MAX_PRIORITY_GROUPING {
            return Err(HalError::InvalidPriorityGrouping(p_config.priority_grouping));
        }

        let l_core_clock_hz = p_platform.clock_init(p_config)?;
        if l_core_clock_hz != l_expected_hz {
            return Err(HalError::ClockMismatch(l_expected_hz, l_core_clock_hz));
        }

        p_platform.set_priority_grouping(p_config.priority_grouping)?;
        p_platform.board_init()?;
        p_platform.io_init()?;

        Ok(McuInfo {
            core_clock_hz: l_core_clock_hz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{InitStep, SimBoard};

    #[test]
    fn init_runs_every_step_in_order() {
        let l_board = SimBoard::new();
        let l_info = Mcu::init(&l_board, &McuConfig::arduino_due()).unwrap();

        assert_eq!(l_info.core_clock_hz, 84_000_000);
        assert_eq!(
            l_board.steps().as_slice(),
            &[
                InitStep::Clock,
                InitStep::PriorityGrouping(0),
                InitStep::Board,
                InitStep::Io
            ]
        );
    }

    #[test]
    fn bad_configuration_touches_nothing() {
        let l_board = SimBoard::new();
        let l_config = McuConfig {
            priority_grouping: 8,
            ..McuConfig::arduino_due()
        };

        assert_eq!(
            Mcu::init(&l_board, &l_config),
            Err(HalError::InvalidPriorityGrouping(8))
        );
        assert!(l_board.steps().is_empty());
    }

    #[test]
    fn failing_step_stops_the_sequence() {
        let l_board = SimBoard::new();
        l_board.fail_board_init(true);

        assert_eq!(
            Mcu::init(&l_board, &McuConfig::arduino_due()),
            Err(HalError::InitStepFailed("board_init"))
        );
        assert_eq!(
            l_board.steps().as_slice(),
            &[InitStep::Clock, InitStep::PriorityGrouping(0)]
        );
    }

    #[test]
    fn clock_mismatch_is_detected() {
        let l_board = SimBoard::new();
        l_board.set_clock_override(Some(48_000_000));

        assert_eq!(
            Mcu::init(&l_board, &McuConfig::arduino_due()),
            Err(HalError::ClockMismatch(84_000_000, 48_000_000))
        );
    }
}
