//! Simulated board used on host builds.
//!
//! `SimBoard` records the initialization sequence it is driven through and keeps the level of
//! each LED line in atomics, so it can live in a `static` and be toggled from kernel callbacks.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use heapless::Vec;
use spin::Mutex;

use crate::{DigitalOutput, HalError, HalResult, McuConfig, OutputPin, Platform};

/// Number of LED lines on the simulated harness.
pub const K_SIM_OUTPUT_COUNT: usize = 3;

/// Platform entry point reached by the simulated board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Clock,
    PriorityGrouping(u8),
    Board,
    Io,
}

pub struct SimBoard {
    steps: Mutex<Vec<InitStep, 8>>,
    levels: [AtomicBool; K_SIM_OUTPUT_COUNT],
    toggles: [AtomicU32; K_SIM_OUTPUT_COUNT],
    fail_board_init: AtomicBool,
    clock_override_hz: AtomicU32,
}

impl SimBoard {
    pub const fn new() -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            levels: [const { AtomicBool::new(false) }; K_SIM_OUTPUT_COUNT],
            toggles: [const { AtomicU32::new(0) }; K_SIM_OUTPUT_COUNT],
            fail_board_init: AtomicBool::new(false),
            clock_override_hz: AtomicU32::new(0),
        }
    }

    /// Returns the initialization steps executed so far.
    pub fn steps(&self) -> Vec<InitStep, 8> {
        self.steps.lock().clone()
    }

    /// Current level of `pin`, `false` for a line that does not exist.
    pub fn level(&self, p_pin: OutputPin) -> bool {
        self.levels
            .get(p_pin.0 as usize)
            .is_some_and(|l_level| l_level.load(Ordering::Relaxed))
    }

    /// Number of times `pin` has been toggled.
    pub fn toggle_count(&self, p_pin: OutputPin) -> u32 {
        self.toggles
            .get(p_pin.0 as usize)
            .map_or(0, |l_count| l_count.load(Ordering::Relaxed))
    }

    /// Makes the board pin setup fail.
    pub fn fail_board_init(&self, p_fail: bool) {
        self.fail_board_init.store(p_fail, Ordering::Relaxed);
    }

    /// Makes the clock driver report `hz` instead of the configured frequency.
    pub fn set_clock_override(&self, p_hz: Option<u32>) {
        self.clock_override_hz
            .store(p_hz.unwrap_or(0), Ordering::Relaxed);
    }

    fn record(&self, p_step: InitStep) {
        // The sequence has four steps, a full log only drops repeated boots
        let _ = self.steps.lock().push(p_step);
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalOutput for SimBoard {
    fn toggle(&self, p_pin: OutputPin) -> HalResult<()> {
        let l_index = p_pin.0 as usize;
        let l_level = self
            .levels
            .get(l_index)
            .ok_or(HalError::OutputNotFound(p_pin.0))?;
        l_level.fetch_xor(true, Ordering::Relaxed);
        self.toggles[l_index].fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Platform for SimBoard {
    fn clock_init(&self, p_config: &McuConfig) -> HalResult<u32> {
        self.record(InitStep::Clock);
        match self.clock_override_hz.load(Ordering::Relaxed) {
            0 => p_config.core_clock_hz(),
            l_hz => Ok(l_hz),
        }
    }

    fn set_priority_grouping(&self, p_grouping: u8) -> HalResult<()> {
        self.record(InitStep::PriorityGrouping(p_grouping));
        Ok(())
    }

    fn board_init(&self) -> HalResult<()> {
        if self.fail_board_init.load(Ordering::Relaxed) {
            return Err(HalError::InitStepFailed("board_init"));
        }
        self.record(InitStep::Board);
        Ok(())
    }

    fn io_init(&self) -> HalResult<()> {
        self.record(InitStep::Io);
        Ok(())
    }
}
