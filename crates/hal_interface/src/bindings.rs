use crate::{DigitalOutput, HalError, HalResult, McuConfig, OutputPin, Platform};

/// Number of LEDs handled by the board's `partest` LED harness.
pub const K_PARTEST_LED_COUNT: u8 = 3;

/// `VECTKEY` value that must accompany every write to `SCB->AIRCR`.
const K_AIRCR_VECTKEY: u32 = 0x05FA << 16;
const K_AIRCR_VECTKEY_MASK: u32 = 0xFFFF << 16;
const K_AIRCR_PRIGROUP_SHIFT: u32 = 8;
const K_AIRCR_PRIGROUP_MASK: u32 = 0x7 << K_AIRCR_PRIGROUP_SHIFT;

unsafe extern "C" {
    /// Vendor clock driver entry point, programs the PLL from `conf_clock.h`.
    fn sysclk_init();

    /// Vendor evaluation kit setup (pin multiplexing, watchdog).
    fn board_init();

    fn vParTestInitialise();

    fn vParTestToggleLED(p_led: u32);

    /// CMSIS core clock variable, refreshed by `sysclk_init`.
    static SystemCoreClock: u32;
}

/// Board support backed by the vendor platform library.
pub struct AsfBoard {
    _private: (),
}

impl AsfBoard {
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for AsfBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalOutput for AsfBoard {
    fn toggle(&self, p_pin: OutputPin) -> HalResult<()> {
        if p_pin.0 >= K_PARTEST_LED_COUNT {
            return Err(HalError::OutputNotFound(p_pin.0));
        }
        unsafe { vParTestToggleLED(p_pin.0 as u32) };
        Ok(())
    }
}

impl Platform for AsfBoard {
    fn clock_init(&self, _p_config: &McuConfig) -> HalResult<u32> {
        unsafe {
            sysclk_init();
            Ok(core::ptr::read_volatile(core::ptr::addr_of!(SystemCoreClock)))
        }
    }

    fn set_priority_grouping(&self, p_grouping: u8) -> HalResult<()> {
        // Same register sequence as CMSIS NVIC_SetPriorityGrouping
        let l_scb = unsafe { &*cortex_m::peripheral::SCB::PTR };
        unsafe {
            l_scb.aircr.modify(|l_aircr| {
                (l_aircr & !(K_AIRCR_VECTKEY_MASK | K_AIRCR_PRIGROUP_MASK))
                    | K_AIRCR_VECTKEY
                    | (((p_grouping as u32) << K_AIRCR_PRIGROUP_SHIFT) & K_AIRCR_PRIGROUP_MASK)
            });
        }
        Ok(())
    }

    fn board_init(&self) -> HalResult<()> {
        unsafe { board_init() };
        Ok(())
    }

    fn io_init(&self) -> HalResult<()> {
        unsafe { vParTestInitialise() };
        Ok(())
    }
}
