#![cfg_attr(not(test), no_std)]

use hal_interface::{DigitalOutput, OutputPin};
use kernel::{KernelPort, KernelResult, Scheduler, kernel_log};

pub mod led_controller;

/// Hardware resources handed to the apps.
#[derive(Clone, Copy)]
pub struct AppResources {
    pub led_output: &'static dyn DigitalOutput,
    pub led_pin: OutputPin,
}

type AppInit<K> = fn(&mut Scheduler<K>, &AppResources) -> KernelResult<()>;

/// Apps compiled into the firmware, initialized in this order.
fn default_apps<K: KernelPort>() -> [(&'static str, AppInit<K>); 1] {
    [(led_controller::K_APP_NAME, init_led_controller::<K>)]
}

fn init_led_controller<K: KernelPort>(
    p_scheduler: &mut Scheduler<K>,
    p_resources: &AppResources,
) -> KernelResult<()> {
    led_controller::init(p_scheduler, p_resources.led_output, p_resources.led_pin)?;
    Ok(())
}

/// Initializes every default app.
///
/// Stops at the first failure.
///
/// # Errors
/// Returns the error of the app that could not be initialized, already reported by the
/// scheduler.
pub fn init_kernel_apps<K: KernelPort>(
    p_scheduler: &mut Scheduler<K>,
    p_resources: &AppResources,
) -> KernelResult<()> {
    for (l_name, l_init) in default_apps::<K>() {
        l_init(p_scheduler, p_resources)
            .inspect_err(|_| kernel_log!("Cannot initialize app {}", l_name))?;
    }
    Ok(())
}

/// Serializes tests sharing the LED binding.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static L_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    L_LOCK.lock().unwrap_or_else(|l_poisoned| l_poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal_interface::McuConfig;
    use hal_interface::sim::{InitStep, SimBoard};
    use kernel::port::PortError;
    use kernel::port::sim::{KernelCall, SimConfig, SimKernel};
    use kernel::{KernelError, KernelHooks, SchedulerState, Ticks, boot};
    use std::panic::{AssertUnwindSafe, catch_unwind};

    static HOOKS: KernelHooks = KernelHooks::new();

    fn scheduler(p_config: SimConfig) -> Scheduler<SimKernel> {
        Scheduler::new(
            SimKernel::new(SimConfig {
                use_malloc_failed_hook: false,
                ..p_config
            }),
            &HOOKS,
        )
    }

    #[test]
    fn blinky_boots_and_keeps_toggling_the_led() {
        let _l_guard = test_lock();
        static L_BOARD: SimBoard = SimBoard::new();
        let l_resources = AppResources {
            led_output: &L_BOARD,
            led_pin: OutputPin(0),
        };
        let mut l_sched = scheduler(SimConfig {
            observation_window: Ticks(10_000),
            ..SimConfig::new()
        });

        let l_result = catch_unwind(AssertUnwindSafe(|| {
            boot(&L_BOARD, &McuConfig::arduino_due(), &mut l_sched, |l_sched| {
                init_kernel_apps(l_sched, &l_resources)
            })
        }));

        // The scheduler did not return during the observation window.
        assert!(l_result.is_err());
        assert_eq!(l_sched.state(), SchedulerState::Running);
        assert_eq!(L_BOARD.steps().len(), 4);
        assert_eq!(L_BOARD.steps()[3], InitStep::Io);

        let l_starts = l_sched
            .port()
            .calls()
            .iter()
            .filter(|l_call| **l_call == KernelCall::StartScheduler)
            .count();
        assert_eq!(l_starts, 1);

        assert_eq!(L_BOARD.toggle_count(OutputPin(0)), 10);
        assert_eq!(l_sched.port().callback_errors(), 0);
    }

    #[test]
    fn app_failure_keeps_its_cause() {
        let _l_guard = test_lock();
        static L_BOARD: SimBoard = SimBoard::new();
        let l_resources = AppResources {
            led_output: &L_BOARD,
            led_pin: OutputPin(0),
        };
        let mut l_sched = scheduler(SimConfig {
            timer_queue_length: 0,
            ..SimConfig::new()
        });

        assert_eq!(
            init_kernel_apps(&mut l_sched, &l_resources),
            Err(KernelError::TimerStartFailed("LED timer", PortError::QueueFull))
        );
        assert_eq!(l_sched.state(), SchedulerState::Uninitialized);
    }
}
