use core::convert::Infallible;

use hal_interface::{Mcu, McuConfig, Platform};

use crate::ident::{K_KERNEL_NAME, K_KERNEL_VERSION};
use crate::port::KernelPort;
use crate::scheduler::Scheduler;
use crate::{KernelError, KernelResult, errors_mgt, kernel_log};

/// Initializes the hardware and the applications, then starts the kernel.
///
/// This function performs the following steps:
/// 1. Initializes the MCU (clocks, interrupt priority grouping, board, IO harness).
/// 2. Runs `init_apps`, which registers the application tasks and timers.
/// 3. Starts the kernel scheduler.
///
/// A step is only run if the previous one succeeded: applications are not initialized on a
/// hardware failure, and the scheduler is not started if an application failed.
///
/// # Returns
/// Only returns on failure, with the error that stopped the boot. Once the scheduler runs,
/// this function never returns.
pub fn boot<P, K, F>(
    p_platform: &P,
    p_mcu_config: &McuConfig,
    p_scheduler: &mut Scheduler<K>,
    p_init_apps: F,
) -> KernelError
where
    P: Platform + ?Sized,
    K: KernelPort,
    F: FnOnce(&mut Scheduler<K>) -> KernelResult<()>,
{
    match run(p_platform, p_mcu_config, p_scheduler, p_init_apps) {
        Ok(l_never) => match l_never {},
        Err(l_err) => l_err,
    }
}

fn run<P, K, F>(
    p_platform: &P,
    p_mcu_config: &McuConfig,
    p_scheduler: &mut Scheduler<K>,
    p_init_apps: F,
) -> KernelResult<Infallible>
where
    P: Platform + ?Sized,
    K: KernelPort,
    F: FnOnce(&mut Scheduler<K>) -> KernelResult<()>,
{
    kernel_log!("Booting...");
    kernel_log!("{} version {}", K_KERNEL_NAME, K_KERNEL_VERSION);

    let l_mcu = Mcu::init(p_platform, p_mcu_config).map_err(|l_err| {
        let l_err = KernelError::HalError(l_err);
        errors_mgt::report(&l_err);
        l_err
    })?;
    kernel_log!("Core frequency is {} MHz", l_mcu.core_clock_hz / 1_000_000);

    p_init_apps(p_scheduler)?;
    kernel_log!("Kernel ready !");

    p_scheduler.start()
}
