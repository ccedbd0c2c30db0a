#![cfg_attr(target_os = "none", no_std, no_main)]

//! Blinky firmware entry point.
//!
//! On the board, initializes the hardware, registers the LED controller and hands control to
//! FreeRTOS. On a host, runs the same boot sequence against the simulated board and kernel.

#[cfg(target_os = "none")]
mod firmware {
    use cortex_m_rt::entry;
    use hal_interface::{AsfBoard, McuConfig, OutputPin};
    use kernel::port::freertos::FreeRtosPort;
    use kernel::{KERNEL_HOOKS, Scheduler, boot, errors_mgt, kernel_log};
    use kernel_apps::{AppResources, init_kernel_apps};
    use panic_semihosting as _;

    static G_BOARD: AsfBoard = AsfBoard::new();

    #[entry]
    fn main() -> ! {
        if let Some(l_port) = FreeRtosPort::take() {
            let mut l_scheduler = Scheduler::new(l_port, &KERNEL_HOOKS);
            let l_resources = AppResources {
                led_output: &G_BOARD,
                led_pin: OutputPin(0),
            };

            let l_err = boot(
                &G_BOARD,
                &McuConfig::arduino_due(),
                &mut l_scheduler,
                |l_sched| init_kernel_apps(l_sched, &l_resources),
            );
            kernel_log!("Boot failed ({:?}), system idle", l_err);
        }

        errors_mgt::idle_forever()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    use hal_interface::sim::SimBoard;
    use hal_interface::{McuConfig, OutputPin};
    use kernel::port::sim::{SimConfig, SimKernel};
    use kernel::{KERNEL_HOOKS, Scheduler, Ticks, boot};
    use kernel_apps::{AppResources, init_kernel_apps};

    static G_BOARD: SimBoard = SimBoard::new();
    const K_LED: OutputPin = OutputPin(0);

    fn window_elapsed() -> ! {
        println!(
            "LED toggled {} times, level is {}",
            G_BOARD.toggle_count(K_LED),
            if G_BOARD.level(K_LED) { "high" } else { "low" }
        );
        std::process::exit(0)
    }

    let mut l_scheduler = Scheduler::new(
        SimKernel::new(SimConfig {
            observation_window: Ticks(5_000),
            on_window_elapsed: window_elapsed,
            ..SimConfig::new()
        }),
        &KERNEL_HOOKS,
    );
    let l_resources = AppResources {
        led_output: &G_BOARD,
        led_pin: K_LED,
    };

    let l_err = boot(
        &G_BOARD,
        &McuConfig::arduino_due(),
        &mut l_scheduler,
        |l_sched| init_kernel_apps(l_sched, &l_resources),
    );
    eprintln!("{}", l_err.to_string());
    std::process::exit(1)
}
