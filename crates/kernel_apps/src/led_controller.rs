use core::cell::Cell;

use critical_section::Mutex;
use hal_interface::{DigitalOutput, OutputPin};
use kernel::KernelError::{AppNotInitialized, HalError};
use kernel::{KernelPort, KernelResult, Milliseconds, Scheduler, TimerHandle, TimerRequest};

/// Name of the app, used in error reports.
pub const K_APP_NAME: &str = "led_controller";

/// Name of the kernel timer toggling the LED.
pub const K_LED_TIMER_NAME: &str = "LED timer";

/// Blink half-period.
pub const K_LED_TIMER_PERIOD: Milliseconds = Milliseconds(1000);

#[derive(Clone, Copy)]
struct LedBinding {
    output: &'static dyn DigitalOutput,
    pin: OutputPin,
}

/// LED driven by the timer callback. The level itself is held by the output peripheral.
///
/// Read from the timer service task, which preempts the task binding it: only accessed with
/// interrupts masked.
static G_LED: Mutex<Cell<Option<LedBinding>>> = Mutex::new(Cell::new(None));

fn bind(p_led: Option<LedBinding>) {
    critical_section::with(|cs| G_LED.borrow(cs).set(p_led));
}

fn bound_led() -> Option<LedBinding> {
    critical_section::with(|cs| G_LED.borrow(cs).get())
}

/// Binds the LED line and creates the auto-reload timer that toggles it.
///
/// # Errors
/// Returns the scheduler error if the timer cannot be created or started.
pub fn init<K: KernelPort>(
    p_scheduler: &mut Scheduler<K>,
    p_output: &'static dyn DigitalOutput,
    p_pin: OutputPin,
) -> KernelResult<TimerHandle> {
    bind(Some(LedBinding {
        output: p_output,
        pin: p_pin,
    }));

    p_scheduler.create_timer(&TimerRequest::new(
        Some(K_LED_TIMER_NAME),
        K_LED_TIMER_PERIOD,
        true,
        Some(led_timer_callback),
    ))
}

/// Toggles the LED. Runs in the kernel timer service task.
fn led_timer_callback() -> KernelResult<()> {
    let l_led = bound_led().ok_or(AppNotInitialized(K_APP_NAME))?;
    l_led.output.toggle(l_led.pin).map_err(HalError)
}

#[cfg(test)]
pub(crate) fn reset() {
    bind(None);
}
