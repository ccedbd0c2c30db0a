//! Error/exception management for the kernel.
//!
//! This module provides:
//! - `report`, used by every kernel entry point to log a `KernelError` with its severity.
//! - `halt`, the policy for unrecoverable kernel integrity failures: disable interrupts, log
//!   the cause and stop forever.
//! - `assertion_trap`, which parks the CPU on a failed kernel assertion until a debugger
//!   releases it.
//! - `idle_forever`, the fail-safe loop entered when the firmware cannot start the scheduler.
//! - A `HardFault` exception handler that prints the exception frame over semihosting.

use core::cell::Cell;
use core::fmt::Display;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::hooks::AssertLocation;
use crate::{KernelError, kernel_log};

/// Release flag of the assertion trap. Write a non-zero value from the debugger to resume.
#[unsafe(no_mangle)]
pub static G_ASSERT_RELEASE: AtomicBool = AtomicBool::new(false);

/// Location of the last failed kernel assertion, kept for post-mortem inspection.
static G_LAST_ASSERTION: Mutex<Cell<Option<AssertLocation>>> = Mutex::new(Cell::new(None));

/// Set once `halt` masked interrupts on hosted builds.
#[cfg(not(target_os = "none"))]
static G_IRQ_MASKED: AtomicBool = AtomicBool::new(false);

/// Reason for a fatal halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalCause<'a> {
    MallocFailed,
    StackOverflow(&'a str),
}

impl Display for FatalCause<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FatalCause::MallocFailed => write!(f, "kernel heap allocation failed"),
            FatalCause::StackOverflow(l_name) => write!(f, "stack overflow in task {}", l_name),
        }
    }
}

/// Logs a kernel error prefixed with its severity.
pub fn report(p_err: &KernelError) {
    kernel_log!("{}", p_err.to_string().as_str());
}

/// Stops the system after an unrecoverable kernel failure.
///
/// Interrupts are disabled before anything else, so no task or handler runs once the failure
/// is detected. On target the CPU then spins forever so the state can be inspected with a
/// debugger. Hosted builds panic with the cause instead.
pub fn halt(p_cause: FatalCause<'_>) -> ! {
    mask_interrupts();
    kernel_log!("System halted : {}", p_cause);
    halt_cpu(p_cause)
}

#[cfg(target_os = "none")]
fn mask_interrupts() {
    cortex_m::interrupt::disable();
}

#[cfg(not(target_os = "none"))]
fn mask_interrupts() {
    G_IRQ_MASKED.store(true, Ordering::SeqCst);
}

/// Tells whether `halt` masked interrupts.
#[cfg(not(target_os = "none"))]
pub fn interrupts_masked() -> bool {
    G_IRQ_MASKED.load(Ordering::SeqCst)
}

#[cfg(target_os = "none")]
fn halt_cpu(_p_cause: FatalCause<'_>) -> ! {
    #[allow(clippy::empty_loop)]
    loop {}
}

#[cfg(not(target_os = "none"))]
fn halt_cpu(p_cause: FatalCause<'_>) -> ! {
    panic!("kernel halted : {}", p_cause)
}

/// Endless loop entered when the firmware fails to boot.
///
/// Interrupts are left untouched, the CPU simply never goes further.
pub fn idle_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Traps a failed kernel assertion until [`G_ASSERT_RELEASE`] is set.
pub fn assertion_trap(p_location: AssertLocation) {
    G_ASSERT_RELEASE.store(false, Ordering::SeqCst);
    trap_until_released(p_location, &G_ASSERT_RELEASE);
}

/// Records `location`, then spins inside a critical section until `release` is set.
pub fn trap_until_released(p_location: AssertLocation, p_release: &AtomicBool) {
    critical_section::with(|cs| G_LAST_ASSERTION.borrow(cs).set(Some(p_location)));
    kernel_log!(
        "Assertion failed in {} at line {}",
        p_location.file,
        p_location.line
    );

    with_interrupts_masked(|| {
        while !p_release.load(Ordering::SeqCst) {
            core::hint::spin_loop();
        }
    });
}

/// Returns the location of the last failed kernel assertion.
pub fn last_assertion() -> Option<AssertLocation> {
    critical_section::with(|cs| G_LAST_ASSERTION.borrow(cs).get())
}

#[cfg(target_os = "none")]
fn with_interrupts_masked<R>(p_f: impl FnOnce() -> R) -> R {
    cortex_m::interrupt::free(|_| p_f())
}

// The host has no interrupts to mask, and the releasing thread must keep running.
#[cfg(not(target_os = "none"))]
fn with_interrupts_masked<R>(p_f: impl FnOnce() -> R) -> R {
    p_f()
}

#[cfg(target_os = "none")]
mod fault {
    use cortex_m_rt::{ExceptionFrame, exception};
    use cortex_m_semihosting::hprintln;

    /// Cortex-M HardFault exception handler.
    ///
    /// Prints the CPU-provided exception frame, then loops forever.
    #[exception]
    unsafe fn HardFault(ef: &ExceptionFrame) -> ! {
        hprintln!("{:#?}", ef);

        #[allow(clippy::empty_loop)]
        loop {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fatal_causes_read_well() {
        let mut l_text = std::string::String::new();
        use std::fmt::Write;
        write!(l_text, "{}", FatalCause::StackOverflow("LED")).unwrap();
        assert_eq!(l_text, "stack overflow in task LED");
    }

    #[test]
    #[should_panic(expected = "kernel halted : kernel heap allocation failed")]
    fn halt_never_returns() {
        halt(FatalCause::MallocFailed);
    }

    #[test]
    fn halt_masks_interrupts() {
        let l_result = std::panic::catch_unwind(|| halt(FatalCause::StackOverflow("LED")));

        assert!(l_result.is_err());
        assert!(interrupts_masked());
    }

    #[test]
    fn assertion_trap_resumes_once_released() {
        static L_RELEASE: AtomicBool = AtomicBool::new(false);
        let l_location = AssertLocation {
            file: "tasks.c",
            line: 1234,
        };

        let l_debugger = thread::spawn(|| {
            thread::sleep(Duration::from_millis(20));
            L_RELEASE.store(true, Ordering::SeqCst);
        });

        trap_until_released(l_location, &L_RELEASE);
        l_debugger.join().unwrap();

        assert!(L_RELEASE.load(Ordering::SeqCst));
        assert_eq!(last_assertion(), Some(l_location));
    }
}
