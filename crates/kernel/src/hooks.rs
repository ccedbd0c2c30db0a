//! Kernel lifecycle hooks.
//!
//! The kernel calls back into the firmware on a few well-defined events. Instead of free
//! standing global callbacks, these events are grouped in the [`LifecycleObserver`] trait,
//! implemented once by [`KernelHooks`] and registered with the port when the
//! [`crate::Scheduler`] is built.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::errors_mgt::{self, FatalCause};

/// Source location of a failed kernel assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertLocation {
    pub file: &'static str,
    pub line: u32,
}

/// Events raised by the kernel.
pub trait LifecycleObserver: Sync {
    /// The kernel heap could not satisfy an allocation.
    fn on_malloc_failed(&self) -> !;

    /// The kernel detected a stack overflow in `task_name`.
    fn on_stack_overflow(&self, task_name: &str) -> !;

    /// Called on each pass of the idle task. Must return promptly and never block: the idle
    /// task frees the memory of deleted tasks after this hook returns.
    fn on_idle(&self);

    /// Called from the tick interrupt. Must never block.
    fn on_tick(&self);

    /// A kernel assertion failed.
    fn on_assertion_failed(&self, location: AssertLocation);
}

/// Firmware reaction to kernel events.
///
/// Allocation failures and stack overflows are unrecoverable: the system halts with
/// interrupts disabled. Failed assertions are trapped until released from a debugger.
pub struct KernelHooks {
    idle_passes: AtomicU32,
    ticks: AtomicU32,
}

/// The hooks instance registered by the firmware.
pub static KERNEL_HOOKS: KernelHooks = KernelHooks::new();

impl KernelHooks {
    pub const fn new() -> Self {
        Self {
            idle_passes: AtomicU32::new(0),
            ticks: AtomicU32::new(0),
        }
    }

    /// Number of ticks seen by the tick hook.
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Number of idle task passes seen by the idle hook.
    pub fn idle_passes(&self) -> u32 {
        self.idle_passes.load(Ordering::Relaxed)
    }
}

impl Default for KernelHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleObserver for KernelHooks {
    fn on_malloc_failed(&self) -> ! {
        errors_mgt::halt(FatalCause::MallocFailed)
    }

    fn on_stack_overflow(&self, p_task_name: &str) -> ! {
        errors_mgt::halt(FatalCause::StackOverflow(p_task_name))
    }

    fn on_idle(&self) {
        self.idle_passes.fetch_add(1, Ordering::Relaxed);
    }

    fn on_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    fn on_assertion_failed(&self, p_location: AssertLocation) {
        errors_mgt::assertion_trap(p_location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_and_tick_hooks_only_count() {
        let l_hooks = KernelHooks::new();
        l_hooks.on_tick();
        l_hooks.on_tick();
        l_hooks.on_idle();

        assert_eq!(l_hooks.ticks(), 2);
        assert_eq!(l_hooks.idle_passes(), 1);
    }

    #[test]
    #[should_panic(expected = "kernel heap allocation failed")]
    fn malloc_failure_halts() {
        KernelHooks::new().on_malloc_failed();
    }

    #[test]
    #[should_panic(expected = "stack overflow in task worker")]
    fn stack_overflow_halts_with_task_name() {
        KernelHooks::new().on_stack_overflow("worker");
    }
}
