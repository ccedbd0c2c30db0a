//! Boundary between the scheduler facade and a concrete kernel.
//!
//! A port exposes the raw kernel primitives (task create/delete, timer create/start, scheduler
//! start) without any argument checking. [`crate::Scheduler`] validates every request before
//! reaching a port.

#[cfg(target_os = "none")]
pub mod freertos;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

use crate::hooks::LifecycleObserver;
use crate::{KernelResult, TickRate, Ticks};

/// Task entry function. Receives the parameter given at creation.
pub type TaskEntry = fn(u32) -> KernelResult<()>;

/// Timer expiry callback. Runs in the kernel timer service task and must not block.
pub type TimerCallback = fn() -> KernelResult<()>;

/// Port-level identifier of a kernel task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTask(pub usize);

/// Port-level identifier of a kernel timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTimer(pub usize);

/// Task stack size, in stack words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackDepth(pub u16);

/// Task scheduling priority, 0 being the idle priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Priority {
    pub const IDLE: Priority = Priority(0);
}

/// Checked task parameters handed to a port.
#[derive(Clone, Copy)]
pub struct TaskSpec {
    pub name: &'static str,
    pub entry: TaskEntry,
    pub param: u32,
    pub stack_depth: StackDepth,
    pub priority: Priority,
}

/// Checked timer parameters handed to a port.
#[derive(Clone, Copy)]
pub struct TimerSpec {
    pub name: &'static str,
    pub period: Ticks,
    pub auto_reload: bool,
    pub callback: TimerCallback,
}

/// Failure reported by a kernel primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The kernel heap cannot hold the new object.
    OutOfMemory,
    /// The timer command queue is full.
    QueueFull,
    /// The port has no free slot to bind the Rust callback.
    SlotsExhausted,
    /// The raw handle does not name an object created by this port.
    UnknownHandle,
}

impl PortError {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortError::OutOfMemory => "kernel heap exhausted",
            PortError::QueueFull => "timer command queue full",
            PortError::SlotsExhausted => "no free callback slot",
            PortError::UnknownHandle => "unknown kernel object",
        }
    }
}

/// Raw kernel primitives.
pub trait KernelPort {
    /// Installs the observer called from the kernel hooks.
    fn register_observer(&mut self, observer: &'static dyn LifecycleObserver);

    /// Frequency of the kernel tick.
    fn tick_rate(&self) -> TickRate;

    /// Number of priority levels, valid priorities are `0..max_priorities`.
    fn max_priorities(&self) -> u8;

    /// Creates a ready task.
    ///
    /// A task whose entry returns deletes itself, but its `RawTask` stays reserved until
    /// [`KernelPort::task_delete`] is called with it: the id is never given to another task
    /// while a caller may still hold it.
    fn task_create(&mut self, spec: &TaskSpec) -> Result<RawTask, PortError>;

    /// Deletes a task and releases its id. The kernel frees its memory later, from the idle
    /// task.
    fn task_delete(&mut self, task: RawTask);

    /// Creates a dormant timer, without any user context.
    fn timer_create(&mut self, spec: &TimerSpec) -> Result<RawTimer, PortError>;

    /// Starts a timer, waiting at most `block` ticks for room in the command queue.
    fn timer_start(&mut self, timer: RawTimer, block: Ticks) -> Result<(), PortError>;

    /// Runs the kernel scheduler.
    ///
    /// Never returns when the kernel starts. Returning means the kernel could not allocate
    /// its own idle and timer service tasks.
    fn start_scheduler(&mut self);
}
