#![cfg_attr(not(test), no_std)]

pub mod log;

mod boot;
pub mod errors_mgt;
mod hooks;
mod ident;
pub mod port;
mod scheduler;
mod types;

pub use boot::boot;
pub use hooks::{AssertLocation, KERNEL_HOOKS, KernelHooks, LifecycleObserver};
pub use ident::{K_KERNEL_NAME, K_KERNEL_VERSION};
pub use port::{KernelPort, Priority, StackDepth, TaskEntry, TimerCallback};
pub use scheduler::{
    K_DEFAULT_TASK_STACK_DEPTH, Scheduler, SchedulerState, TaskHandle, TaskRequest,
    TimerHandle, TimerRequest,
};
pub use types::*;
