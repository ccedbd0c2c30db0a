//! Scheduler facade.
//!
//! Thin, checked creation and deletion of tasks and timers on top of a preemptive kernel
//! reached through a [`KernelPort`]. Requests are validated before any kernel primitive is
//! called, kernel failures are reported and returned to the caller, never retried.

use core::convert::Infallible;

use crate::KernelError::{
    InvalidArgument, SchedulerAlreadyStarted, SchedulerReturned, TaskCreateFailed,
    TimerCreateFailed, TimerStartFailed,
};
use crate::hooks::LifecycleObserver;
use crate::port::{
    KernelPort, Priority, RawTask, RawTimer, StackDepth, TaskEntry, TaskSpec, TimerCallback,
    TimerSpec,
};
use crate::{KernelError, KernelResult, Milliseconds, Ticks, errors_mgt, kernel_log};

/// Stack depth given to tasks that do not ask for a specific one.
pub const K_DEFAULT_TASK_STACK_DEPTH: StackDepth = StackDepth(64);

/// Timer commands are posted without waiting for room in the command queue.
const K_TIMER_COMMAND_BLOCK: Ticks = Ticks::ZERO;

/// Task creation request.
///
/// Name and entry are optional so that an incomplete request can be expressed and rejected.
/// Stack depth and priority default to [`K_DEFAULT_TASK_STACK_DEPTH`] and [`Priority::IDLE`].
#[derive(Clone, Copy)]
pub struct TaskRequest {
    pub name: Option<&'static str>,
    pub entry: Option<TaskEntry>,
    pub param: u32,
    pub stack_depth: StackDepth,
    pub priority: Priority,
}

impl TaskRequest {
    pub fn new(p_name: Option<&'static str>, p_entry: Option<TaskEntry>, p_param: u32) -> Self {
        Self {
            name: p_name,
            entry: p_entry,
            param: p_param,
            stack_depth: K_DEFAULT_TASK_STACK_DEPTH,
            priority: Priority::IDLE,
        }
    }

    pub fn with_stack_depth(mut self, p_depth: StackDepth) -> Self {
        self.stack_depth = p_depth;
        self
    }

    pub fn with_priority(mut self, p_priority: Priority) -> Self {
        self.priority = p_priority;
        self
    }
}

/// Timer creation request.
#[derive(Clone, Copy)]
pub struct TimerRequest {
    pub name: Option<&'static str>,
    pub period: Milliseconds,
    pub auto_reload: bool,
    pub callback: Option<TimerCallback>,
}

impl TimerRequest {
    pub fn new(
        p_name: Option<&'static str>,
        p_period: Milliseconds,
        p_auto_reload: bool,
        p_callback: Option<TimerCallback>,
    ) -> Self {
        Self {
            name: p_name,
            period: p_period,
            auto_reload: p_auto_reload,
            callback: p_callback,
        }
    }
}

/// Owner of a kernel task. Consumed by [`Scheduler::delete_task`].
#[derive(Debug, PartialEq)]
pub struct TaskHandle {
    raw: RawTask,
    name: &'static str,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn raw(&self) -> RawTask {
        self.raw
    }
}

/// Reference to a running kernel timer. Timers live as long as the firmware.
#[derive(Debug, PartialEq)]
pub struct TimerHandle {
    raw: RawTimer,
    name: &'static str,
    period: Ticks,
    auto_reload: bool,
}

impl TimerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn raw(&self) -> RawTimer {
        self.raw
    }

    /// Timer period, in kernel ticks.
    pub fn period(&self) -> Ticks {
        self.period
    }

    pub fn auto_reload(&self) -> bool {
        self.auto_reload
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Uninitialized,
    Running,
    /// The kernel could not start.
    Halted,
}

/// Checked access to the kernel scheduler.
pub struct Scheduler<K: KernelPort> {
    port: K,
    state: SchedulerState,
}

impl<K: KernelPort> Scheduler<K> {
    /// Builds the facade and registers `hooks` as the kernel lifecycle observer.
    pub fn new(mut p_port: K, p_hooks: &'static dyn LifecycleObserver) -> Self {
        p_port.register_observer(p_hooks);
        Self {
            port: p_port,
            state: SchedulerState::Uninitialized,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn port(&self) -> &K {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut K {
        &mut self.port
    }

    /// Creates a kernel task.
    ///
    /// # Errors
    /// - `InvalidArgument` if the name or entry is missing, the name is empty, the stack depth
    ///   is zero or the priority is out of range. The kernel is not called.
    /// - `TaskCreateFailed` if the kernel could not allocate the task.
    pub fn create_task(&mut self, p_request: &TaskRequest) -> KernelResult<TaskHandle> {
        let l_spec = self
            .check_task(p_request)
            .inspect_err(errors_mgt::report)?;

        match self.port.task_create(&l_spec) {
            Ok(l_raw) => Ok(TaskHandle {
                raw: l_raw,
                name: l_spec.name,
            }),
            Err(l_err) => Err(self.fail(TaskCreateFailed(l_spec.name, l_err))),
        }
    }

    /// Deletes a task. `None` is accepted and does nothing.
    ///
    /// The kernel releases the task memory later, from the idle task. A task whose entry
    /// returned has already deleted itself: the handle is still valid and only gives its id
    /// back.
    pub fn delete_task(&mut self, p_task: Option<TaskHandle>) {
        if let Some(l_task) = p_task {
            self.port.task_delete(l_task.raw);
        }
    }

    /// Creates a timer, then starts it without blocking.
    ///
    /// # Errors
    /// - `InvalidArgument` if the name or callback is missing, or if the period is zero or
    ///   shorter than one kernel tick. The kernel is not called.
    /// - `TimerCreateFailed` if the kernel could not allocate the timer. Start is not attempted.
    /// - `TimerStartFailed` if the start command could not be posted. The timer then stays
    ///   allocated and dormant: timers have no teardown path.
    pub fn create_timer(&mut self, p_request: &TimerRequest) -> KernelResult<TimerHandle> {
        let l_spec = self
            .check_timer(p_request)
            .inspect_err(errors_mgt::report)?;

        let l_raw = self
            .port
            .timer_create(&l_spec)
            .map_err(|l_err| self.fail(TimerCreateFailed(l_spec.name, l_err)))?;

        self.port
            .timer_start(l_raw, K_TIMER_COMMAND_BLOCK)
            .map_err(|l_err| self.fail(TimerStartFailed(l_spec.name, l_err)))?;

        Ok(TimerHandle {
            raw: l_raw,
            name: l_spec.name,
            period: l_spec.period,
            auto_reload: l_spec.auto_reload,
        })
    }

    /// Hands control to the kernel.
    ///
    /// Never returns once the kernel runs. A return means the kernel could not allocate its own
    /// idle and timer service tasks: the scheduler is then halted.
    pub fn start(&mut self) -> KernelResult<Infallible> {
        if self.state != SchedulerState::Uninitialized {
            return Err(self.fail(SchedulerAlreadyStarted));
        }

        self.state = SchedulerState::Running;
        kernel_log!("Scheduler started !");
        self.port.start_scheduler();

        self.state = SchedulerState::Halted;
        Err(self.fail(SchedulerReturned))
    }

    fn check_task(&self, p_request: &TaskRequest) -> KernelResult<TaskSpec> {
        let l_name = match p_request.name {
            Some(l_name) if !l_name.is_empty() => l_name,
            Some(_) => return Err(InvalidArgument("task name is empty")),
            None => return Err(InvalidArgument("task name is missing")),
        };
        let l_entry = p_request
            .entry
            .ok_or(InvalidArgument("task entry is missing"))?;

        if p_request.stack_depth.0 == 0 {
            return Err(InvalidArgument("task stack depth is zero"));
        }
        if p_request.priority.0 >= self.port.max_priorities() {
            return Err(InvalidArgument("task priority is out of range"));
        }

        Ok(TaskSpec {
            name: l_name,
            entry: l_entry,
            param: p_request.param,
            stack_depth: p_request.stack_depth,
            priority: p_request.priority,
        })
    }

    fn check_timer(&self, p_request: &TimerRequest) -> KernelResult<TimerSpec> {
        let l_name = p_request
            .name
            .ok_or(InvalidArgument("timer name is missing"))?;
        if p_request.period.to_u32() == 0 {
            return Err(InvalidArgument("timer period is zero"));
        }
        let l_callback = p_request
            .callback
            .ok_or(InvalidArgument("timer callback is missing"))?;
        let l_period = p_request
            .period
            .to_ticks(self.port.tick_rate())
            .ok_or(InvalidArgument("timer period does not fit the tick rate"))?;

        Ok(TimerSpec {
            name: l_name,
            period: l_period,
            auto_reload: p_request.auto_reload,
            callback: l_callback,
        })
    }

    fn fail(&self, p_err: KernelError) -> KernelError {
        errors_mgt::report(&p_err);
        p_err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::KernelHooks;
    use crate::port::PortError;
    use crate::port::sim::{K_SIM_START_HEAP_BYTES, KernelCall, SimConfig, SimKernel, SimTaskState};
    use crate::TickRate;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    static HOOKS: KernelHooks = KernelHooks::new();

    fn entry(_p_param: u32) -> KernelResult<()> {
        Ok(())
    }

    fn callback() -> KernelResult<()> {
        Ok(())
    }

    fn scheduler(p_config: SimConfig) -> Scheduler<SimKernel> {
        Scheduler::new(
            SimKernel::new(SimConfig {
                use_malloc_failed_hook: false,
                ..p_config
            }),
            &HOOKS,
        )
    }

    /// Calls made after the observer registration.
    fn kernel_calls(p_sched: &Scheduler<SimKernel>) -> &[KernelCall] {
        &p_sched.port().calls()[1..]
    }

    #[test]
    fn building_the_scheduler_registers_the_hooks() {
        let l_sched = scheduler(SimConfig::new());
        assert_eq!(l_sched.port().calls(), &[KernelCall::RegisterObserver]);
        assert_eq!(l_sched.state(), SchedulerState::Uninitialized);
    }

    #[test]
    fn incomplete_task_requests_never_reach_the_kernel() {
        let mut l_sched = scheduler(SimConfig::new());
        let l_requests = [
            TaskRequest::new(None, Some(entry), 0),
            TaskRequest::new(Some("worker"), None, 0),
            TaskRequest::new(None, None, 0),
            TaskRequest::new(Some(""), Some(entry), 0),
            TaskRequest::new(Some("worker"), Some(entry), 0).with_stack_depth(StackDepth(0)),
            TaskRequest::new(Some("worker"), Some(entry), 0).with_priority(Priority(5)),
        ];

        for l_request in l_requests.iter() {
            assert!(matches!(
                l_sched.create_task(l_request),
                Err(InvalidArgument(_))
            ));
        }
        assert!(kernel_calls(&l_sched).is_empty());
        assert_eq!(l_sched.port().heap_used(), 0);
    }

    #[test]
    fn task_is_created_with_requested_depth_and_priority() {
        let mut l_sched = scheduler(SimConfig::new());
        let l_default = l_sched
            .create_task(&TaskRequest::new(Some("worker"), Some(entry), 7))
            .unwrap();
        let l_custom = l_sched
            .create_task(
                &TaskRequest::new(Some("logger"), Some(entry), 0)
                    .with_stack_depth(StackDepth(128))
                    .with_priority(Priority(4)),
            )
            .unwrap();

        assert_eq!(l_default.name(), "worker");
        assert_ne!(l_default.raw(), l_custom.raw());
        assert_eq!(
            kernel_calls(&l_sched),
            &[
                KernelCall::TaskCreate {
                    name: "worker",
                    stack_depth: K_DEFAULT_TASK_STACK_DEPTH,
                    priority: Priority::IDLE,
                },
                KernelCall::TaskCreate {
                    name: "logger",
                    stack_depth: StackDepth(128),
                    priority: Priority(4),
                },
            ]
        );
    }

    #[test]
    fn task_allocation_failure_is_returned() {
        let mut l_sched = scheduler(SimConfig {
            heap_size: 32,
            ..SimConfig::new()
        });
        assert_eq!(
            l_sched.create_task(&TaskRequest::new(Some("worker"), Some(entry), 0)),
            Err(TaskCreateFailed("worker", PortError::OutOfMemory))
        );
        assert_eq!(kernel_calls(&l_sched).len(), 1);
    }

    #[test]
    fn deleting_no_task_calls_nothing() {
        let mut l_sched = scheduler(SimConfig::new());
        l_sched.delete_task(None);
        assert!(kernel_calls(&l_sched).is_empty());
    }

    #[test]
    fn deleting_a_task_calls_the_kernel_once() {
        let mut l_sched = scheduler(SimConfig::new());
        let l_task = l_sched
            .create_task(&TaskRequest::new(Some("worker"), Some(entry), 0))
            .unwrap();
        let l_raw = l_task.raw();

        l_sched.delete_task(Some(l_task));

        assert_eq!(kernel_calls(&l_sched)[1..], [KernelCall::TaskDelete(l_raw)]);
        assert!(l_sched.port().pending_cleanup() > 0);

        l_sched.port_mut().run_idle();
        assert_eq!(l_sched.port().heap_used(), 0);
    }

    #[test]
    fn invalid_timer_requests_never_reach_the_kernel() {
        let mut l_sched = scheduler(SimConfig {
            tick_rate: TickRate(100),
            ..SimConfig::new()
        });
        let l_requests = [
            TimerRequest::new(None, Milliseconds(1000), true, Some(callback)),
            TimerRequest::new(Some("timer"), Milliseconds(0), true, Some(callback)),
            TimerRequest::new(Some("timer"), Milliseconds(1000), true, None),
            TimerRequest::new(Some("timer"), Milliseconds(5), false, Some(callback)),
        ];

        for l_request in l_requests.iter() {
            assert!(matches!(
                l_sched.create_timer(l_request),
                Err(InvalidArgument(_))
            ));
        }
        assert!(kernel_calls(&l_sched).is_empty());
    }

    #[test]
    fn timer_is_created_then_started_without_blocking() {
        let mut l_sched = scheduler(SimConfig::new());
        let l_timer = l_sched
            .create_timer(&TimerRequest::new(
                Some("LED timer"),
                Milliseconds(1000),
                true,
                Some(callback),
            ))
            .unwrap();

        assert_eq!(l_timer.period(), Ticks(1000));
        assert!(l_timer.auto_reload());
        assert_eq!(
            kernel_calls(&l_sched),
            &[
                KernelCall::TimerCreate {
                    name: "LED timer",
                    period: Ticks(1000),
                    auto_reload: true,
                },
                KernelCall::TimerStart {
                    timer: l_timer.raw(),
                    block: Ticks::ZERO,
                },
            ]
        );
    }

    #[test]
    fn period_is_converted_with_the_kernel_tick_rate() {
        let mut l_sched = scheduler(SimConfig {
            tick_rate: TickRate(100),
            ..SimConfig::new()
        });
        let l_timer = l_sched
            .create_timer(&TimerRequest::new(
                Some("slow"),
                Milliseconds(250),
                false,
                Some(callback),
            ))
            .unwrap();
        assert_eq!(l_timer.period(), Ticks(25));
    }

    #[test]
    fn timer_is_not_started_when_creation_fails() {
        let mut l_sched = scheduler(SimConfig {
            heap_size: 16,
            ..SimConfig::new()
        });
        let l_result = l_sched.create_timer(&TimerRequest::new(
            Some("LED timer"),
            Milliseconds(1000),
            true,
            Some(callback),
        ));

        assert_eq!(
            l_result,
            Err(TimerCreateFailed("LED timer", PortError::OutOfMemory))
        );
        assert!(matches!(
            kernel_calls(&l_sched),
            [KernelCall::TimerCreate { .. }]
        ));
    }

    #[test]
    fn timer_start_failure_is_returned() {
        let mut l_sched = scheduler(SimConfig {
            timer_queue_length: 0,
            ..SimConfig::new()
        });
        let l_result = l_sched.create_timer(&TimerRequest::new(
            Some("LED timer"),
            Milliseconds(1000),
            true,
            Some(callback),
        ));

        assert_eq!(
            l_result,
            Err(TimerStartFailed("LED timer", PortError::QueueFull))
        );
        assert!(matches!(
            kernel_calls(&l_sched),
            [KernelCall::TimerCreate { .. }, KernelCall::TimerStart { .. }]
        ));
        // The dormant timer keeps its memory.
        assert!(l_sched.port().heap_used() > 0);
    }

    #[test]
    fn handle_of_a_finished_task_never_reaches_another_task() {
        let mut l_sched = scheduler(SimConfig {
            observation_window: Ticks(1),
            ..SimConfig::new()
        });
        let l_finished = l_sched
            .create_task(&TaskRequest::new(Some("oneshot"), Some(entry), 0))
            .unwrap();
        let _ = catch_unwind(AssertUnwindSafe(|| l_sched.start()));
        assert_eq!(
            l_sched.port().task_state(l_finished.raw()),
            Some(SimTaskState::Finished)
        );

        let l_worker = l_sched
            .create_task(&TaskRequest::new(Some("worker"), Some(entry), 0))
            .unwrap();
        assert_ne!(l_worker.raw(), l_finished.raw());

        let l_finished_raw = l_finished.raw();
        l_sched.delete_task(Some(l_finished));
        assert_eq!(
            l_sched.port().task_state(l_worker.raw()),
            Some(SimTaskState::Ready)
        );
        assert_eq!(l_sched.port().pending_cleanup(), 0);

        // Once deleted, the id is free again.
        let l_next = l_sched
            .create_task(&TaskRequest::new(Some("next"), Some(entry), 0))
            .unwrap();
        assert_eq!(l_next.raw(), l_finished_raw);
    }

    #[test]
    fn start_does_not_return_while_the_kernel_runs() {
        let mut l_sched = scheduler(SimConfig {
            observation_window: Ticks(50),
            ..SimConfig::new()
        });

        let l_result = catch_unwind(AssertUnwindSafe(|| l_sched.start()));

        assert!(l_result.is_err());
        assert_eq!(l_sched.state(), SchedulerState::Running);
        assert_eq!(l_sched.port().now(), 50);
        assert_eq!(kernel_calls(&l_sched), &[KernelCall::StartScheduler]);
    }

    #[test]
    fn start_halts_when_the_kernel_returns() {
        let mut l_sched = scheduler(SimConfig {
            heap_size: K_SIM_START_HEAP_BYTES - 1,
            ..SimConfig::new()
        });

        assert_eq!(l_sched.start(), Err(SchedulerReturned));
        assert_eq!(l_sched.state(), SchedulerState::Halted);

        assert_eq!(l_sched.start(), Err(SchedulerAlreadyStarted));
        assert_eq!(kernel_calls(&l_sched), &[KernelCall::StartScheduler]);
    }
}
