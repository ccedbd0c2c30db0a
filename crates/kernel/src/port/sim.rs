//! Simulated kernel port.
//!
//! `SimKernel` stands in for the RTOS on hosted builds. It records every primitive called
//! through [`KernelPort`], models the kernel heap the way a static-heap RTOS does (task control
//! block and stack per task, one block per timer, deleted tasks released by the idle task,
//! idle and timer service tasks allocated at start) and fires timer callbacks while simulated
//! ticks elapse.
//!
//! Ready task entries run once per tick, before due timers. An entry that returns finishes the
//! task: its memory goes back to the heap at the next idle pass, its id stays reserved until
//! the task is deleted.

use heapless::Vec;

use crate::errors_mgt;
use crate::hooks::LifecycleObserver;
use crate::port::{
    KernelPort, PortError, Priority, RawTask, RawTimer, StackDepth, TaskEntry, TaskSpec,
    TimerCallback, TimerSpec,
};
use crate::{TickRate, Ticks};

const K_SIM_MAX_TASKS: usize = 16;
const K_SIM_MAX_TIMERS: usize = 8;
const K_SIM_MAX_CALLS: usize = 64;

const K_SIM_WORD_BYTES: usize = 4;
const K_SIM_TCB_BYTES: usize = 96;
const K_SIM_TIMER_BYTES: usize = 48;
const K_SIM_IDLE_STACK_DEPTH: usize = 130;
const K_SIM_TIMER_TASK_STACK_DEPTH: usize = 260;

/// Heap taken by the idle and timer service tasks when the scheduler starts.
pub const K_SIM_START_HEAP_BYTES: usize = 2 * K_SIM_TCB_BYTES
    + (K_SIM_IDLE_STACK_DEPTH + K_SIM_TIMER_TASK_STACK_DEPTH) * K_SIM_WORD_BYTES;

/// One primitive call received by the simulated kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelCall {
    RegisterObserver,
    TaskCreate {
        name: &'static str,
        stack_depth: StackDepth,
        priority: Priority,
    },
    TaskDelete(RawTask),
    TimerCreate {
        name: &'static str,
        period: Ticks,
        auto_reload: bool,
    },
    TimerStart {
        timer: RawTimer,
        block: Ticks,
    },
    StartScheduler,
}

/// Simulated kernel configuration.
#[derive(Clone, Copy)]
pub struct SimConfig {
    /// Size of the kernel heap, in bytes.
    pub heap_size: usize,
    pub tick_rate: TickRate,
    pub max_priorities: u8,
    /// Number of timer commands that can wait for the timer service task.
    pub timer_queue_length: usize,
    /// Ticks simulated once the scheduler is running.
    pub observation_window: Ticks,
    /// Called when the observation window has elapsed. The scheduler never returns once
    /// started, so neither does this.
    pub on_window_elapsed: fn() -> !,
    /// Calls the malloc-failed hook on allocation failure, as a kernel configured with it does.
    pub use_malloc_failed_hook: bool,
}

fn window_elapsed() -> ! {
    panic!("observation window elapsed")
}

impl SimConfig {
    pub const fn new() -> Self {
        Self {
            heap_size: 16 * 1024,
            tick_rate: TickRate(1000),
            max_priorities: 5,
            timer_queue_length: 5,
            observation_window: Ticks(10_000),
            on_window_elapsed: window_elapsed,
            use_malloc_failed_hook: true,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Life cycle of a simulated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimTaskState {
    /// Created, its entry has not returned yet.
    Ready,
    /// The entry returned and the task deleted itself.
    Finished,
}

struct SimTask {
    entry: TaskEntry,
    param: u32,
    bytes: usize,
    state: SimTaskState,
}

struct SimTimer {
    period: Ticks,
    auto_reload: bool,
    callback: TimerCallback,
    start_queued: bool,
    active: bool,
    expiry: u64,
    fired: u32,
}

/// Simulated kernel.
pub struct SimKernel {
    config: SimConfig,
    observer: Option<&'static dyn LifecycleObserver>,
    calls: Vec<KernelCall, K_SIM_MAX_CALLS>,
    tasks: Vec<Option<SimTask>, K_SIM_MAX_TASKS>,
    timers: Vec<SimTimer, K_SIM_MAX_TIMERS>,
    heap_used: usize,
    pending_free: usize,
    queued_commands: usize,
    running: bool,
    now: u64,
    callback_errors: u32,
    task_errors: u32,
}

impl SimKernel {
    pub const fn new(p_config: SimConfig) -> Self {
        Self {
            config: p_config,
            observer: None,
            calls: Vec::new(),
            tasks: Vec::new(),
            timers: Vec::new(),
            heap_used: 0,
            pending_free: 0,
            queued_commands: 0,
            running: false,
            now: 0,
            callback_errors: 0,
            task_errors: 0,
        }
    }

    /// Primitive calls received so far, oldest first.
    pub fn calls(&self) -> &[KernelCall] {
        &self.calls
    }

    /// Kernel heap currently allocated, in bytes.
    pub fn heap_used(&self) -> usize {
        self.heap_used
    }

    /// Heap held by deleted tasks until the idle task runs, in bytes.
    pub fn pending_cleanup(&self) -> usize {
        self.pending_free
    }

    /// Simulated tick count.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of times the callback of `timer` ran.
    pub fn timer_fire_count(&self, p_timer: RawTimer) -> u32 {
        self.timers.get(p_timer.0).map_or(0, |l_t| l_t.fired)
    }

    /// Number of timer callbacks that returned an error.
    pub fn callback_errors(&self) -> u32 {
        self.callback_errors
    }

    /// Number of task entries that returned an error.
    pub fn task_errors(&self) -> u32 {
        self.task_errors
    }

    /// State of `task`, `None` once deleted.
    pub fn task_state(&self, p_task: RawTask) -> Option<SimTaskState> {
        self.tasks
            .get(p_task.0)
            .and_then(Option::as_ref)
            .map(|l_task| l_task.state)
    }

    /// Runs one pass of the idle task: idle hook, then release of deleted tasks.
    pub fn run_idle(&mut self) {
        if let Some(l_observer) = self.observer {
            l_observer.on_idle();
        }
        self.heap_used -= self.pending_free;
        self.pending_free = 0;
    }

    /// Lets `ticks` kernel ticks elapse. Each tick runs the ready tasks, fires due timers,
    /// then runs the idle task.
    pub fn advance(&mut self, p_ticks: Ticks) {
        for _ in 0..p_ticks.0 {
            self.now += 1;
            if let Some(l_observer) = self.observer {
                l_observer.on_tick();
            }
            self.run_ready_tasks();
            self.fire_due_timers();
            self.run_idle();
        }
    }

    fn run_ready_tasks(&mut self) {
        for l_index in 0..self.tasks.len() {
            let (l_entry, l_param) = match &self.tasks[l_index] {
                Some(l_task) if l_task.state == SimTaskState::Ready => (l_task.entry, l_task.param),
                _ => continue,
            };

            if let Err(l_err) = l_entry(l_param) {
                self.task_errors += 1;
                errors_mgt::report(&l_err);
            }

            // Entries run to completion: the task deletes itself.
            if let Some(l_task) = self.tasks[l_index].as_mut() {
                l_task.state = SimTaskState::Finished;
                self.pending_free += l_task.bytes;
            }
        }
    }

    fn fire_due_timers(&mut self) {
        for l_index in 0..self.timers.len() {
            let l_callback = {
                let l_timer = &mut self.timers[l_index];
                if !l_timer.active || l_timer.expiry != self.now {
                    continue;
                }
                l_timer.fired += 1;
                if l_timer.auto_reload {
                    l_timer.expiry += l_timer.period.0 as u64;
                } else {
                    l_timer.active = false;
                }
                l_timer.callback
            };

            if let Err(l_err) = l_callback() {
                self.callback_errors += 1;
                errors_mgt::report(&l_err);
            }
        }
    }

    fn record(&mut self, p_call: KernelCall) {
        if self.calls.push(p_call).is_err() {
            panic!("kernel call log is full ({} calls)", K_SIM_MAX_CALLS);
        }
    }

    fn allocate(&mut self, p_bytes: usize) -> Result<(), PortError> {
        if self.heap_used + p_bytes > self.config.heap_size {
            if self.config.use_malloc_failed_hook {
                if let Some(l_observer) = self.observer {
                    l_observer.on_malloc_failed();
                }
            }
            return Err(PortError::OutOfMemory);
        }
        self.heap_used += p_bytes;
        Ok(())
    }

    fn activate(&mut self, p_index: usize) {
        let l_now = self.now;
        let l_timer = &mut self.timers[p_index];
        l_timer.start_queued = false;
        l_timer.active = true;
        l_timer.expiry = l_now + l_timer.period.0 as u64;
    }

    /// Allocates the idle and timer service tasks, then processes queued timer commands.
    fn launch(&mut self) -> bool {
        if self.allocate(K_SIM_START_HEAP_BYTES).is_err() {
            return false;
        }
        self.running = true;

        for l_index in 0..self.timers.len() {
            if self.timers[l_index].start_queued {
                self.activate(l_index);
            }
        }
        self.queued_commands = 0;
        true
    }
}

impl KernelPort for SimKernel {
    fn register_observer(&mut self, p_observer: &'static dyn LifecycleObserver) {
        self.record(KernelCall::RegisterObserver);
        self.observer = Some(p_observer);
    }

    fn tick_rate(&self) -> TickRate {
        self.config.tick_rate
    }

    fn max_priorities(&self) -> u8 {
        self.config.max_priorities
    }

    fn task_create(&mut self, p_spec: &TaskSpec) -> Result<RawTask, PortError> {
        self.record(KernelCall::TaskCreate {
            name: p_spec.name,
            stack_depth: p_spec.stack_depth,
            priority: p_spec.priority,
        });

        let l_free = self.tasks.iter().position(Option::is_none);
        if l_free.is_none() && self.tasks.is_full() {
            return Err(PortError::SlotsExhausted);
        }
        let l_bytes = K_SIM_TCB_BYTES + p_spec.stack_depth.0 as usize * K_SIM_WORD_BYTES;
        self.allocate(l_bytes)?;

        let l_task = SimTask {
            entry: p_spec.entry,
            param: p_spec.param,
            bytes: l_bytes,
            state: SimTaskState::Ready,
        };
        let l_id = match l_free {
            Some(l_id) => {
                self.tasks[l_id] = Some(l_task);
                l_id
            }
            None => {
                let l_id = self.tasks.len();
                if self.tasks.push(Some(l_task)).is_err() {
                    return Err(PortError::SlotsExhausted);
                }
                l_id
            }
        };
        Ok(RawTask(l_id))
    }

    fn task_delete(&mut self, p_task: RawTask) {
        self.record(KernelCall::TaskDelete(p_task));

        // A finished task already gave its memory back.
        if let Some(l_task) = self.tasks.get_mut(p_task.0).and_then(Option::take) {
            if l_task.state == SimTaskState::Ready {
                self.pending_free += l_task.bytes;
            }
        }
    }

    fn timer_create(&mut self, p_spec: &TimerSpec) -> Result<RawTimer, PortError> {
        self.record(KernelCall::TimerCreate {
            name: p_spec.name,
            period: p_spec.period,
            auto_reload: p_spec.auto_reload,
        });

        if self.timers.is_full() {
            return Err(PortError::SlotsExhausted);
        }
        self.allocate(K_SIM_TIMER_BYTES)?;

        let l_id = self.timers.len();
        let _ = self.timers.push(SimTimer {
            period: p_spec.period,
            auto_reload: p_spec.auto_reload,
            callback: p_spec.callback,
            start_queued: false,
            active: false,
            expiry: 0,
            fired: 0,
        });
        Ok(RawTimer(l_id))
    }

    fn timer_start(&mut self, p_timer: RawTimer, p_block: Ticks) -> Result<(), PortError> {
        self.record(KernelCall::TimerStart {
            timer: p_timer,
            block: p_block,
        });

        if p_timer.0 >= self.timers.len() {
            return Err(PortError::UnknownHandle);
        }

        if self.running {
            self.activate(p_timer.0);
        } else {
            if self.queued_commands >= self.config.timer_queue_length {
                return Err(PortError::QueueFull);
            }
            self.queued_commands += 1;
            self.timers[p_timer.0].start_queued = true;
        }
        Ok(())
    }

    fn start_scheduler(&mut self) {
        self.record(KernelCall::StartScheduler);

        if !self.launch() {
            return;
        }

        self.advance(self.config.observation_window);
        (self.config.on_window_elapsed)()
    }
}
