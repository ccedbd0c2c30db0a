//! FreeRTOS kernel port.
//!
//! Binds the [`KernelPort`] primitives to the FreeRTOS kernel linked from the platform library,
//! and exports the hook functions FreeRTOS calls (`vApplication*Hook`, `assert_triggered`).
//!
//! Rust entry functions and callbacks cannot be handed to the kernel directly: each task or
//! timer is bound to a slot of a static table, and the kernel is given a C trampoline plus the
//! slot index (task parameter or timer ID).
//!
//! Constants below must match `config/FreeRTOSConfig.h`.

use core::cell::RefCell;
use core::ffi::{CStr, c_char, c_void};
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use cortex_m::interrupt::{self, Mutex};
use spin::Once;

use crate::hooks::{AssertLocation, KERNEL_HOOKS, LifecycleObserver};
use crate::port::{
    KernelPort, PortError, RawTask, RawTimer, TaskEntry, TaskSpec, TimerCallback, TimerSpec,
};
use crate::{TickRate, Ticks, errors_mgt};

/// `configTICK_RATE_HZ`
pub const K_TICK_RATE_HZ: u32 = 1000;
/// `configMAX_PRIORITIES`
pub const K_MAX_PRIORITIES: u8 = 5;
/// `configMAX_TASK_NAME_LEN`, terminating NUL included.
const K_NAME_LEN: usize = 16;

const K_MAX_TASKS: usize = 8;
const K_MAX_TIMERS: usize = 8;

type BaseType = i32;
type UBaseType = u32;
type TickType = u32;
type Handle = *mut c_void;

const PD_PASS: BaseType = 1;
const TMR_COMMAND_START: BaseType = 1;

unsafe extern "C" {
    fn xTaskCreate(
        pxTaskCode: extern "C" fn(*mut c_void),
        pcName: *const c_char,
        usStackDepth: u16,
        pvParameters: *mut c_void,
        uxPriority: UBaseType,
        pxCreatedTask: *mut Handle,
    ) -> BaseType;

    fn vTaskDelete(xTaskToDelete: Handle);

    fn xTimerCreate(
        pcTimerName: *const c_char,
        xTimerPeriodInTicks: TickType,
        uxAutoReload: UBaseType,
        pvTimerID: *mut c_void,
        pxCallbackFunction: extern "C" fn(Handle),
    ) -> Handle;

    fn xTimerGenericCommand(
        xTimer: Handle,
        xCommandID: BaseType,
        xOptionalValue: TickType,
        pxHigherPriorityTaskWoken: *mut BaseType,
        xTicksToWait: TickType,
    ) -> BaseType;

    fn xTaskGetTickCount() -> TickType;

    fn pvTimerGetTimerID(xTimer: Handle) -> *mut c_void;

    fn vTaskStartScheduler();
}

#[derive(Clone, Copy)]
struct TaskSlot {
    entry: TaskEntry,
    param: u32,
    handle: usize,
    /// The entry returned and the task deleted itself. The slot stays reserved until the
    /// owner of the `RawTask` deletes it, so the index cannot be handed to another task.
    finished: bool,
}

/// Timers keep a pointer to their name, the buffer lives here for the firmware lifetime.
#[derive(Clone, Copy)]
struct TimerSlot {
    callback: TimerCallback,
    handle: usize,
    name: [u8; K_NAME_LEN],
}

type TaskSlots = [Option<TaskSlot>; K_MAX_TASKS];
type TimerSlots = [Option<TimerSlot>; K_MAX_TIMERS];

// Shared with the timer service task, which preempts any application task: only accessed
// with interrupts masked.
static G_TASK_SLOTS: Mutex<RefCell<TaskSlots>> = Mutex::new(RefCell::new([None; K_MAX_TASKS]));
static G_TIMER_SLOTS: Mutex<RefCell<TimerSlots>> =
    Mutex::new(RefCell::new([None; K_MAX_TIMERS]));

static G_OBSERVER: Once<&'static dyn LifecycleObserver> = Once::new();
static G_PORT_TAKEN: AtomicBool = AtomicBool::new(false);

fn with_task_slots<R>(p_f: impl FnOnce(&mut TaskSlots) -> R) -> R {
    interrupt::free(|cs| p_f(&mut G_TASK_SLOTS.borrow(cs).borrow_mut()))
}

fn with_timer_slots<R>(p_f: impl FnOnce(&mut TimerSlots) -> R) -> R {
    interrupt::free(|cs| p_f(&mut G_TIMER_SLOTS.borrow(cs).borrow_mut()))
}

/// Copies `name` into a NUL-terminated buffer, truncated to the kernel name length.
fn c_name(p_name: &str) -> [u8; K_NAME_LEN] {
    let mut l_buf = [0u8; K_NAME_LEN];
    let l_len = p_name.len().min(K_NAME_LEN - 1);
    l_buf[..l_len].copy_from_slice(&p_name.as_bytes()[..l_len]);
    l_buf
}

fn observer() -> &'static dyn LifecycleObserver {
    match G_OBSERVER.get() {
        Some(l_observer) => *l_observer,
        None => &KERNEL_HOOKS,
    }
}

extern "C" fn task_trampoline(p_params: *mut c_void) {
    let l_index = p_params as usize;
    let l_slot = with_task_slots(|l_slots| l_slots[l_index]);

    if let Some(l_slot) = l_slot {
        if let Err(l_err) = (l_slot.entry)(l_slot.param) {
            errors_mgt::report(&l_err);
        }
    }

    // FreeRTOS tasks must never return from their entry.
    with_task_slots(|l_slots| {
        if let Some(l_slot) = l_slots[l_index].as_mut() {
            l_slot.finished = true;
        }
    });
    unsafe { vTaskDelete(ptr::null_mut()) };
}

extern "C" fn timer_trampoline(p_timer: Handle) {
    let l_index = unsafe { pvTimerGetTimerID(p_timer) } as usize;
    let l_callback = with_timer_slots(|l_slots| {
        l_slots
            .get(l_index)
            .copied()
            .flatten()
            .map(|l_slot| l_slot.callback)
    });

    if let Some(l_callback) = l_callback {
        if let Err(l_err) = l_callback() {
            errors_mgt::report(&l_err);
        }
    }
}

/// Access to the FreeRTOS kernel.
pub struct FreeRtosPort {
    _private: (),
}

impl FreeRtosPort {
    /// Returns the port, only once.
    pub fn take() -> Option<Self> {
        if G_PORT_TAKEN.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self { _private: () })
        }
    }

    /// Current kernel tick count.
    pub fn now(&self) -> Ticks {
        Ticks(unsafe { xTaskGetTickCount() })
    }
}

impl KernelPort for FreeRtosPort {
    fn register_observer(&mut self, p_observer: &'static dyn LifecycleObserver) {
        G_OBSERVER.call_once(|| p_observer);
    }

    fn tick_rate(&self) -> TickRate {
        TickRate(K_TICK_RATE_HZ)
    }

    fn max_priorities(&self) -> u8 {
        K_MAX_PRIORITIES
    }

    fn task_create(&mut self, p_spec: &TaskSpec) -> Result<RawTask, PortError> {
        // The slot is filled before creation, the task may run before xTaskCreate returns.
        let l_index = with_task_slots(|l_slots| {
            let l_index = l_slots
                .iter()
                .position(Option::is_none)
                .ok_or(PortError::SlotsExhausted)?;
            l_slots[l_index] = Some(TaskSlot {
                entry: p_spec.entry,
                param: p_spec.param,
                handle: 0,
                finished: false,
            });
            Ok(l_index)
        })?;

        let l_name = c_name(p_spec.name);
        let mut l_handle: Handle = ptr::null_mut();
        let l_result = unsafe {
            xTaskCreate(
                task_trampoline,
                l_name.as_ptr() as *const c_char,
                p_spec.stack_depth.0,
                l_index as *mut c_void,
                p_spec.priority.0 as UBaseType,
                &mut l_handle,
            )
        };

        with_task_slots(|l_slots| {
            if l_result != PD_PASS {
                l_slots[l_index] = None;
                return Err(PortError::OutOfMemory);
            }
            if let Some(l_slot) = l_slots[l_index].as_mut() {
                l_slot.handle = l_handle as usize;
            }
            Ok(RawTask(l_index))
        })
    }

    fn task_delete(&mut self, p_task: RawTask) {
        let l_slot = with_task_slots(|l_slots| l_slots.get_mut(p_task.0).and_then(Option::take));

        // A finished task already deleted itself, only its slot is released.
        if let Some(l_slot) = l_slot {
            if !l_slot.finished {
                unsafe { vTaskDelete(l_slot.handle as Handle) };
            }
        }
    }

    fn timer_create(&mut self, p_spec: &TimerSpec) -> Result<RawTimer, PortError> {
        let (l_index, l_name) = with_timer_slots(|l_slots| {
            let l_index = l_slots
                .iter()
                .position(Option::is_none)
                .ok_or(PortError::SlotsExhausted)?;
            let l_slot = l_slots[l_index].insert(TimerSlot {
                callback: p_spec.callback,
                handle: 0,
                name: c_name(p_spec.name),
            });
            Ok((l_index, l_slot.name.as_ptr()))
        })?;

        let l_handle = unsafe {
            xTimerCreate(
                l_name as *const c_char,
                p_spec.period.0,
                p_spec.auto_reload as UBaseType,
                l_index as *mut c_void,
                timer_trampoline,
            )
        };

        with_timer_slots(|l_slots| {
            if l_handle.is_null() {
                l_slots[l_index] = None;
                return Err(PortError::OutOfMemory);
            }
            if let Some(l_slot) = l_slots[l_index].as_mut() {
                l_slot.handle = l_handle as usize;
            }
            Ok(RawTimer(l_index))
        })
    }

    /// A timer whose start command cannot be posted stays allocated and dormant: timers
    /// have no teardown path.
    fn timer_start(&mut self, p_timer: RawTimer, p_block: Ticks) -> Result<(), PortError> {
        let l_handle = with_timer_slots(|l_slots| {
            l_slots
                .get(p_timer.0)
                .copied()
                .flatten()
                .map(|l_slot| l_slot.handle as Handle)
        })
        .ok_or(PortError::UnknownHandle)?;

        let l_result = unsafe {
            xTimerGenericCommand(
                l_handle,
                TMR_COMMAND_START,
                xTaskGetTickCount(),
                ptr::null_mut(),
                p_block.0,
            )
        };

        if l_result == PD_PASS {
            Ok(())
        } else {
            Err(PortError::QueueFull)
        }
    }

    fn start_scheduler(&mut self) {
        unsafe { vTaskStartScheduler() };
    }
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn vApplicationMallocFailedHook() {
    observer().on_malloc_failed()
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn vApplicationStackOverflowHook(_p_task: Handle, p_task_name: *const c_char) {
    let l_name = if p_task_name.is_null() {
        "?"
    } else {
        unsafe { CStr::from_ptr(p_task_name) }
            .to_str()
            .unwrap_or("?")
    };
    observer().on_stack_overflow(l_name)
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn vApplicationIdleHook() {
    observer().on_idle();
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn vApplicationTickHook() {
    observer().on_tick();
}

/// Target of `configASSERT`.
#[unsafe(no_mangle)]
pub extern "C" fn assert_triggered(p_file: *const c_char, p_line: u32) {
    let l_file = if p_file.is_null() {
        "?"
    } else {
        unsafe { CStr::from_ptr(p_file) }.to_str().unwrap_or("?")
    };
    observer().on_assertion_failed(AssertLocation {
        file: l_file,
        line: p_line,
    });
}
