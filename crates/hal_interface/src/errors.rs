//! This module defines the `HalError` and `HalErrorLevel` enumerations and their associated
//! functionality. It provides a structured way to represent hardware initialization errors
//! with different severity levels and format them for the system log.

use crate::HalError::{
    ClockMismatch, InitStepFailed, InvalidCpuPrescaler, InvalidPllDivider, InvalidPllMultiplier,
    InvalidPriorityGrouping, OutputNotFound, PllInputOutOfRange, PllOutputOutOfRange,
};
use crate::HalErrorLevel::{Critical, Error, Fatal};
use core::fmt::Write;
use heapless::String;

pub type HalResult<T> = Result<T, HalError>;

/// Represents the severity levels of hardware abstraction layer (HAL) errors.
///
/// - `Fatal`: the MCU cannot be brought up, the firmware must not go further.
/// - `Critical`: a configuration value is unusable, initialization is aborted.
/// - `Error`: a single operation failed, the system keeps running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HalErrorLevel {
    Fatal,
    Critical,
    Error,
}

impl HalErrorLevel {
    /// Returns the prefix used when printing an error of this level.
    pub fn as_str(&self) -> &str {
        match self {
            Fatal => "HAL Fatal error : ",
            Critical => "HAL Critical error : ",
            Error => "HAL Error : ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HalError {
    InvalidPllDivider(u32),
    InvalidPllMultiplier(u32),
    PllInputOutOfRange(u32),
    PllOutputOutOfRange(u32),
    InvalidCpuPrescaler(u32),
    InvalidPriorityGrouping(u8),
    ClockMismatch(u32, u32),
    InitStepFailed(&'static str),
    OutputNotFound(u8),
}

impl HalError {
    /// Converts the error into a printable message prefixed with its severity.
    ///
    /// The message is truncated if it does not fit in 256 bytes.
    pub fn to_string(&self) -> String<256> {
        let mut l_msg = String::new();
        let _ = l_msg.push_str(self.severity().as_str());
        let _ = match self {
            InvalidPllDivider(l_div) => write!(l_msg, "PLL divider {} is out of range", l_div),
            InvalidPllMultiplier(l_mul) => {
                write!(l_msg, "PLL multiplier {} is out of range", l_mul)
            }
            PllInputOutOfRange(l_hz) => {
                write!(l_msg, "PLL input frequency {} Hz is out of range", l_hz)
            }
            PllOutputOutOfRange(l_hz) => {
                write!(l_msg, "PLL output frequency {} Hz is out of range", l_hz)
            }
            InvalidCpuPrescaler(l_pres) => {
                write!(l_msg, "CPU prescaler {} is not supported", l_pres)
            }
            InvalidPriorityGrouping(l_group) => {
                write!(l_msg, "Priority grouping {} does not exist", l_group)
            }
            ClockMismatch(l_expected, l_actual) => write!(
                l_msg,
                "Core clock is {} Hz, configuration expects {} Hz",
                l_actual, l_expected
            ),
            InitStepFailed(l_step) => write!(l_msg, "Initialization step {} failed", l_step),
            OutputNotFound(l_pin) => write!(l_msg, "Digital output {} does not exist", l_pin),
        };
        l_msg
    }

    /// Returns the severity level of the error.
    pub fn severity(&self) -> HalErrorLevel {
        match self {
            InvalidPllDivider(_) => Critical,
            InvalidPllMultiplier(_) => Critical,
            PllInputOutOfRange(_) => Critical,
            PllOutputOutOfRange(_) => Critical,
            InvalidCpuPrescaler(_) => Critical,
            InvalidPriorityGrouping(_) => Critical,
            ClockMismatch(..) => Fatal,
            InitStepFailed(_) => Fatal,
            OutputNotFound(_) => Error,
        }
    }
}
