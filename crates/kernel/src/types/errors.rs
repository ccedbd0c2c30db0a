use crate::KernelError::{
    AppNotInitialized, HalError, InvalidArgument, SchedulerAlreadyStarted, SchedulerReturned,
    TaskCreateFailed, TimerCreateFailed, TimerStartFailed,
};
use crate::KernelErrorLevel::{Critical, Error, Fatal};
use crate::port::PortError;
use core::fmt::Write;
use hal_interface::{HalError as HalErrorDef, HalErrorLevel};
use heapless::String;

pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Debug, Clone, Copy, PartialOrd, PartialEq)]
pub enum KernelErrorLevel {
    Error,
    Critical,
    Fatal,
}

impl KernelErrorLevel {
    pub fn as_str(&self) -> &str {
        match self {
            Fatal => "Fatal error : ",
            Critical => "Critical error : ",
            Error => "Error : ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelError {
    HalError(HalErrorDef),
    InvalidArgument(&'static str),
    TaskCreateFailed(&'static str, PortError),
    TimerCreateFailed(&'static str, PortError),
    TimerStartFailed(&'static str, PortError),
    SchedulerAlreadyStarted,
    SchedulerReturned,
    AppNotInitialized(&'static str),
}

impl KernelError {
    pub fn to_string(&self) -> String<256> {
        let mut l_msg = String::new();
        if let HalError(l_e) = self {
            return l_e.to_string();
        }

        let _ = l_msg.push_str(self.severity().as_str());
        let _ = match self {
            HalError(_) => Ok(()),
            InvalidArgument(l_err) => write!(l_msg, "Invalid argument : {}", l_err),
            TaskCreateFailed(l_name, l_err) => {
                write!(l_msg, "Cannot create task {} : {}", l_name, l_err.as_str())
            }
            TimerCreateFailed(l_name, l_err) => {
                write!(l_msg, "Cannot create timer {} : {}", l_name, l_err.as_str())
            }
            TimerStartFailed(l_name, l_err) => {
                write!(l_msg, "Cannot start timer {} : {}", l_name, l_err.as_str())
            }
            SchedulerAlreadyStarted => write!(l_msg, "Scheduler is already started"),
            SchedulerReturned => write!(
                l_msg,
                "Scheduler returned, not enough kernel heap for the idle and timer tasks"
            ),
            AppNotInitialized(l_name) => write!(l_msg, "App {} is not initialized", l_name),
        };
        l_msg
    }

    /// Returns the severity level of the kernel error.
    pub fn severity(&self) -> KernelErrorLevel {
        match self {
            HalError(l_err) => match l_err.severity() {
                HalErrorLevel::Fatal => Fatal,
                HalErrorLevel::Critical => Critical,
                HalErrorLevel::Error => Error,
            },
            InvalidArgument(_) => Error,
            TaskCreateFailed(..) => Critical,
            TimerCreateFailed(..) => Critical,
            TimerStartFailed(..) => Critical,
            SchedulerAlreadyStarted => Error,
            SchedulerReturned => Fatal,
            AppNotInitialized(_) => Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_exhaustion_is_critical() {
        let l_err = TimerCreateFailed("LED timer", PortError::OutOfMemory);
        assert_eq!(l_err.severity(), Critical);
        assert_eq!(
            l_err.to_string().as_str(),
            "Critical error : Cannot create timer LED timer : kernel heap exhausted"
        );
    }

    #[test]
    fn hal_errors_keep_their_own_message_and_level() {
        let l_err = HalError(HalErrorDef::InitStepFailed("board_init"));
        assert_eq!(l_err.severity(), Fatal);
        assert!(l_err.to_string().starts_with("HAL Fatal error : "));
    }

    #[test]
    fn scheduler_return_is_fatal() {
        assert_eq!(SchedulerReturned.severity(), Fatal);
        assert!(SchedulerReturned.to_string().starts_with("Fatal error : "));
    }
}
