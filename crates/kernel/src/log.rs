//! Kernel console output.
//!
//! On target, lines go to the debugger console through semihosting. Hosted builds drop them.

use core::fmt::Arguments;

/// Writes one formatted line to the kernel console.
#[macro_export]
macro_rules! kernel_log {
    ($($arg:tt)*) => {
        $crate::log::write_line(format_args!($($arg)*))
    };
}

#[cfg(target_os = "none")]
pub fn write_line(p_args: Arguments<'_>) {
    cortex_m_semihosting::hprintln!("{}", p_args);
}

#[cfg(not(target_os = "none"))]
pub fn write_line(_p_args: Arguments<'_>) {}
