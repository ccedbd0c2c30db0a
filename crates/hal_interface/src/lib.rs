#![cfg_attr(not(test), no_std)]

#[cfg(target_os = "none")]
mod bindings;
mod clock;
mod errors;
mod platform;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

#[cfg(target_os = "none")]
pub use bindings::{AsfBoard, K_PARTEST_LED_COUNT};
pub use clock::*;
pub use errors::*;
pub use platform::*;
