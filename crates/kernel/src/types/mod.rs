mod errors;
mod time;

pub use errors::*;
pub use time::*;
