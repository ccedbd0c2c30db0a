use core::fmt::Display;

/// A duration in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Milliseconds(pub u32);

impl Display for Milliseconds {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ms", self.0)
    }
}

impl Milliseconds {
    pub fn to_u32(&self) -> u32 {
        self.0
    }

    /// Converts the duration to kernel ticks at the given tick rate.
    ///
    /// # Returns
    /// - `Some(Ticks)` with `ms * hz / 1000`, rounded down.
    /// - `None` if the duration is shorter than one tick or does not fit a tick counter.
    pub fn to_ticks(&self, rate: TickRate) -> Option<Ticks> {
        let l_ticks = self.0 as u64 * rate.0 as u64 / 1000;
        if l_ticks == 0 || l_ticks > u32::MAX as u64 {
            None
        } else {
            Some(Ticks(l_ticks as u32))
        }
    }
}

/// A duration in kernel ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticks(pub u32);

impl Ticks {
    /// Zero wait time, used for calls that must not block.
    pub const ZERO: Ticks = Ticks(0);

    pub fn to_u32(&self) -> u32 {
        self.0
    }
}

impl Display for Ticks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ticks", self.0)
    }
}

/// Frequency of the kernel tick interrupt, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate(pub u32);

impl Display for TickRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}
