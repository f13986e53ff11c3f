//! Millisecond time sources for the inter-byte timeout.
//!
//! The receiver only needs a counter that increases monotonically and a
//! difference that survives the counter wrapping around. Timestamps are `u32`
//! milliseconds; a clock with a narrower counter overrides
//! [`Clock::ticks_diff`].

use core::cell::Cell;

/// Monotonic millisecond clock.
pub trait Clock {
    /// Current timestamp in milliseconds.
    fn now_ms(&self) -> u32;

    /// Milliseconds elapsed from `earlier` to `later`.
    ///
    /// The default handles wraparound of the full `u32` range.
    #[inline]
    fn ticks_diff(&self, later: u32, earlier: u32) -> u32 {
        ticks_diff(later, earlier)
    }
}

impl<K: Clock + ?Sized> Clock for &K {
    #[inline]
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }

    #[inline]
    fn ticks_diff(&self, later: u32, earlier: u32) -> u32 {
        (**self).ticks_diff(later, earlier)
    }
}

/// Wrap-safe difference of two `u32` millisecond timestamps.
#[inline]
#[must_use]
pub const fn ticks_diff(later: u32, earlier: u32) -> u32 {
    later.wrapping_sub(earlier)
}

/// A clock that only moves when told to.
///
/// Used for host simulations and tests.
///
/// ```
/// use serial_packer::{Clock, ManualClock};
///
/// let clock = ManualClock::new(100);
/// clock.advance(25);
/// assert_eq!(clock.now_ms(), 125);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`.
    #[must_use]
    pub const fn new(start_ms: u32) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    /// Set the current time.
    pub fn set(&self, now_ms: u32) {
        self.now.set(now_ms);
    }

    /// Move the clock forward, wrapping at `u32::MAX`.
    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

/// A 16-bit millisecond counter, as kept by small microcontrollers that only
/// store the low word of their tick count.
///
/// Wraps every 65.5 seconds; keep `max_idle_ms` well below that.
#[derive(Debug, Clone, Copy)]
pub struct Wrap16<K>(pub K);

impl<K: Clock> Clock for Wrap16<K> {
    #[inline]
    fn now_ms(&self) -> u32 {
        u32::from(self.0.now_ms() as u16)
    }

    #[inline]
    fn ticks_diff(&self, later: u32, earlier: u32) -> u32 {
        u32::from((later as u16).wrapping_sub(earlier as u16))
    }
}

/// Clock backed by [`std::time::Instant`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Create a clock whose zero is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u32 {
        // Truncation is fine, differences are taken modulo 2^32
        self.start.elapsed().as_millis() as u32
    }
}

/// Clock backed by the embassy time driver.
#[cfg(feature = "embassy-time")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy-time")]
impl Clock for EmbassyClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        embassy_time::Instant::now().as_millis() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_diff_plain() {
        assert_eq!(ticks_diff(150, 100), 50);
        assert_eq!(ticks_diff(100, 100), 0);
    }

    #[test]
    fn test_ticks_diff_across_wrap() {
        assert_eq!(ticks_diff(5, u32::MAX - 4), 10);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now_ms(), 10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set(3);
        assert_eq!(clock.now_ms(), 3);
    }

    #[test]
    fn test_manual_clock_through_reference() {
        let clock = ManualClock::new(0);
        let by_ref = &clock;
        clock.advance(7);
        assert_eq!(by_ref.now_ms(), 7);
        assert_eq!(by_ref.ticks_diff(7, 2), 5);
    }

    #[test]
    fn test_wrap16_diff() {
        let clock = Wrap16(ManualClock::new(0x0001_FFF0));
        assert_eq!(clock.now_ms(), 0xFFF0);
        clock.0.advance(0x20);
        assert_eq!(clock.now_ms(), 0x0010);
        assert_eq!(clock.ticks_diff(0x0010, 0xFFF0), 0x20);
    }
}
