//! Time source for every visibility decision made by the network.
//!
//! The queues never read the wall clock directly. Production-style harnesses
//! use [`SystemClock`]; tests that want full control over "now" use
//! [`VirtualClock`] and move it explicitly.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Abstracts "now" so visibility math is testable.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the network.
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use testbus::{Clock, VirtualClock};
///
/// let clock = VirtualClock::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
/// clock.advance(Duration::seconds(5));
/// assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct VirtualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

impl VirtualClock {
    /// Create a clock frozen at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Move the clock by `delta` (may be negative).
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.write();
        *now = saturating_add(*now, delta);
    }
}

/// `instant + delta`, clamped to the representable range.
pub(crate) fn saturating_add(instant: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    instant.checked_add_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// `instant - delta`, clamped to the representable range.
pub(crate) fn saturating_sub(instant: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    instant.checked_sub_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn virtual_clock_clones_share_time() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = VirtualClock::at(start);
        let other = clock.clone();

        other.advance(Duration::milliseconds(1500));
        assert_eq!(clock.now(), start + Duration::milliseconds(1500));

        clock.set(start);
        assert_eq!(other.now(), start);
    }

    #[test]
    fn arithmetic_saturates_at_the_range_edges() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(saturating_add(start, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(saturating_add(start, Duration::MIN), DateTime::<Utc>::MIN_UTC);
        assert_eq!(saturating_sub(start, Duration::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(saturating_sub(start, Duration::seconds(1)), start - Duration::seconds(1));

        let clock = VirtualClock::at(start);
        clock.advance(Duration::MAX);
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
