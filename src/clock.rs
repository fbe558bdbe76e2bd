//! Time access for the engine.
//!
//! Everything that reads time goes through the [`Clock`] trait so the
//! interpreter and the button debouncer can run against a virtual clock in
//! tests instead of waiting out real wall-clock delays. Two kinds of time are
//! exposed: a monotonic millisecond tick counter with wraparound-safe
//! difference arithmetic (button timing), and the local wall clock
//! (`do-at` / `do-until` / `do-for` / `pause`).

use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};

use crate::lang::TimeOfDay;

/// Monotonic millisecond tick. Wraps around; compare with [`ticks_diff`].
pub type TickMs = u32;

/// Signed difference `newer - older` between two tick values, correct across
/// counter wraparound as long as the real distance fits in an `i32`.
#[inline]
pub fn ticks_diff(newer: TickMs, older: TickMs) -> i32 {
    newer.wrapping_sub(older) as i32
}

pub trait Clock: Send + Sync {
    /// Monotonic millisecond tick counter. May wrap.
    fn ticks_ms(&self) -> TickMs;

    /// Current local wall-clock date and time.
    fn now(&self) -> NaiveDateTime;

    /// Block the calling thread for `ms` milliseconds. A test clock advances
    /// its virtual time here instead of sleeping.
    fn sleep_ms(&self, ms: u64);
}

/// Compute the next wall-clock occurrence of a time of day: today if the
/// instant has not passed yet, otherwise the same time tomorrow.
pub fn next_occurrence(now: NaiveDateTime, time: TimeOfDay) -> NaiveDateTime {
    let candidate = now.date().and_time(time.as_naive_time());
    if candidate < now {
        candidate + chrono::Duration::days(1)
    } else {
        candidate
    }
}

/// The real clock: `Instant`-based ticks and the local system time.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn ticks_ms(&self) -> TickMs {
        self.start.elapsed().as_millis() as TickMs
    }

    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}


#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn ticks_diff_is_wraparound_safe() {
        assert_eq!(ticks_diff(150, 100), 50);
        // Counter wrapped between the two samples
        assert_eq!(ticks_diff(10, TickMs::MAX - 9), 20);
        assert_eq!(ticks_diff(100, 150), -50);
    }

    #[test]
    fn next_occurrence_today_when_still_ahead() {
        let now = at(10, 0, 0);
        let target = next_occurrence(now, TimeOfDay::new(18, 30, 0));
        assert_eq!(target, at(18, 30, 0));
    }

    #[test]
    fn next_occurrence_tomorrow_when_passed() {
        let now = at(19, 0, 0);
        let target = next_occurrence(now, TimeOfDay::new(18, 30, 0));
        assert_eq!(target, at(18, 30, 0) + chrono::Duration::days(1));
    }

    #[test]
    fn next_occurrence_exact_instant_is_today() {
        let now = at(18, 30, 0);
        let target = next_occurrence(now, TimeOfDay::new(18, 30, 0));
        assert_eq!(target, now);
    }

    #[test]
    fn mock_clock_virtual_sleep() {
        let clock = mock::MockClock::new();
        let before = clock.now();
        clock.sleep_ms(1500);
        assert_eq!(clock.ticks_ms(), 1500);
        assert_eq!(clock.now() - before, chrono::Duration::milliseconds(1500));
    }
}
