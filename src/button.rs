//! Debounced, latching push button.
//!
//! Raw pin samples are classified into button events by a small state
//! machine driven once per scheduler time slice. A detected click latches
//! until [`PushButton::reset`] acknowledges it, so the foreground thread can
//! read it at its own pace.

use std::sync::{Arc, Mutex};

use crate::clock::{Clock, TickMs, ticks_diff};
use crate::schedule::Task;

/// Raw access to the button hardware. The sample is instantaneous and
/// unfiltered; debouncing happens in [`PushButton`].
pub trait ButtonPin: Send + Sync {
    /// True while the button is pressed.
    fn is_down(&self) -> bool;
}

/// The latched, debounced classification of the last press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStatus {
    Up,
    ShortClick,
    HoldClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Idle,
    TimingPress,
    TimingHold,
}

pub const DEFAULT_SHORT_CLICK_MS: i32 = 50;
pub const DEFAULT_HOLD_CLICK_MS: i32 = 1000;

struct ButtonInner {
    state: DebounceState,
    down_tick: TickMs,
    status: ButtonStatus,
}

pub struct PushButton {
    pin: Box<dyn ButtonPin>,
    clock: Arc<dyn Clock>,
    short_click_ms: i32,
    hold_click_ms: i32,
    // Held only for the duration of a sample or a reset, never across a sleep
    inner: Mutex<ButtonInner>,
}

impl PushButton {
    pub fn new(pin: Box<dyn ButtonPin>, clock: Arc<dyn Clock>) -> Self {
        Self::with_timing(pin, clock, DEFAULT_SHORT_CLICK_MS, DEFAULT_HOLD_CLICK_MS)
    }

    pub fn with_timing(
        pin: Box<dyn ButtonPin>,
        clock: Arc<dyn Clock>,
        short_click_ms: i32,
        hold_click_ms: i32,
    ) -> Self {
        PushButton {
            pin,
            clock,
            short_click_ms,
            hold_click_ms,
            inner: Mutex::new(ButtonInner {
                state: DebounceState::Idle,
                down_tick: 0,
                status: ButtonStatus::Up,
            }),
        }
    }

    /// Sample the pin and advance the state machine. Runs on the scheduler
    /// thread, once per time slice.
    fn sample(&self) {
        let mut inner = self.inner.lock().unwrap();
        let down = self.pin.is_down();
        let now = self.clock.ticks_ms();

        match inner.state {
            DebounceState::Idle => {
                if down {
                    inner.state = DebounceState::TimingPress;
                    inner.down_tick = now;
                    inner.status = ButtonStatus::Up;
                }
            }
            DebounceState::TimingPress => {
                let elapsed = ticks_diff(now, inner.down_tick);
                if down {
                    if elapsed >= self.short_click_ms {
                        inner.state = DebounceState::TimingHold;
                        inner.status = ButtonStatus::ShortClick;
                    }
                } else {
                    inner.state = DebounceState::Idle;
                    if elapsed >= self.short_click_ms {
                        inner.status = ButtonStatus::ShortClick;
                    }
                }
            }
            DebounceState::TimingHold => {
                if !down {
                    let elapsed = ticks_diff(now, inner.down_tick);
                    inner.state = DebounceState::Idle;
                    inner.status = if elapsed >= self.hold_click_ms {
                        ButtonStatus::HoldClick
                    } else {
                        ButtonStatus::ShortClick
                    };
                }
            }
        }
    }

    /// The last reported status. Safe from any thread: the status is only
    /// written inside the sample step, under the lock.
    pub fn value(&self) -> ButtonStatus {
        self.inner.lock().unwrap().status
    }

    /// Acknowledge the latched click so the next one can be detected.
    pub fn reset(&self) {
        self.inner.lock().unwrap().status = ButtonStatus::Up;
    }
}

impl Task for PushButton {
    fn poll(&self) {
        self.sample();
    }
}
