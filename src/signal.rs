//! Cooperative cancellation between the button task and the script CPU.
//!
//! Cancellation is data, not an exception: the watch task sets a flag, the
//! CPU polls it on every statement dispatch and inside every blocking wait,
//! and acknowledges by marking itself terminated on the way out. Each flag
//! has a single writer and a single reader, so plain atomics are enough.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::button::{ButtonStatus, PushButton};
use crate::logger::Logger;
use crate::schedule::Task;

#[derive(Debug, Default)]
pub struct TerminationSignal {
    /// Written by the button watch, read by the CPU loop.
    terminate_requested: AtomicBool,
    /// Written by the CPU loop on exit, read by whoever awaits shutdown.
    terminated: AtomicBool,
}

impl TerminationSignal {
    pub fn new() -> Self {
        TerminationSignal::default()
    }

    pub fn request_terminate(&self) {
        self.terminate_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.terminate_requested.load(Ordering::SeqCst)
    }

    pub fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// Scheduler task that turns a hold click into a termination request.
///
/// The short click is left latched for other consumers (menu navigation is
/// outside the engine); only a hold click stops the running script.
pub struct TerminateWatch {
    button: Arc<PushButton>,
    signal: Arc<TerminationSignal>,
    logger: Logger,
}

impl TerminateWatch {
    pub fn new(button: Arc<PushButton>, signal: Arc<TerminationSignal>, logger: Logger) -> Self {
        TerminateWatch { button, signal, logger }
    }
}

impl Task for TerminateWatch {
    fn poll(&self) {
        if self.button.value() == ButtonStatus::HoldClick {
            self.logger.info("Hold click detected, stopping script");
            self.button.reset();
            self.signal.request_terminate();
        }
    }
}
