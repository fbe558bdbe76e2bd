//! Cooperative task scheduler.
//!
//! Registered tasks are polled once per time slice on a single background
//! worker thread. The worker is started lazily by the first registration and
//! there is never more than one of them: the target board offers exactly one
//! auxiliary execution context, and this scheduler is it.
//!
//! The task list is only ever touched under its lock, so registration from
//! the foreground thread cannot race a poll pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thread_priority::ThreadBuilder;

use crate::logger::Logger;

pub const DEFAULT_TIME_SLICE_MS: u64 = 100;

/// A unit of work polled by the scheduler.
pub trait Task: Send + Sync {
    /// Called once per time slice on the worker thread. Must not block for
    /// longer than a fraction of the slice and must not panic: the scheduler
    /// performs no isolation between tasks.
    fn poll(&self);

    /// Called exactly once on the worker thread when the scheduler shuts down.
    fn on_terminate(&self) {}
}

struct SchedulerShared {
    tasks: Mutex<Vec<Arc<dyn Task>>>,
    stop_requested: AtomicBool,
    stopped: AtomicBool,
    worker_started: AtomicBool,
}

pub struct TaskScheduler {
    shared: Arc<SchedulerShared>,
    time_slice: Duration,
    logger: Logger,
}

impl TaskScheduler {
    pub fn new(time_slice_ms: u64, logger: Logger) -> Self {
        TaskScheduler {
            shared: Arc::new(SchedulerShared {
                tasks: Mutex::new(Vec::new()),
                stop_requested: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                worker_started: AtomicBool::new(false),
            }),
            time_slice: Duration::from_millis(time_slice_ms),
            logger,
        }
    }

    /// Add a task. The first registration starts the worker thread; the lock
    /// is held across the start so the new worker's first poll pass cannot
    /// overlap the registration.
    pub fn register(&self, task: Arc<dyn Task>) {
        let mut tasks = self.shared.tasks.lock().unwrap();
        tasks.push(task);

        if !self.shared.worker_started.swap(true, Ordering::SeqCst) {
            let shared = Arc::clone(&self.shared);
            let time_slice = self.time_slice;
            let logger = self.logger.clone();
            ThreadBuilder::default()
                .name("ledscript-tasks")
                .spawn(move |_| {
                    logger.debug("Task scheduler running");
                    Self::worker_loop(&shared, time_slice);
                    logger.debug("Task scheduler stopped");
                })
                .expect("Unable to start task scheduler");
        }
    }

    /// Remove a task by identity. Unknown tasks are ignored.
    pub fn unregister(&self, task: &Arc<dyn Task>) {
        let mut tasks = self.shared.tasks.lock().unwrap();
        tasks.retain(|t| !Arc::ptr_eq(t, task));
    }

    /// Signal the worker to stop and block until it has notified every task
    /// and exited. The stopped flag is polled at time-slice granularity; this
    /// is the only synchronization point between caller and worker.
    pub fn request_shutdown(&self) {
        if !self.shared.worker_started.load(Ordering::SeqCst) {
            return;
        }
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        while !self.shared.stopped.load(Ordering::SeqCst) {
            std::thread::sleep(self.time_slice);
        }
    }

    fn worker_loop(shared: &SchedulerShared, time_slice: Duration) {
        while !shared.stop_requested.load(Ordering::SeqCst) {
            {
                let tasks = shared.tasks.lock().unwrap();
                for task in tasks.iter() {
                    task.poll();
                }
            }
            std::thread::sleep(time_slice);
        }

        let tasks = shared.tasks.lock().unwrap();
        for task in tasks.iter() {
            task.on_terminate();
        }
        shared.stopped.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::thread::ThreadId;

    use super::*;

    #[derive(Default)]
    struct CountingTask {
        polls: AtomicUsize,
        terminations: AtomicUsize,
        threads: Mutex<HashSet<ThreadId>>,
    }

    impl Task for CountingTask {
        fn poll(&self) {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.threads
                .lock()
                .unwrap()
                .insert(std::thread::current().id());
        }

        fn on_terminate(&self) {
            self.terminations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for_polls(task: &CountingTask, count: usize) {
        for _ in 0..500 {
            if task.polls.load(Ordering::SeqCst) >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("task was not polled {} times", count);
    }

    #[test]
    fn two_tasks_share_one_worker_thread() {
        let scheduler = TaskScheduler::new(2, Logger::sink_less());
        let first = Arc::new(CountingTask::default());
        let second = Arc::new(CountingTask::default());

        scheduler.register(first.clone());
        scheduler.register(second.clone());
        wait_for_polls(&first, 3);
        wait_for_polls(&second, 3);
        scheduler.request_shutdown();

        let mut threads = HashSet::new();
        threads.extend(first.threads.lock().unwrap().iter().copied());
        threads.extend(second.threads.lock().unwrap().iter().copied());
        assert_eq!(threads.len(), 1);
    }

    #[test]
    fn shutdown_notifies_each_task_exactly_once() {
        let scheduler = TaskScheduler::new(2, Logger::sink_less());
        let first = Arc::new(CountingTask::default());
        let second = Arc::new(CountingTask::default());

        scheduler.register(first.clone());
        scheduler.register(second.clone());
        wait_for_polls(&first, 1);
        scheduler.request_shutdown();

        assert_eq!(first.terminations.load(Ordering::SeqCst), 1);
        assert_eq!(second.terminations.load(Ordering::SeqCst), 1);

        // The worker has exited; no further polls happen
        let polls = first.polls.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(first.polls.load(Ordering::SeqCst), polls);
    }

    #[test]
    fn shutdown_without_registrations_returns_immediately() {
        let scheduler = TaskScheduler::new(2, Logger::sink_less());
        scheduler.request_shutdown();
    }

    #[test]
    fn unregistered_task_is_no_longer_polled() {
        let scheduler = TaskScheduler::new(2, Logger::sink_less());
        let kept = Arc::new(CountingTask::default());
        let removed = Arc::new(CountingTask::default());

        scheduler.register(kept.clone());
        let removed_handle: Arc<dyn Task> = removed.clone();
        scheduler.register(removed_handle.clone());
        wait_for_polls(&removed, 1);

        scheduler.unregister(&removed_handle);
        let polls = removed.polls.load(Ordering::SeqCst);
        wait_for_polls(&kept, polls + 5);
        assert_eq!(removed.polls.load(Ordering::SeqCst), polls);

        scheduler.request_shutdown();
    }
}
