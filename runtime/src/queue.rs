use crate::handler::Handler;
use crate::task::Task;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;
use uniflow_core::{execution_mode, ExecutionMode};

/// Tracks the tasks in flight for one submission queue.
///
/// The count is incremented exactly once per task at submission and
/// decremented exactly once at completion; "drained" means the count is
/// back to zero. Dropping the queue drains it implicitly, so queue
/// teardown can block.
pub struct Queue {
    running: AtomicUsize,
    drain_lock: Mutex<()>,
    drain_signal: Condvar,
    mode: ExecutionMode,
}

impl Queue {
    /// Create a queue using the process-wide execution mode.
    pub fn new() -> Arc<Self> {
        Self::with_mode(execution_mode())
    }

    /// Create a queue with an explicit execution mode.
    ///
    /// Forcing `Synchronous` makes every submission run inline on the
    /// submitting thread, which tests use for determinism.
    pub fn with_mode(mode: ExecutionMode) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicUsize::new(0),
            drain_lock: Mutex::new(()),
            drain_signal: Condvar::new(),
            mode,
        })
    }

    /// Submit a command group.
    ///
    /// The closure receives a [`Handler`] to declare buffer accesses and
    /// install the body; the resulting task is scheduled exactly once,
    /// after the closure returns, and handed back so callers can wait on
    /// it.
    pub fn submit<F>(self: &Arc<Self>, command_group: F) -> Arc<Task>
    where
        F: FnOnce(&mut Handler),
    {
        let task = Task::new(self.clone());
        let mut handler = Handler::new(task.clone());
        command_group(&mut handler);
        let body = handler.take_body();
        task.schedule(body);
        task
    }

    /// Signal that a task was submitted to this queue.
    ///
    /// Called at submission, not from the execution routine, so that a
    /// drain started right after `submit` returns cannot miss a task
    /// whose thread has not been scheduled yet.
    pub fn begin_task(&self) {
        self.running.fetch_add(1, Ordering::SeqCst);
        trace!("task added to queue");
    }

    /// Signal that a task of this queue completed.
    pub fn end_task(&self) {
        let guard = self.drain_lock.lock();
        if self.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Unlock before the notification. Several threads may drain
            // the same queue, so this must be a broadcast.
            drop(guard);
            trace!("queue drained");
            self.drain_signal.notify_all();
        }
    }

    /// Block until every task submitted through this queue has finished.
    pub fn drain(&self) {
        let mut guard = self.drain_lock.lock();
        while self.running.load(Ordering::SeqCst) != 0 {
            self.drain_signal.wait(&mut guard);
        }
    }

    /// Number of tasks currently in flight.
    pub fn running_tasks(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.drain();
    }
}
