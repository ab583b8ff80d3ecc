use crate::buffer::SharedBuffer;
use crate::kernel::Kernel;
use crate::queue::Queue;
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::mem;
use std::sync::Arc;
use tracing::trace;

type Hook = Box<dyn FnOnce() + Send>;

/// The executable unit bound to one command group.
///
/// A task records which buffers it touches and which tasks produced
/// them, then runs its body once every recorded producer has finished.
/// Progression is Created -> Scheduled -> Running -> Finished; the
/// finished latch flips exactly once and never back.
///
/// The task extends its own lifetime for the duration of execution: the
/// execution routine captures a strong reference, so the task survives
/// after the submitting scope exits and is destroyed by ordinary
/// reference counting once no buffer, queue, or waiter holds it.
pub struct Task {
    /// Buffers held by this task, released after the body runs.
    buffers_in_use: Mutex<Vec<Arc<SharedBuffer>>>,
    /// Tasks producing the buffers this task consumes.
    predecessors: Mutex<Vec<Arc<Task>>>,
    /// Hooks run before the body, then cleared.
    prologues: Mutex<Vec<Hook>>,
    /// Hooks run after the body, then cleared.
    epilogues: Mutex<Vec<Hook>>,
    finished: Mutex<bool>,
    finished_signal: Condvar,
    owner_queue: Arc<Queue>,
    kernel: Mutex<Option<Arc<Kernel>>>,
}

impl Task {
    /// Create a task bound to the queue it was submitted through.
    pub fn new(owner_queue: Arc<Queue>) -> Arc<Self> {
        Arc::new(Self {
            buffers_in_use: Mutex::new(Vec::new()),
            predecessors: Mutex::new(Vec::new()),
            prologues: Mutex::new(Vec::new()),
            epilogues: Mutex::new(Vec::new()),
            finished: Mutex::new(false),
            finished_signal: Condvar::new(),
            owner_queue,
            kernel: Mutex::new(None),
        })
    }

    /// Register a buffer access; this is how the dependency graph is
    /// incrementally built.
    ///
    /// If the buffer already has a producer, that producer becomes a
    /// predecessor of this task — unless the producer is this task
    /// itself. A task that writes and then reads the same buffer in one
    /// body would otherwise record itself and deadlock in
    /// `wait_for_predecessors`.
    pub fn add_buffer(self: &Arc<Self>, buffer: &Arc<SharedBuffer>, is_write: bool) {
        self.buffers_in_use.lock().push(buffer.clone());

        if let Some(producer) = buffer.register_access(self, is_write) {
            if !Arc::ptr_eq(&producer, self) {
                self.predecessors.lock().push(producer);
            }
        }
    }

    /// Schedule this task for execution.
    ///
    /// The queue is notified before the execution routine starts so a
    /// drain cannot slip between submission and the first instruction of
    /// the routine. Depending on the queue's execution mode the routine
    /// runs on a new detached thread or inline on the calling thread.
    pub fn schedule<F>(self: &Arc<Self>, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.owner_queue.begin_task();
        trace!("task scheduled");

        let task = self.clone();
        self.owner_queue.execution_mode().execute(move || {
            task.wait_for_predecessors();
            task.run_prologues();
            trace!("task running");
            body();
            task.run_epilogues();
            task.release_buffers();
            task.notify_finished();
            task.owner_queue.end_task();
        });
    }

    /// Block until this task's body has completed.
    ///
    /// Callable from any thread, by any number of waiters; completion is
    /// broadcast, not handed to a single waiter.
    pub fn wait(&self) {
        let mut finished = self.finished.lock();
        while !*finished {
            self.finished_signal.wait(&mut finished);
        }
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.lock()
    }

    /// Add a hook to run before the body.
    pub fn add_prologue<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.prologues.lock().push(Box::new(f));
    }

    /// Add a hook to run after the body.
    pub fn add_epilogue<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.epilogues.lock().push(Box::new(f));
    }

    /// Attach the kernel descriptor backing this task.
    pub fn set_kernel(&self, kernel: Arc<Kernel>) {
        *self.kernel.lock() = Some(kernel);
    }

    /// The kernel backing this task.
    ///
    /// Asking for a kernel that was never attached is a programmer
    /// error, not an expected runtime condition.
    pub fn kernel(&self) -> Result<Arc<Kernel>> {
        self.kernel.lock().clone().ok_or(Error::NoKernel)
    }

    pub fn owner_queue(&self) -> &Arc<Queue> {
        &self.owner_queue
    }

    /// Wait for every recorded producer to finish.
    ///
    /// The list is consumed so finished predecessors are not kept alive
    /// through this task longer than necessary.
    fn wait_for_predecessors(&self) {
        let producers = mem::take(&mut *self.predecessors.lock());
        trace!(count = producers.len(), "waiting for producers");
        for producer in producers {
            producer.wait();
        }
    }

    fn run_prologues(&self) {
        let hooks = mem::take(&mut *self.prologues.lock());
        for hook in hooks {
            hook();
        }
    }

    fn run_epilogues(&self) {
        let hooks = mem::take(&mut *self.epilogues.lock());
        for hook in hooks {
            hook();
        }
    }

    /// Release every buffer held by this task and clear the list.
    fn release_buffers(&self) {
        let buffers = mem::take(&mut *self.buffers_in_use.lock());
        for buffer in buffers {
            buffer.release();
        }
    }

    /// Flip the finished latch and wake every waiter.
    fn notify_finished(&self) {
        {
            let mut finished = self.finished.lock();
            *finished = true;
        }
        trace!("task finished");
        self.finished_signal.notify_all();
    }
}
