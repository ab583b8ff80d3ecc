use crate::buffer::{Buffer, SharedBuffer};
use crate::task::Task;
use std::sync::Arc;
use uniflow_core::AccessMode;

type Body = Box<dyn FnOnce() + Send + 'static>;

/// The command-group handler passed to [`Queue::submit`].
///
/// Accessor layers call [`require`] (or the untyped [`require_state`])
/// for every accessor they construct, then install the body with
/// [`single_task`]. A command group without a body still goes through
/// scheduling, so pure-dependency groups drain correctly.
///
/// [`Queue::submit`]: crate::queue::Queue::submit
/// [`require`]: Handler::require
/// [`require_state`]: Handler::require_state
/// [`single_task`]: Handler::single_task
pub struct Handler {
    task: Arc<Task>,
    body: Option<Body>,
}

impl Handler {
    pub(crate) fn new(task: Arc<Task>) -> Self {
        Self { task, body: None }
    }

    /// Declare an access to a buffer.
    pub fn require<T>(&mut self, buffer: &Buffer<T>, mode: AccessMode) {
        self.require_state(buffer.scheduling_state(), mode);
    }

    /// Declare an access to any resource carrying scheduling state.
    ///
    /// Pipe-typed accessors map their read/write declarations onto this.
    pub fn require_state(&mut self, state: &Arc<SharedBuffer>, mode: AccessMode) {
        self.task.add_buffer(state, mode.is_write());
    }

    /// Install the body to run once all dependencies are satisfied.
    ///
    /// The last installed body wins.
    pub fn single_task<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.body = Some(Box::new(f));
    }

    /// The task being assembled, for prologue/epilogue or kernel
    /// registration.
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    pub(crate) fn take_body(&mut self) -> Body {
        self.body.take().unwrap_or_else(|| Box::new(|| {}))
    }
}
