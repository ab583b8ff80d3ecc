use crate::task::Task;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Dependency bookkeeping for one shared data resource.
///
/// Tracks how many scheduled tasks currently hold the resource and which
/// task last declared write access to it. The latest producer is kept as
/// a weak reference: a producer may finish and be destroyed while the
/// buffer survives, in which case lookup simply returns nothing.
pub struct SharedBuffer {
    /// Number of tasks currently holding this buffer.
    active_users: AtomicUsize,
    /// The most recent task to declare write access, if still alive.
    latest_producer: Mutex<Weak<Task>>,
    idle_lock: Mutex<()>,
    idle_signal: Condvar,
}

impl SharedBuffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            active_users: AtomicUsize::new(0),
            latest_producer: Mutex::new(Weak::new()),
            idle_lock: Mutex::new(()),
            idle_signal: Condvar::new(),
        })
    }

    /// Record that `task` holds this buffer, and return the task it must
    /// wait for, if any.
    ///
    /// The user count is incremented before the producer bookkeeping so
    /// the buffer cannot be torn down between the two steps. A write
    /// access installs `task` as the new latest producer and returns the
    /// previous one; a read access returns the current producer without
    /// replacing it.
    pub fn register_access(&self, task: &Arc<Task>, is_write: bool) -> Option<Arc<Task>> {
        self.active_users.fetch_add(1, Ordering::SeqCst);

        let mut producer = self.latest_producer.lock();
        if is_write {
            let previous = mem::replace(&mut *producer, Arc::downgrade(task));
            previous.upgrade()
        } else {
            producer.upgrade()
        }
    }

    /// Drop one user; wakes everyone draining the buffer once the count
    /// reaches zero.
    pub fn release(&self) {
        let guard = self.idle_lock.lock();
        if self.active_users.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Unlock before the notification so woken threads do not
            // immediately block on the mutex.
            drop(guard);
            trace!("buffer idle");
            self.idle_signal.notify_all();
        }
    }

    /// Block the calling thread until no task holds this buffer.
    pub fn wait_until_idle(&self) {
        let mut guard = self.idle_lock.lock();
        while self.active_users.load(Ordering::SeqCst) != 0 {
            self.idle_signal.wait(&mut guard);
        }
    }

    pub fn active_users(&self) -> usize {
        self.active_users.load(Ordering::SeqCst)
    }

    /// The task that last declared write access, if it is still alive.
    pub fn latest_producer(&self) -> Option<Arc<Task>> {
        self.latest_producer.lock().upgrade()
    }
}

/// A host-side data buffer participating in task scheduling.
///
/// Pairs the dependency bookkeeping with the actual storage. Task bodies
/// capture a clone of `payload()`; the scheduler guarantees a body only
/// runs once every recorded producer has finished, so a body that locks
/// the payload sees the data its predecessors wrote.
///
/// Dropping the buffer blocks until every scheduled task holding it has
/// released it.
pub struct Buffer<T> {
    payload: Arc<Mutex<Vec<T>>>,
    state: Arc<SharedBuffer>,
}

impl<T> Buffer<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            payload: Arc::new(Mutex::new(data)),
            state: SharedBuffer::new(),
        }
    }

    pub fn with_len(len: usize) -> Self
    where
        T: Default + Clone,
    {
        Self::new(vec![T::default(); len])
    }

    /// The scheduling side of this buffer, for access registration.
    pub fn scheduling_state(&self) -> &Arc<SharedBuffer> {
        &self.state
    }

    /// The storage, for capture into task bodies.
    pub fn payload(&self) -> Arc<Mutex<Vec<T>>> {
        self.payload.clone()
    }

    /// Host-side view of the final data.
    ///
    /// Blocks until every in-flight task holding this buffer has
    /// released it, then locks the storage.
    pub fn host_view(&self) -> MutexGuard<'_, Vec<T>> {
        self.state.wait_until_idle();
        self.payload.lock()
    }

    pub fn len(&self) -> usize {
        self.payload.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.lock().is_empty()
    }
}

impl<T> Drop for Buffer<T> {
    fn drop(&mut self) {
        self.state.wait_until_idle();
    }
}
