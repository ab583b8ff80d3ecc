use crate::reservation::{Direction, Reservation};
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;
use uniflow_core::AccessMode;
use uniflow_runtime::{Handler, SharedBuffer};

/// An ordered claim on a contiguous run of pipe slots.
///
/// Records form a FIFO per pipe per direction. A record only leaves the
/// front of its queue once committed; a record committed out of order
/// waits behind its elders.
pub(crate) struct ReservationRecord {
    pub(crate) id: u64,
    /// Absolute sequence number of the first reserved slot. Sequence
    /// numbers never shift when the ring pops, unlike positions.
    pub(crate) start_seq: u64,
    pub(crate) len: usize,
    pub(crate) ready: bool,
}

pub(crate) struct PipeState<T> {
    ring: VecDeque<T>,
    /// Sequence number of the ring's front element.
    base_seq: u64,
    /// Elements at the front frozen by read reservations, including
    /// non-reserved reads that landed between pending reservations.
    read_frozen: usize,
    write_rsv: VecDeque<ReservationRecord>,
    read_rsv: VecDeque<ReservationRecord>,
    next_reservation_id: u64,
}

impl<T> PipeState<T> {
    fn reserved_for_reading(&self) -> usize {
        self.read_frozen
    }

    /// Slots claimed by pending write reservations: everything from the
    /// first pending reservation to the back of the ring, so plain
    /// writes landing behind a pending reservation stay invisible too.
    fn reserved_for_writing(&self) -> usize {
        match self.write_rsv.front() {
            None => 0,
            Some(front) => (self.base_seq + self.ring.len() as u64 - front.start_seq) as usize,
        }
    }

    /// Number of elements a consumer may read right now.
    fn visible_size(&self) -> usize {
        self.ring.len() - self.reserved_for_reading() - self.reserved_for_writing()
    }

    fn slot_index(&self, seq: u64) -> usize {
        debug_assert!(seq >= self.base_seq);
        (seq - self.base_seq) as usize
    }
}

/// A bounded FIFO channel between command groups.
///
/// Single-element reads and writes come in non-blocking (capacity
/// exhaustion is an ordinary outcome, not an error) and blocking
/// flavors. Bulk transfer goes through reservations: a producer or
/// consumer claims a contiguous run of slots, fills or drains them in
/// any order, and commits; commits become visible strictly in the order
/// the reservations were made.
///
/// One mutex guards the ring and both reservation queues. Ordering
/// correctness depends on serializing the whole commit scan, so there is
/// deliberately no per-reservation lock. The mutex is released for the
/// duration of every blocking wait.
pub struct Pipe<T> {
    capacity: usize,
    state: Mutex<PipeState<T>>,
    /// Signaled after a successful read; writers wait on this.
    read_done: Condvar,
    /// Signaled after a successful write; readers wait on this.
    write_done: Condvar,
    /// A pipe carries at most one reading and one writing endpoint at a
    /// time.
    used_for_reading: AtomicBool,
    used_for_writing: AtomicBool,
    scheduling: Arc<SharedBuffer>,
}

impl<T> Pipe<T> {
    /// Create a pipe holding at most `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PipeState {
                ring: VecDeque::with_capacity(capacity),
                base_seq: 0,
                read_frozen: 0,
                write_rsv: VecDeque::new(),
                read_rsv: VecDeque::new(),
                next_reservation_id: 0,
            }),
            read_done: Condvar::new(),
            write_done: Condvar::new(),
            used_for_reading: AtomicBool::new(false),
            used_for_writing: AtomicBool::new(false),
            scheduling: SharedBuffer::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        // Fixed at construction time, no lock required.
        self.capacity
    }

    /// Number of elements a consumer may read right now, i.e. occupied
    /// slots minus everything frozen by pending reservations.
    pub fn size(&self) -> usize {
        self.state.lock().visible_size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.state.lock().ring.len() == self.capacity
    }

    /// The scheduling side of this pipe: the same use-count bookkeeping
    /// a buffer carries, so pipe teardown can wait for in-flight tasks.
    ///
    /// Pipe endpoints deliberately record no producer edge — a producer
    /// and a consumer command group are meant to run concurrently and
    /// synchronize through the pipe itself.
    pub fn scheduling_state(&self) -> &Arc<SharedBuffer> {
        &self.scheduling
    }

    /// Claim this pipe's reading or writing endpoint for a command
    /// group.
    ///
    /// Registers the task as a user of the pipe (without ordering it
    /// against the peer endpoint) and releases the endpoint when the
    /// task completes. Claiming an endpoint that is already taken, or
    /// asking for any mode besides plain read or write, is a programmer
    /// error.
    pub fn bind_to(self: &Arc<Self>, cgh: &mut Handler, mode: AccessMode) -> Result<()>
    where
        T: Send + 'static,
    {
        let reading = match mode {
            AccessMode::Read => {
                if self.used_for_reading.swap(true, Ordering::SeqCst) {
                    return Err(Error::AlreadyUsedForReading);
                }
                true
            }
            AccessMode::Write => {
                if self.used_for_writing.swap(true, Ordering::SeqCst) {
                    return Err(Error::AlreadyUsedForWriting);
                }
                false
            }
            other => return Err(Error::UnsupportedAccessMode(other)),
        };

        // Use-count only: registering as a reader installs no producer,
        // so the peer endpoint's task is never a predecessor.
        cgh.require_state(&self.scheduling, AccessMode::Read);

        let pipe = self.clone();
        cgh.task().add_epilogue(move || {
            let flag = if reading {
                &pipe.used_for_reading
            } else {
                &pipe.used_for_writing
            };
            flag.store(false, Ordering::SeqCst);
        });
        Ok(())
    }

    /// Push a value unless the pipe is full.
    pub fn try_write(&self, value: T) -> bool {
        let mut st = self.state.lock();
        if st.ring.len() == self.capacity {
            return false;
        }
        st.ring.push_back(value);
        drop(st);
        self.write_done.notify_all();
        true
    }

    /// Push a value, waiting for room if the pipe is full.
    pub fn write(&self, value: T) {
        let mut st = self.state.lock();
        while st.ring.len() == self.capacity {
            self.read_done.wait(&mut st);
        }
        st.ring.push_back(value);
        drop(st);
        self.write_done.notify_all();
    }
}

impl<T: Clone> Pipe<T> {
    /// Pop a value unless nothing is readable.
    pub fn try_read(&self) -> Option<T> {
        let mut st = self.state.lock();
        if st.visible_size() == 0 {
            return None;
        }
        let value = Self::take_front(&mut st);
        drop(st);
        self.read_done.notify_all();
        Some(value)
    }

    /// Pop a value, waiting until something is readable.
    pub fn read(&self) -> T {
        let mut st = self.state.lock();
        while st.visible_size() == 0 {
            self.write_done.wait(&mut st);
        }
        let value = Self::take_front(&mut st);
        drop(st);
        self.read_done.notify_all();
        value
    }

    /// Take the first readable element. With read reservations pending
    /// the element cannot be popped — that would shift the reserved
    /// region — so it is copied out and frozen in place; the commit scan
    /// releases it later.
    fn take_front(st: &mut PipeState<T>) -> T {
        if st.read_frozen > 0 {
            let index = st.read_frozen;
            st.read_frozen += 1;
            st.ring[index].clone()
        } else {
            st.base_seq += 1;
            st.ring.pop_front().expect("readable element must exist")
        }
    }
}

impl<T: Clone + Default> Pipe<T> {
    /// Entry point for pipe-typed accessors: dispatch a reservation by
    /// access mode. A pipe can only be reserved for plain reading or
    /// plain writing, exclusively; any other mode is a programmer error.
    pub fn reserve(
        &self,
        n: usize,
        mode: AccessMode,
        blocking: bool,
    ) -> Result<Option<Reservation<'_, T>>> {
        match mode {
            AccessMode::Read => Ok(if blocking {
                self.reserve_read(n)
            } else {
                self.try_reserve_read(n)
            }),
            AccessMode::Write => Ok(if blocking {
                self.reserve_write(n)
            } else {
                self.try_reserve_write(n)
            }),
            other => Err(Error::UnsupportedAccessMode(other)),
        }
    }

    /// Claim `n` contiguous slots for writing, or `None` if the pipe
    /// lacks room. Insufficient room is an ordinary outcome to retry,
    /// not an error.
    pub fn try_reserve_write(&self, n: usize) -> Option<Reservation<'_, T>> {
        let mut st = self.state.lock();
        if n == 0 || st.ring.len() + n > self.capacity {
            return None;
        }
        Some(self.reserve_write_locked(&mut st, n))
    }

    /// Claim `n` contiguous slots for writing, waiting for room.
    ///
    /// Returns `None` only for an empty reservation request. A request
    /// larger than the whole capacity can never be satisfied and blocks
    /// forever.
    pub fn reserve_write(&self, n: usize) -> Option<Reservation<'_, T>> {
        if n == 0 {
            return None;
        }
        let mut st = self.state.lock();
        while st.ring.len() + n > self.capacity {
            self.read_done.wait(&mut st);
        }
        Some(self.reserve_write_locked(&mut st, n))
    }

    /// Claim the next `n` readable slots, or `None` if fewer are
    /// visible.
    pub fn try_reserve_read(&self, n: usize) -> Option<Reservation<'_, T>> {
        let mut st = self.state.lock();
        if n == 0 || n > st.visible_size() {
            return None;
        }
        Some(self.reserve_read_locked(&mut st, n))
    }

    /// Claim the next `n` readable slots, waiting until enough are
    /// visible.
    pub fn reserve_read(&self, n: usize) -> Option<Reservation<'_, T>> {
        if n == 0 {
            return None;
        }
        let mut st = self.state.lock();
        while n > st.visible_size() {
            self.write_done.wait(&mut st);
        }
        Some(self.reserve_read_locked(&mut st, n))
    }

    fn reserve_write_locked(
        &self,
        st: &mut MutexGuard<'_, PipeState<T>>,
        n: usize,
    ) -> Reservation<'_, T> {
        // Pre-extend the ring with default values so element assignment
        // through the handle lands on live slots.
        for _ in 0..n {
            st.ring.push_back(T::default());
        }
        let start_seq = st.base_seq + (st.ring.len() - n) as u64;
        let id = st.next_reservation_id;
        st.next_reservation_id += 1;
        st.write_rsv.push_back(ReservationRecord {
            id,
            start_seq,
            len: n,
            ready: false,
        });
        trace!(id, n, "write reservation");
        Reservation::new(self, Direction::Write, id, start_seq, n)
    }

    fn reserve_read_locked(
        &self,
        st: &mut MutexGuard<'_, PipeState<T>>,
        n: usize,
    ) -> Reservation<'_, T> {
        let start_seq = st.base_seq + st.read_frozen as u64;
        st.read_frozen += n;
        let id = st.next_reservation_id;
        st.next_reservation_id += 1;
        st.read_rsv.push_back(ReservationRecord {
            id,
            start_seq,
            len: n,
            ready: false,
        });
        trace!(id, n, "read reservation");
        Reservation::new(self, Direction::Read, id, start_seq, n)
    }
}

impl<T> Pipe<T> {
    pub(crate) fn slot_get(&self, seq: u64) -> T
    where
        T: Clone,
    {
        let st = self.state.lock();
        let index = st.slot_index(seq);
        st.ring[index].clone()
    }

    pub(crate) fn slot_set(&self, seq: u64, value: T) {
        let mut st = self.state.lock();
        let index = st.slot_index(seq);
        st.ring[index] = value;
    }

    /// Mark a reservation ready, then release every ready record from
    /// the front of its direction's FIFO.
    ///
    /// This is what preserves first-reserved-first-visible ordering: a
    /// record committed early stays queued, invisible, until everything
    /// reserved before it has committed too.
    pub(crate) fn commit_record(&self, direction: Direction, id: u64) {
        let mut st = self.state.lock();
        match direction {
            Direction::Write => {
                if let Some(record) = st.write_rsv.iter_mut().find(|r| r.id == id) {
                    record.ready = true;
                }
                let mut released = false;
                while let Some(front) = st.write_rsv.front() {
                    if !front.ready {
                        break;
                    }
                    trace!(id = front.id, "write reservation released");
                    st.write_rsv.pop_front();
                    released = true;
                }
                drop(st);
                if released {
                    // Data became visible; wake the readers.
                    self.write_done.notify_all();
                }
            }
            Direction::Read => {
                if let Some(record) = st.read_rsv.iter_mut().find(|r| r.id == id) {
                    record.ready = true;
                }
                let mut released = false;
                loop {
                    match st.read_rsv.front() {
                        Some(front) if front.ready => {}
                        _ => break,
                    }
                    let front = st.read_rsv.pop_front().expect("front checked above");
                    trace!(id = front.id, "read reservation released");
                    // Everything up to the next pending reservation can
                    // leave the ring, including interleaved frozen
                    // reads; with no reservation left, the whole frozen
                    // region drains.
                    let n_to_pop = match st.read_rsv.front() {
                        None => st.read_frozen,
                        Some(next) => (next.start_seq - st.base_seq) as usize,
                    };
                    st.read_frozen -= n_to_pop;
                    st.base_seq += n_to_pop as u64;
                    for _ in 0..n_to_pop {
                        st.ring.pop_front();
                    }
                    released = true;
                }
                drop(st);
                if released {
                    // Room became available; wake the writers.
                    self.read_done.notify_all();
                }
            }
        }
    }
}
