use crate::pipe::Pipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Read,
    Write,
}

/// A claim on `len` contiguous pipe slots.
///
/// Slots are filled (write direction) or drained (read direction) in any
/// order through `get`/`set`; the claim becomes visible to the other
/// side only on commit, and only once every earlier reservation in the
/// same direction has committed. A handle dropped without an explicit
/// `commit()` call commits automatically, so release happens on every
/// exit path.
pub struct Reservation<'p, T> {
    pipe: &'p Pipe<T>,
    direction: Direction,
    id: u64,
    start_seq: u64,
    len: usize,
    active: bool,
}

impl<'p, T> Reservation<'p, T> {
    pub(crate) fn new(
        pipe: &'p Pipe<T>,
        direction: Direction,
        id: u64,
        start_seq: u64,
        len: usize,
    ) -> Self {
        Self {
            pipe,
            direction,
            id,
            start_seq,
            len,
            active: true,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the element at `index` within the reservation.
    ///
    /// Panics past the end of the claim or after commit; both are
    /// programmer errors.
    pub fn get(&self, index: usize) -> T
    where
        T: Clone,
    {
        self.check_access(index);
        self.pipe.slot_get(self.start_seq + index as u64)
    }

    /// Store `value` at `index` within the reservation.
    ///
    /// Panics past the end of the claim or after commit.
    pub fn set(&self, index: usize, value: T) {
        self.check_access(index);
        self.pipe.slot_set(self.start_seq + index as u64, value);
    }

    /// Copy the whole claim out, front to back.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    /// Fill the whole claim from `values`.
    ///
    /// Panics if the slice length does not match the claim.
    pub fn fill_from(&self, values: &[T])
    where
        T: Clone,
    {
        assert_eq!(
            values.len(),
            self.len,
            "fill_from slice length must match the reservation"
        );
        for (i, value) in values.iter().enumerate() {
            self.set(i, value.clone());
        }
    }

    /// Mark the claim ready and release every ready claim at the front
    /// of its queue.
    ///
    /// Committing twice is harmless; only the first call takes effect.
    pub fn commit(&mut self) {
        if self.active {
            self.active = false;
            self.pipe.commit_record(self.direction, self.id);
        }
    }

    fn check_access(&self, index: usize) {
        assert!(self.active, "reservation used after commit");
        assert!(
            index < self.len,
            "reservation index {index} out of bounds for length {}",
            self.len
        );
    }
}

impl<T> Drop for Reservation<'_, T> {
    fn drop(&mut self) {
        self.commit();
    }
}
