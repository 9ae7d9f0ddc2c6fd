//! Bounded single-producer/single-consumer queues
//!
//! A queue of capacity `N` holds at most `N - 1` items: one slot is always
//! left vacant so that "empty" (`put == get`) and "full" (`put + 1 == get`)
//! can be told apart without a separate counter. The put cursor is only
//! advanced by the producer and the get cursor only by the consumer, which
//! in this crate is enforced by requiring `&mut self` for both.

use crate::{CoreError, Result};

/// Wrap-around put/get index pair over `len` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingPosn {
    put_pos: usize,
    get_pos: usize,
    len: usize,
}

impl RingPosn {
    /// Create an index pair over `len` slots
    pub fn new(len: usize) -> Result<Self> {
        if len < 2 {
            return Err(CoreError::InvalidCapacity { capacity: len });
        }

        Ok(Self {
            put_pos: 0,
            get_pos: 0,
            len,
        })
    }

    /// Number of slots (one more than the number of storable items)
    pub fn len(&self) -> usize {
        self.len
    }

    /// Slot the next put will write
    pub fn pos_to_put(&self) -> usize {
        self.put_pos
    }

    /// Slot the next get will read
    pub fn pos_to_get(&self) -> usize {
        self.get_pos
    }

    pub fn can_put(&self) -> bool {
        (self.put_pos + 1) % self.len != self.get_pos
    }

    pub fn can_get(&self) -> bool {
        self.put_pos != self.get_pos
    }

    /// Advance the put cursor after writing `pos_to_put()`
    pub fn has_put(&mut self) {
        self.put_pos = (self.put_pos + 1) % self.len;
    }

    /// Advance the get cursor after reading `pos_to_get()`
    pub fn has_got(&mut self) {
        self.get_pos = (self.get_pos + 1) % self.len;
    }

    pub fn count(&self) -> usize {
        (self.put_pos + self.len - self.get_pos) % self.len
    }

    pub fn clear(&mut self) {
        self.put_pos = 0;
        self.get_pos = 0;
    }

    /// Slot of the n-th most recently put item (0 is the last one put)
    pub fn nth_from_put(&self, n: usize) -> Option<usize> {
        if n >= self.count() {
            return None;
        }
        Some((self.put_pos + self.len - 1 - n) % self.len)
    }

    /// Slot of the n-th item still to be got (0 is the next one out)
    pub fn nth_from_get(&self, n: usize) -> Option<usize> {
        if n >= self.count() {
            return None;
        }
        Some((self.get_pos + n) % self.len)
    }
}

/// Fixed-capacity FIFO backed by a [`RingPosn`]
///
/// All storage is allocated up front; `put` and `get` never allocate.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    posn: RingPosn,
    slots: Vec<T>,
}

impl<T> BoundedQueue<T>
where
    T: Copy + Default,
{
    /// Create a queue with `capacity` slots, holding at most `capacity - 1` items
    pub fn new(capacity: usize) -> Result<Self> {
        let posn = RingPosn::new(capacity)?;

        Ok(Self {
            posn,
            slots: vec![T::default(); capacity],
        })
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.posn.len()
    }

    pub fn can_put(&self) -> bool {
        self.posn.can_put()
    }

    /// Append an item, handing it back if the queue is full
    pub fn put(&mut self, item: T) -> std::result::Result<(), T> {
        if !self.posn.can_put() {
            return Err(item);
        }
        self.slots[self.posn.pos_to_put()] = item;
        self.posn.has_put();
        Ok(())
    }

    pub fn can_get(&self) -> bool {
        self.posn.can_get()
    }

    /// Remove the oldest item
    pub fn get(&mut self) -> Option<T> {
        if !self.posn.can_get() {
            return None;
        }
        let item = self.slots[self.posn.pos_to_get()];
        self.posn.has_got();
        Some(item)
    }

    pub fn clear(&mut self) {
        self.posn.clear();
    }

    pub fn count(&self) -> usize {
        self.posn.count()
    }

    pub fn is_empty(&self) -> bool {
        !self.posn.can_get()
    }

    /// Slot index of the n-th most recently inserted item
    pub fn nth_from_put(&self, n: usize) -> Option<usize> {
        self.posn.nth_from_put(n)
    }

    /// Slot index of the n-th item due to be removed
    pub fn nth_from_get(&self, n: usize) -> Option<usize> {
        self.posn.nth_from_get(n)
    }

    /// Read a slot by index as returned from `nth_from_put`/`nth_from_get`
    pub fn slot(&self, index: usize) -> Option<T> {
        self.slots.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_queue_creation() {
        let queue = BoundedQueue::<u8>::new(8).unwrap();
        assert_eq!(queue.capacity(), 8);
        assert_eq!(queue.count(), 0);
        assert!(queue.can_put());
        assert!(!queue.can_get());
    }

    #[test]
    fn test_invalid_capacity() {
        assert!(BoundedQueue::<u8>::new(0).is_err());
        assert!(BoundedQueue::<u8>::new(1).is_err());
        assert!(RingPosn::new(2).is_ok());
    }

    #[test]
    fn test_full_at_capacity_minus_one() {
        let mut queue = BoundedQueue::<u8>::new(5).unwrap();
        for i in 0..4 {
            assert!(queue.can_put());
            assert!(queue.put(i).is_ok());
        }
        assert!(!queue.can_put());
        assert_eq!(queue.put(99), Err(99));
        assert_eq!(queue.count(), 4);

        assert_eq!(queue.get(), Some(0));
        assert!(queue.can_put());
    }

    #[test]
    fn test_fifo_order_across_wrap() {
        let mut queue = BoundedQueue::<u32>::new(4).unwrap();
        let mut next_in = 0;
        let mut next_out = 0;
        for _ in 0..10 {
            while queue.put(next_in).is_ok() {
                next_in += 1;
            }
            while let Some(v) = queue.get() {
                assert_eq!(v, next_out);
                next_out += 1;
            }
        }
        assert_eq!(next_in, next_out);
        assert_eq!(next_in, 30);
    }

    #[test]
    fn test_nth_lookups() {
        let mut queue = BoundedQueue::<u8>::new(4).unwrap();
        assert_eq!(queue.nth_from_put(0), None);
        assert_eq!(queue.nth_from_get(0), None);

        // Force the cursors to wrap
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        queue.get();
        queue.get();
        for v in [10, 20, 30] {
            queue.put(v).unwrap();
        }

        let newest = queue.nth_from_put(0).unwrap();
        assert_eq!(queue.slot(newest), Some(30));
        let oldest = queue.nth_from_put(2).unwrap();
        assert_eq!(queue.slot(oldest), Some(10));
        assert_eq!(queue.nth_from_put(3), None);

        assert_eq!(queue.slot(queue.nth_from_get(0).unwrap()), Some(10));
        assert_eq!(queue.slot(queue.nth_from_get(2).unwrap()), Some(30));
        assert_eq!(queue.nth_from_get(3), None);
    }

    #[test]
    fn test_clear() {
        let mut queue = BoundedQueue::<u8>::new(4).unwrap();
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        queue.clear();
        assert_eq!(queue.count(), 0);
        assert_eq!(queue.get(), None);
    }

    #[quickcheck]
    fn prop_count_is_puts_minus_gets(capacity: u8, puts: u8, gets: u8) -> bool {
        let capacity = (capacity as usize % 64) + 2;
        let mut queue = BoundedQueue::<u8>::new(capacity).unwrap();

        let puts = (puts as usize) % capacity;
        let gets = (gets as usize) % (puts + 1);
        for i in 0..puts {
            if queue.put(i as u8).is_err() {
                return false;
            }
        }
        for _ in 0..gets {
            if queue.get().is_none() {
                return false;
            }
        }
        queue.count() == puts - gets
    }

    #[quickcheck]
    fn prop_at_most_capacity_minus_one_puts(capacity: u8) -> bool {
        let capacity = (capacity as usize % 64) + 2;
        let mut queue = BoundedQueue::<u8>::new(capacity).unwrap();
        let mut accepted = 0;
        while queue.can_put() {
            queue.put(0).unwrap();
            accepted += 1;
        }
        accepted == capacity - 1 && queue.put(0).is_err()
    }
}
