//! FIFO token store backed by a growable circular buffer.
//!
//! [`Channel`] is the storage primitive between one producer and its
//! consumers. Live items sit in a ring of `Option<T>` slots addressed by a
//! head index and a length. With [`Capacity::Unbounded`] the ring doubles
//! whenever it fills; with [`Capacity::Bounded`] a full channel refuses puts
//! without changing state.
//!
//! A channel can also keep a history of the most recently taken items. Peeks
//! with a negative offset read from it: `get(-1)` is the last item taken.
//! Only history needs `T: Clone`; a channel without history moves items out
//! of [`Channel::take`] untouched.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::channel::{Capacity, Channel, HistoryCapacity};
//!
//! let mut ch = Channel::new(Capacity::Bounded(2)).with_history(HistoryCapacity::Bounded(1));
//! assert!(ch.put('a'));
//! assert!(ch.put('b'));
//! assert!(!ch.put('c'));
//! assert_eq!(ch.take(), Ok('a'));
//! assert_eq!(ch.get(-1), Ok(&'a'));
//! assert_eq!(ch.get(0), Ok(&'b'));
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Initial slot count for unbounded channels.
const INITIAL_SLOTS: usize = 8;

/// Maximum number of live items a channel may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capacity {
    /// At most this many items.
    Bounded(usize),
    /// Grows on demand.
    Unbounded,
}

/// How many taken items a channel remembers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryCapacity {
    /// Taken items are dropped.
    #[default]
    Disabled,
    /// Keep the most recent `n` taken items.
    Bounded(usize),
    /// Keep every taken item.
    Unbounded,
}

/// A FIFO channel with optional bounded capacity and history.
#[derive(Clone, Debug)]
pub struct Channel<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
    capacity: Capacity,
    history: VecDeque<T>,
    history_capacity: HistoryCapacity,
    /// Copies a taken item into the history. `None` while history is disabled.
    snapshot: Option<fn(&T) -> T>,
}

impl<T> Channel<T> {
    /// Creates an empty channel with no history.
    pub fn new(capacity: Capacity) -> Self {
        let slots = match capacity {
            Capacity::Bounded(n) => n,
            Capacity::Unbounded => INITIAL_SLOTS,
        };
        Self {
            slots: std::iter::repeat_with(|| None).take(slots).collect(),
            head: 0,
            len: 0,
            capacity,
            history: VecDeque::new(),
            history_capacity: HistoryCapacity::Disabled,
            snapshot: None,
        }
    }

    /// Creates an empty unbounded channel.
    pub fn unbounded() -> Self {
        Self::new(Capacity::Unbounded)
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the channel holds no live items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if a bounded channel is at capacity.
    pub fn is_full(&self) -> bool {
        match self.capacity {
            Capacity::Bounded(n) => self.len >= n,
            Capacity::Unbounded => false,
        }
    }

    /// Current capacity.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Number of items in the history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Current history capacity.
    pub fn history_capacity(&self) -> HistoryCapacity {
        self.history_capacity
    }

    /// Appends an item. Returns false, leaving the channel unchanged, if a
    /// bounded channel is full.
    pub fn put(&mut self, item: T) -> bool {
        if !self.reserve(1) {
            return false;
        }
        let tail = self.slot_index(self.len);
        self.slots[tail] = Some(item);
        self.len += 1;
        true
    }

    /// Appends every item, or none of them if they do not all fit.
    pub fn put_batch(&mut self, items: Vec<T>) -> bool {
        if !self.reserve(items.len()) {
            return false;
        }
        for item in items {
            let tail = self.slot_index(self.len);
            self.slots[tail] = Some(item);
            self.len += 1;
        }
        true
    }

    /// Peeks without removing.
    ///
    /// `offset >= 0` counts forward from the oldest live item. `offset < 0`
    /// counts back through the history: `-1` is the most recently taken item.
    pub fn get(&self, offset: isize) -> Result<&T, ChannelError> {
        let out_of_range = ChannelError::OutOfRange { offset };
        if offset >= 0 {
            let offset = offset as usize;
            if offset >= self.len {
                return Err(out_of_range);
            }
            self.slots[self.slot_index(offset)]
                .as_ref()
                .ok_or(out_of_range)
        } else {
            let back = offset.unsigned_abs();
            if back > self.history.len() {
                return Err(out_of_range);
            }
            self.history
                .get(self.history.len() - back)
                .ok_or(out_of_range)
        }
    }

    /// Changes the capacity. Fails if the channel holds more items than `capacity`.
    pub fn set_capacity(&mut self, capacity: Capacity) -> Result<(), ChannelError> {
        let slots = match capacity {
            Capacity::Bounded(n) if n < self.len => {
                return Err(ChannelError::CapacityTooSmall {
                    requested: n,
                    len: self.len,
                });
            }
            Capacity::Bounded(n) => n,
            Capacity::Unbounded => self.slots.len().max(INITIAL_SLOTS),
        };
        self.relayout(slots);
        self.capacity = capacity;
        Ok(())
    }

    /// Removes and returns the oldest item, recording it in the history.
    pub fn take(&mut self) -> Result<T, ChannelError> {
        let item = self.pop_front()?;
        if let Some(snapshot) = self.snapshot {
            self.remember(snapshot(&item));
        }
        Ok(item)
    }

    /// Removes the `n` oldest items, or nothing if fewer than `n` are present.
    pub fn take_batch(&mut self, n: usize) -> Result<Vec<T>, ChannelError> {
        if n > self.len {
            return Err(ChannelError::Empty);
        }
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.take()?);
        }
        Ok(items)
    }

    /// Removes every live item. The history is kept.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    /// Removes every history entry.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Iterates over live items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.slots[self.slot_index(i)].as_ref())
    }

    fn slot_index(&self, offset: usize) -> usize {
        (self.head + offset) % self.slots.len()
    }

    /// Makes room for `additional` items, growing an unbounded ring if needed.
    fn reserve(&mut self, additional: usize) -> bool {
        let needed = self.len + additional;
        if needed <= self.slots.len() {
            return true;
        }
        match self.capacity {
            Capacity::Bounded(_) => false,
            Capacity::Unbounded => {
                let mut size = self.slots.len().max(1);
                while size < needed {
                    size *= 2;
                }
                self.relayout(size);
                true
            }
        }
    }

    /// Moves live items to a fresh ring of `size` slots starting at index 0.
    fn relayout(&mut self, size: usize) {
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(size).collect();
        for (i, slot) in slots.iter_mut().enumerate().take(self.len) {
            let from = (self.head + i) % self.slots.len();
            *slot = self.slots[from].take();
        }
        self.slots = slots;
        self.head = 0;
    }

    fn remember(&mut self, item: T) {
        match self.history_capacity {
            HistoryCapacity::Disabled | HistoryCapacity::Bounded(0) => {}
            HistoryCapacity::Bounded(n) => {
                if self.history.len() >= n {
                    self.history.pop_front();
                }
                self.history.push_back(item);
            }
            HistoryCapacity::Unbounded => self.history.push_back(item),
        }
    }

    fn pop_front(&mut self) -> Result<T, ChannelError> {
        if self.len == 0 {
            return Err(ChannelError::Empty);
        }
        let item = self.slots[self.head].take().ok_or(ChannelError::Empty)?;
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        Ok(item)
    }
}

impl<T: Clone> Channel<T> {
    /// Sets the history capacity.
    pub fn with_history(mut self, history: HistoryCapacity) -> Self {
        self.set_history_capacity(history);
        self
    }

    /// Changes the history capacity, dropping the oldest entries that no
    /// longer fit.
    pub fn set_history_capacity(&mut self, history: HistoryCapacity) {
        match history {
            HistoryCapacity::Disabled => self.history.clear(),
            HistoryCapacity::Bounded(n) => {
                while self.history.len() > n {
                    self.history.pop_front();
                }
            }
            HistoryCapacity::Unbounded => {}
        }
        self.history_capacity = history;
        self.snapshot = match history {
            HistoryCapacity::Disabled | HistoryCapacity::Bounded(0) => None,
            _ => Some(T::clone as fn(&T) -> T),
        };
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_put_take_order() {
        let mut ch = Channel::new(Capacity::Bounded(4));
        for i in 0..4 {
            assert!(ch.put(i));
        }
        assert!(!ch.put(4));
        assert_eq!(ch.len(), 4);
        for i in 0..4 {
            assert_eq!(ch.take(), Ok(i));
        }
        assert_eq!(ch.take(), Err(ChannelError::Empty));
    }

    #[test]
    fn test_full_put_leaves_state_unchanged() {
        let mut ch = Channel::new(Capacity::Bounded(1));
        assert!(ch.put("a"));
        assert!(!ch.put("b"));
        assert_eq!(ch.len(), 1);
        assert_eq!(ch.get(0), Ok(&"a"));
    }

    #[test]
    fn test_zero_capacity_refuses() {
        let mut ch = Channel::new(Capacity::Bounded(0));
        assert!(!ch.put(1));
        assert!(ch.is_empty());
        assert_eq!(ch.get(0), Err(ChannelError::OutOfRange { offset: 0 }));
    }

    #[test]
    fn test_unbounded_grows_and_wraps() {
        let mut ch = Channel::unbounded();
        for i in 0..5 {
            ch.put(i);
        }
        for i in 0..3 {
            assert_eq!(ch.take(), Ok(i));
        }
        // Wrap the head, then force a doubling.
        for i in 5..20 {
            assert!(ch.put(i));
        }
        let drained: Vec<_> = std::iter::from_fn(|| ch.take().ok()).collect();
        assert_eq!(drained, (3..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_put_batch_is_atomic() {
        let mut ch = Channel::new(Capacity::Bounded(3));
        assert!(ch.put(0));
        assert!(!ch.put_batch(vec![1, 2, 3]));
        assert_eq!(ch.len(), 1);
        assert!(ch.put_batch(vec![1, 2]));
        assert_eq!(ch.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_take_batch_is_atomic() {
        let mut ch = Channel::unbounded();
        ch.put_batch(vec![1, 2]);
        assert_eq!(ch.take_batch(3), Err(ChannelError::Empty));
        assert_eq!(ch.len(), 2);
        assert_eq!(ch.take_batch(2), Ok(vec![1, 2]));
    }

    #[test]
    fn test_history_eviction_and_negative_offsets() {
        let mut ch = Channel::unbounded().with_history(HistoryCapacity::Bounded(2));
        ch.put_batch(vec![10, 20, 30]);
        ch.take_batch(3).unwrap();
        assert_eq!(ch.history_len(), 2);
        assert_eq!(ch.get(-1), Ok(&30));
        assert_eq!(ch.get(-2), Ok(&20));
        assert_eq!(ch.get(-3), Err(ChannelError::OutOfRange { offset: -3 }));
    }

    #[test]
    fn test_items_without_clone_drain_in_order() {
        #[derive(Debug, PartialEq)]
        struct Opaque(u32);

        let mut ch = Channel::new(Capacity::Bounded(3));
        assert!(ch.put_batch(vec![Opaque(1), Opaque(2), Opaque(3)]));
        assert_eq!(ch.take(), Ok(Opaque(1)));
        assert_eq!(ch.take_batch(2), Ok(vec![Opaque(2), Opaque(3)]));
        assert_eq!(ch.history_len(), 0);
        assert_eq!(ch.get(-1), Err(ChannelError::OutOfRange { offset: -1 }));
    }

    #[test]
    fn test_history_disabled_by_default() {
        let mut ch = Channel::unbounded();
        ch.put(1);
        ch.take().unwrap();
        assert_eq!(ch.history_len(), 0);
        assert!(ch.get(-1).is_err());
    }

    #[test]
    fn test_unbounded_history_keeps_everything() {
        let mut ch = Channel::unbounded().with_history(HistoryCapacity::Unbounded);
        ch.put_batch((0..50).collect());
        ch.take_batch(50).unwrap();
        assert_eq!(ch.history_len(), 50);
        assert_eq!(ch.get(-50), Ok(&0));
    }

    #[test]
    fn test_set_capacity() {
        let mut ch = Channel::unbounded();
        ch.put_batch(vec![1, 2, 3]);
        assert_eq!(
            ch.set_capacity(Capacity::Bounded(2)),
            Err(ChannelError::CapacityTooSmall {
                requested: 2,
                len: 3
            })
        );
        assert!(ch.set_capacity(Capacity::Bounded(3)).is_ok());
        assert!(!ch.put(4));
        assert_eq!(ch.take(), Ok(1));
        assert!(ch.put(4));
        assert_eq!(ch.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_shrinking_history_drops_oldest() {
        let mut ch = Channel::unbounded().with_history(HistoryCapacity::Unbounded);
        ch.put_batch(vec![1, 2, 3]);
        ch.take_batch(3).unwrap();
        ch.set_history_capacity(HistoryCapacity::Bounded(1));
        assert_eq!(ch.get(-1), Ok(&3));
        assert_eq!(ch.history_len(), 1);
    }

    #[test]
    fn test_clear_keeps_history() {
        let mut ch = Channel::unbounded().with_history(HistoryCapacity::Bounded(4));
        ch.put_batch(vec![1, 2]);
        ch.take().unwrap();
        ch.clear();
        assert!(ch.is_empty());
        assert_eq!(ch.history_len(), 1);
        ch.clear_history();
        assert_eq!(ch.history_len(), 0);
    }
}
