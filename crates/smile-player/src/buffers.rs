//! Fixed pool of reusable chunk buffers.
//!
//! The engine fills one slot per chunk and rotates through the pool. A slot is
//! only lent to the sink for the duration of one synchronous `emit` call, so a
//! buffer is never reused while the sink could still be reading it.

/// Smallest slot size: one frame of 16-bit stereo.
pub const MIN_CAPACITY: usize = 4;

pub struct BufferPool {
    slots: Vec<Box<[u8]>>,
    capacity: usize,
    next: usize,
}

impl BufferPool {
    /// Allocate `count` buffers (at least 1) of `capacity` bytes each (at least
    /// [`MIN_CAPACITY`], so every slot holds a whole frame).
    pub fn new(count: usize, capacity: usize) -> Self {
        let count = count.max(1);
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            slots: (0..count)
                .map(|_| vec![0u8; capacity].into_boxed_slice())
                .collect(),
            capacity,
            next: 0,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the slot the next call to [`BufferPool::next_slot`] hands out.
    pub fn position(&self) -> usize {
        self.next
    }

    /// Take the next slot in rotation and advance.
    pub fn next_slot(&mut self) -> &mut [u8] {
        let idx = self.next;
        self.next = (self.next + 1) % self.slots.len();
        &mut self.slots[idx]
    }

    /// Restart the rotation at slot 0 (new session).
    pub fn reset(&mut self) {
        self.next = 0;
    }
}
