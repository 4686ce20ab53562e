//! Fixed-capacity ring buffer of 32-bit integers, shared by the GPU command
//! queue and the CD-ROM's parameter/response/data registers.

/// A bounded FIFO of `i32`. Construction allocates its backing storage once;
/// no further allocation occurs. `enqueue` on a full queue and `dequeue` on
/// an empty one are no-ops (returning `0` in the latter case) rather than
/// panics, matching the reference queue's "never blocks" contract.
#[derive(Debug, Clone)]
pub struct Fifo {
    entries: Vec<i32>,
    head: usize,
    tail: usize,
    current_size: usize,
    max_size: usize,
}

impl Fifo {
    pub fn new(max_size: usize) -> Self {
        let mut fifo = Self {
            entries: vec![0; max_size],
            head: 0,
            tail: max_size.saturating_sub(1),
            current_size: 0,
            max_size,
        };
        fifo.reset();
        fifo
    }

    /// Clears every entry and resets head/tail to the canonical empty
    /// position. The reference implementation only clears the first slot of
    /// the backing array here; since `reset`'s own contract promises "clears
    /// all entries", this zeroes the whole buffer.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = 0;
        }
        self.current_size = 0;
        self.head = 0;
        self.tail = self.max_size.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.current_size == 0
    }

    pub fn is_full(&self) -> bool {
        self.current_size == self.max_size
    }

    pub fn len(&self) -> usize {
        self.current_size
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn enqueue(&mut self, data: i32) {
        if self.is_full() {
            return;
        }
        self.tail = (self.tail + 1) % self.max_size;
        self.current_size += 1;
        self.entries[self.tail] = data;
    }

    pub fn dequeue(&mut self) -> i32 {
        if self.is_empty() {
            return 0;
        }
        let entry = self.entries[self.head];
        self.head = (self.head + 1) % self.max_size;
        self.current_size -= 1;
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_sequence_up_to_capacity() {
        let mut fifo = Fifo::new(16);
        let values: Vec<i32> = (0..16).collect();
        for &v in &values {
            fifo.enqueue(v);
        }
        assert!(fifo.is_full());
        let mut out = Vec::new();
        while !fifo.is_empty() {
            out.push(fifo.dequeue());
        }
        assert_eq!(out, values);
        assert!(fifo.is_empty());
    }

    #[test]
    fn enqueue_on_full_queue_is_a_no_op() {
        let mut fifo = Fifo::new(2);
        fifo.enqueue(1);
        fifo.enqueue(2);
        fifo.enqueue(3);
        assert_eq!(fifo.dequeue(), 1);
        assert_eq!(fifo.dequeue(), 2);
        assert!(fifo.is_empty());
    }

    #[test]
    fn dequeue_on_empty_queue_returns_zero() {
        let mut fifo = Fifo::new(4);
        assert_eq!(fifo.dequeue(), 0);
    }

    #[test]
    fn reset_clears_every_entry() {
        let mut fifo = Fifo::new(4);
        fifo.enqueue(7);
        fifo.enqueue(8);
        fifo.reset();
        assert!(fifo.is_empty());
        assert!(!fifo.is_full());
        assert_eq!(fifo.dequeue(), 0);
    }
}
