/// A fixed-capacity circular FIFO byte queue.
///
/// `rpos` points at the oldest unread byte; the write position is derived as
/// `(rpos + len) % N`.
///
/// invariants: 0 <= len <= N, 0 <= rpos < N
///
/// When the queue is full, `push` silently overwrites the oldest unread byte
/// and increments the overrun counter. The queue performs no synchronization
/// of its own; callers that share it across the interrupt boundary must
/// provide mutual exclusion.
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    rpos: usize,
    len: usize,
    overruns: u32,
}

impl<const N: usize> RingBuffer<N> {
    /// Creates an empty queue. The capacity `N` must be non-zero.
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            rpos: 0,
            len: 0,
            overruns: 0,
        }
    }

    /// Appends one byte. On overflow the oldest unread byte is lost.
    pub fn push(&mut self, byte: u8) {
        let wpos = (self.rpos + self.len) % N;
        self.buf[wpos] = byte;

        if self.len == N {
            // Full: the byte just written replaced the oldest unread one.
            self.rpos = (self.rpos + 1) % N;
            self.overruns = self.overruns.wrapping_add(1);
        } else {
            self.len += 1;
        }
    }

    /// Removes and returns the oldest byte, or `None` if the queue is empty.
    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }

        let byte = self.buf[self.rpos];
        self.rpos = (self.rpos + 1) % N;
        self.len -= 1;
        Some(byte)
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Discards all buffered bytes. The overrun counter is left alone.
    pub fn clear(&mut self) {
        self.rpos = 0;
        self.len = 0;
    }

    /// Number of bytes lost to overflow since construction.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RingBuffer;

    #[test]
    fn fifo_order() {
        let mut b: RingBuffer<8> = RingBuffer::new();

        for byte in 1..=5 {
            b.push(byte);
        }
        assert_eq!(b.len(), 5);

        for byte in 1..=5 {
            assert_eq!(b.pop(), Some(byte));
        }
        assert_eq!(b.pop(), None);
        assert!(b.is_empty());
    }

    #[test]
    fn len_tracks_push_and_pop() {
        let mut b: RingBuffer<4> = RingBuffer::new();

        b.push(1);
        b.push(2);
        assert_eq!(b.len(), 2);

        b.pop();
        assert_eq!(b.len(), 1);

        b.push(3);
        b.push(4);
        b.push(5);
        assert_eq!(b.len(), 4);
        assert!(b.is_full());
    }

    #[test]
    fn overflow_overwrites_oldest() {
        let mut b: RingBuffer<4> = RingBuffer::new();

        // 7 bytes into a 4-byte queue: only the last 4 survive.
        for byte in 0..7 {
            b.push(byte);
        }

        assert_eq!(b.len(), 4);
        assert_eq!(b.overruns(), 3);

        for byte in 3..7 {
            assert_eq!(b.pop(), Some(byte));
        }
        assert_eq!(b.pop(), None);
    }

    #[test]
    fn overflow_policy_is_repeatable() {
        let mut b: RingBuffer<4> = RingBuffer::new();

        for round in 0..3u8 {
            for byte in 0..7 {
                b.push(round * 10 + byte);
            }
            for byte in 3..7 {
                assert_eq!(b.pop(), Some(round * 10 + byte));
            }
            assert!(b.is_empty());
        }

        assert_eq!(b.overruns(), 9);
    }

    #[test]
    fn wraps_across_the_end_of_storage() {
        let mut b: RingBuffer<4> = RingBuffer::new();

        b.push(1);
        b.push(2);
        b.push(3);
        assert_eq!(b.pop(), Some(1));
        assert_eq!(b.pop(), Some(2));

        // Write position now wraps past the end of the backing array.
        b.push(4);
        b.push(5);
        b.push(6);
        assert_eq!(b.len(), 4);

        for byte in 3..=6 {
            assert_eq!(b.pop(), Some(byte));
        }
    }

    #[test]
    fn clear_empties_the_queue() {
        let mut b: RingBuffer<4> = RingBuffer::new();

        b.push(1);
        b.push(2);
        b.clear();

        assert!(b.is_empty());
        assert_eq!(b.pop(), None);
        assert_eq!(b.overruns(), 0);
    }
}
