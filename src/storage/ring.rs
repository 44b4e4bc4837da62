use crate::managed::Slice;

/// A byte ring buffer over caller-provided storage.
///
/// Backs the TCP receive path: segment payload is pushed by the stack and
/// drained by the application. The free space doubles as the advertised
/// receive window. Overflowing bytes are dropped, never overwritten.
#[derive(Debug)]
pub struct Ring<'a> {
    storage: Slice<'a, u8>,
    read: usize,
    fill: usize,
}

impl<'a> Ring<'a> {
    /// Create an empty ring over the given storage.
    pub fn new<T>(storage: T) -> Self
        where T: Into<Slice<'a, u8>>
    {
        Ring {
            storage: storage.into(),
            read: 0,
            fill: 0,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.fill
    }

    /// Check if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    /// Free space in bytes.
    pub fn window(&self) -> usize {
        self.capacity() - self.fill
    }

    /// Append bytes, returning how many actually fit.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let capacity = self.capacity();
        if capacity == 0 {
            return 0;
        }

        let count = data.len().min(self.window());
        let mut write = (self.read + self.fill) % capacity;
        for &byte in &data[..count] {
            self.storage[write] = byte;
            write = (write + 1) % capacity;
        }
        self.fill += count;
        count
    }

    /// Remove bytes into `buf`, returning how many were copied.
    pub fn pop(&mut self, buf: &mut [u8]) -> usize {
        let count = self.peek(buf);
        self.consume(count);
        count
    }

    /// Copy bytes into `buf` without removing them.
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        let capacity = self.capacity();
        let count = buf.len().min(self.fill);
        let mut read = self.read;
        for slot in buf[..count].iter_mut() {
            *slot = self.storage[read];
            read = (read + 1) % capacity;
        }
        count
    }

    /// Discard up to `count` bytes from the front.
    pub fn consume(&mut self, count: usize) -> usize {
        let count = count.min(self.fill);
        if count > 0 {
            self.read = (self.read + count) % self.capacity();
            self.fill -= count;
        }
        count
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.read = 0;
        self.fill = 0;
    }
}
