//! `ByteBuffer`: a linear read/write cursor buffer with compaction and growth.
//!
//! This is the Rust rendition of the original's `DataBuffer` helper: a single
//! growable `Vec<u8>` with a read cursor and a write cursor, `read_pos <=
//! write_pos <= capacity`. Stream-mode sessions read into the tail past
//! `write_pos` and hand the readable prefix `[read_pos, write_pos)` to the
//! user callback; framed-mode sessions use two of these (header, body) sized
//! exactly to what the length probes report.

/// Growable linear buffer with independent read and write cursors.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl ByteBuffer {
    /// Create an empty buffer with no preallocated capacity.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Create an empty buffer with `capacity` bytes preallocated.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Bytes available to read: `write_pos - read_pos`.
    #[inline]
    #[must_use]
    pub const fn readable(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Bytes available to write before the buffer must grow.
    #[inline]
    #[must_use]
    pub fn writable(&self) -> usize {
        self.data.len() - self.write_pos
    }

    #[inline]
    #[must_use]
    pub const fn read_pos(&self) -> usize {
        self.read_pos
    }

    #[inline]
    #[must_use]
    pub const fn write_pos(&self) -> usize {
        self.write_pos
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The readable slice `[read_pos, write_pos)`.
    #[inline]
    #[must_use]
    pub fn readable_slice(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// The writable tail `[write_pos, capacity)`, growing first if `min_free`
    /// bytes aren't available.
    pub fn writable_tail_mut(&mut self, min_free: usize) -> &mut [u8] {
        self.reserve(min_free);
        &mut self.data[self.write_pos..]
    }

    /// Ensure at least `min_free` bytes are writable past `write_pos`,
    /// growing the backing store if necessary.
    ///
    /// Growth follows the original's `Extend`: `capacity = write_pos + len;
    /// capacity += capacity >> 2` — i.e. grow to fit the write plus 25%.
    pub fn reserve(&mut self, min_free: usize) {
        if self.writable() >= min_free {
            return;
        }
        let mut new_capacity = self.write_pos + min_free;
        new_capacity += new_capacity >> 2;
        self.data.resize(new_capacity, 0);
    }

    /// Advance the write cursor by `n` bytes after writing into the tail
    /// returned by `writable_tail_mut`.
    ///
    /// # Panics
    ///
    /// Panics if `n` would push `write_pos` past the backing store's length.
    pub fn advance_write(&mut self, n: usize) {
        assert!(self.write_pos + n <= self.data.len());
        self.write_pos += n;
    }

    /// Append `src` to the buffer, growing as needed.
    pub fn write(&mut self, src: &[u8]) {
        self.reserve(src.len());
        let start = self.write_pos;
        self.data[start..start + src.len()].copy_from_slice(src);
        self.write_pos += src.len();
    }

    /// Copy `n` bytes starting at `read_pos` into `dst` and advance `read_pos`.
    ///
    /// Fails if fewer than `n` bytes are readable.
    pub fn read(&mut self, dst: &mut [u8], n: usize) -> Result<(), BufferError> {
        if self.read_pos + n > self.write_pos {
            return Err(BufferError::Underrun {
                requested: n,
                available: self.readable(),
            });
        }
        dst[..n].copy_from_slice(&self.data[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        Ok(())
    }

    /// Discard `n` bytes from the front of the readable region without
    /// copying them anywhere.
    pub fn skip(&mut self, n: usize) -> Result<(), BufferError> {
        if self.read_pos + n > self.write_pos {
            return Err(BufferError::Underrun {
                requested: n,
                available: self.readable(),
            });
        }
        self.read_pos += n;
        Ok(())
    }

    /// Shift `[read_pos, write_pos)` to the start of the backing store and
    /// reset `read_pos` to zero.
    ///
    /// Idempotent when `read_pos == 0`.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        self.data.copy_within(self.read_pos..self.write_pos, 0);
        self.write_pos -= self.read_pos;
        self.read_pos = 0;
    }

    /// Reset both cursors to zero without deallocating.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }
}

/// Errors raised by `ByteBuffer` read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Fewer bytes were readable than requested.
    #[error("buffer underrun: requested {requested} bytes, {available} available")]
    Underrun { requested: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = ByteBuffer::new();
        buf.write(b"hello world");
        let mut out = [0u8; 5];
        buf.read(&mut out, 5).unwrap();
        assert_eq!(&out, b"hello");
        assert_eq!(buf.readable(), 6);
    }

    #[test]
    fn read_past_write_pos_fails() {
        let mut buf = ByteBuffer::new();
        buf.write(b"abc");
        let mut out = [0u8; 10];
        assert!(buf.read(&mut out, 10).is_err());
    }

    #[test]
    fn compact_on_already_compacted_buffer_is_idempotent() {
        let mut buf = ByteBuffer::new();
        buf.write(b"abcdef");
        assert_eq!(buf.read_pos(), 0);
        let before = buf.readable_slice().to_vec();
        buf.compact();
        assert_eq!(buf.read_pos(), 0);
        assert_eq!(buf.readable_slice().to_vec(), before);
    }

    #[test]
    fn compact_is_idempotent_when_applied_twice() {
        let mut buf = ByteBuffer::new();
        buf.write(b"abcdefgh");
        let mut out = [0u8; 3];
        buf.read(&mut out, 3).unwrap();
        buf.compact();
        let once = (buf.read_pos(), buf.write_pos(), buf.readable_slice().to_vec());
        buf.compact();
        let twice = (buf.read_pos(), buf.write_pos(), buf.readable_slice().to_vec());
        assert_eq!(once, twice);
    }

    #[test]
    fn compact_preserves_readable_bytes_shifted_by_read_pos() {
        let mut buf = ByteBuffer::new();
        buf.write(b"0123456789");
        let mut out = [0u8; 4];
        buf.read(&mut out, 4).unwrap();
        let before: Vec<u8> = buf.readable_slice().to_vec();
        buf.compact();
        let after: Vec<u8> = buf.readable_slice().to_vec();
        assert_eq!(before, after);
        assert_eq!(after, b"456789");
    }

    #[test]
    fn reserve_grows_by_125_percent_of_the_requested_write() {
        let mut buf = ByteBuffer::new();
        buf.reserve(100);
        // capacity = write_pos(0) + 100; capacity += capacity >> 2 == 125
        assert_eq!(buf.capacity(), 125);
    }

    #[test]
    fn skip_advances_read_pos_without_copying() {
        let mut buf = ByteBuffer::new();
        buf.write(b"header+body");
        buf.skip(7).unwrap();
        assert_eq!(buf.readable_slice(), b"body");
    }
}
