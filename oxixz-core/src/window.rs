//! Dictionary window (sliding history) for LZMA decompression.
//!
//! The window is a circular buffer of `dict_size` bytes. Decoded bytes are
//! written into it and later drained to the caller; back-references copy from
//! the most recent `dict_size` bytes of history.
//!
//! The buffer is grown lazily, so a stream that declares a 1.5 GiB dictionary
//! but only holds a few kilobytes never allocates more than it uses.
//!
//! Bytes that have been written but not yet drained are never overwritten.
//! Callers must keep each write within [`Window::avail`] and call
//! [`Window::drain`] to make room.

use crate::error::{Result, XzError};

/// Smallest dictionary the window accepts.
pub const MIN_DICT_SIZE: usize = 4096;

/// Sliding dictionary window.
#[derive(Debug, Clone)]
pub struct Window {
    /// Backing storage; grows up to `size` bytes.
    buf: Vec<u8>,
    /// Logical window size.
    size: usize,
    /// Next write position in `buf`, always `< size`.
    pos: usize,
    /// Bytes of valid history, at most `size`.
    full: usize,
    /// Bytes written since the last reset.
    total: u64,
    /// Bytes written but not yet drained.
    pending: usize,
}

impl Window {
    /// Create a window of `dict_size` bytes.
    ///
    /// Sizes below [`MIN_DICT_SIZE`] are raised to it.
    pub fn new(dict_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            size: dict_size.max(MIN_DICT_SIZE),
            pos: 0,
            full: 0,
            total: 0,
            pending: 0,
        }
    }

    /// Logical window size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes of history a back-reference may reach.
    pub fn history(&self) -> usize {
        self.full
    }

    /// Whether the window holds no history.
    pub fn is_empty(&self) -> bool {
        self.full == 0
    }

    /// Total bytes written since the last reset.
    ///
    /// LZMA derives `pos_state` and the literal position from this.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes that may be written before a drain is needed.
    pub fn avail(&self) -> usize {
        self.size - self.pending
    }

    /// Bytes written but not yet drained.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Discard all history. Pending bytes must have been drained first.
    ///
    /// The allocation is kept for the next LZMA2 unit.
    pub fn reset(&mut self) {
        debug_assert_eq!(self.pending, 0, "reset with undrained bytes");
        self.pos = 0;
        self.full = 0;
        self.total = 0;
        self.pending = 0;
    }

    /// Append one byte.
    #[inline]
    pub fn put(&mut self, byte: u8) {
        debug_assert!(self.pending < self.size, "window overrun");
        self.push_history(byte);
        self.pending += 1;
    }

    /// Append bytes the caller already delivered elsewhere.
    ///
    /// They become history for later back-references but are not pending,
    /// so [`Window::drain`] never returns them.
    pub fn extend_delivered(&mut self, data: &[u8]) {
        debug_assert_eq!(self.pending, 0, "delivered bytes behind pending ones");
        for &byte in data {
            self.push_history(byte);
        }
    }

    #[inline]
    fn push_history(&mut self, byte: u8) {
        if self.pos == self.buf.len() {
            self.buf.push(byte);
        } else {
            self.buf[self.pos] = byte;
        }
        self.pos += 1;
        if self.pos == self.size {
            self.pos = 0;
        }
        if self.full < self.size {
            self.full += 1;
        }
        self.total += 1;
    }

    /// Byte `distance` positions back (1 is the most recent byte).
    ///
    /// Returns 0 when `distance` reaches past the available history.
    #[inline]
    pub fn byte_at(&self, distance: usize) -> u8 {
        if distance == 0 || distance > self.full {
            return 0;
        }
        self.buf[self.index_back(distance)]
    }

    /// Copy up to `length` bytes starting `distance` bytes back.
    ///
    /// Overlapping copies (`length > distance`) repeat the pattern, as LZ77
    /// requires. At most [`Window::avail`] bytes are copied; the number
    /// copied is returned so the caller can resume the rest later.
    pub fn copy_match(&mut self, distance: usize, length: usize) -> Result<usize> {
        if distance == 0 || distance > self.full {
            return Err(XzError::distance_too_far(distance, self.full));
        }

        let count = length.min(self.avail());
        let mut src = self.index_back(distance);
        for _ in 0..count {
            let byte = self.buf[src];
            self.put(byte);
            src += 1;
            if src == self.size {
                src = 0;
            }
        }
        Ok(count)
    }

    /// Move pending bytes, oldest first, into `out`.
    ///
    /// Returns the number of bytes copied.
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        let count = self.pending.min(out.len());
        if count == 0 {
            return 0;
        }

        let start = self.index_back(self.pending);
        let first = count.min(self.size - start);
        out[..first].copy_from_slice(&self.buf[start..start + first]);
        if first < count {
            out[first..count].copy_from_slice(&self.buf[..count - first]);
        }
        self.pending -= count;
        count
    }

    #[inline]
    fn index_back(&self, distance: usize) -> usize {
        if self.pos >= distance {
            self.pos - distance
        } else {
            self.pos + self.size - distance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn drain_all(window: &mut Window) -> Vec<u8> {
        let mut out = vec![0u8; window.pending()];
        let n = window.drain(&mut out);
        out.truncate(n);
        out
    }

    #[test]
    fn test_put_and_drain() {
        let mut window = Window::new(4096);
        for &b in b"abc" {
            window.put(b);
        }
        assert_eq!(window.history(), 3);
        assert_eq!(window.total(), 3);
        assert_eq!(drain_all(&mut window), b"abc");
        assert_eq!(window.pending(), 0);
    }

    #[test]
    fn test_get() {
        let mut window = Window::new(4096);
        for &b in b"xyz" {
            window.put(b);
        }
        assert_eq!(window.byte_at(1), b'z');
        assert_eq!(window.byte_at(3), b'x');
        assert_eq!(window.byte_at(4), 0);
    }

    #[test]
    fn test_overlapping_copy() {
        let mut window = Window::new(4096);
        window.put(b'a');
        window.put(b'b');
        assert_eq!(window.copy_match(2, 5).unwrap(), 5);
        assert_eq!(drain_all(&mut window), b"abababa");
    }

    #[test]
    fn test_distance_too_far() {
        let mut window = Window::new(4096);
        window.put(b'a');
        let err = window.copy_match(2, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DistanceTooFar);

        let err = window.copy_match(0, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DistanceTooFar);
    }

    #[test]
    fn test_wraparound() {
        let mut window = Window::new(MIN_DICT_SIZE);
        let mut out = vec![0u8; 1000];
        let mut expected = Vec::new();
        let mut produced = Vec::new();
        for i in 0..10_000u32 {
            let byte = (i % 251) as u8;
            window.put(byte);
            expected.push(byte);
            if window.avail() == 0 {
                let n = window.drain(&mut out);
                produced.extend_from_slice(&out[..n]);
            }
        }
        while window.pending() > 0 {
            let n = window.drain(&mut out);
            produced.extend_from_slice(&out[..n]);
        }
        assert_eq!(produced, expected);
        assert_eq!(window.history(), MIN_DICT_SIZE);
        assert_eq!(window.byte_at(MIN_DICT_SIZE), expected[expected.len() - MIN_DICT_SIZE]);
    }

    #[test]
    fn test_copy_limited_by_avail() {
        let mut window = Window::new(MIN_DICT_SIZE);
        window.put(7);
        let copied = window.copy_match(1, MIN_DICT_SIZE * 2).unwrap();
        assert_eq!(copied, MIN_DICT_SIZE - 1);
        assert_eq!(window.avail(), 0);
    }

    #[test]
    fn test_extend_delivered() {
        let mut window = Window::new(MIN_DICT_SIZE);
        window.extend_delivered(b"hello");
        assert_eq!(window.pending(), 0);
        assert_eq!(window.total(), 5);
        assert_eq!(window.copy_match(5, 5).unwrap(), 5);
        assert_eq!(drain_all(&mut window), b"hello");

        let long: Vec<u8> = (0..3 * MIN_DICT_SIZE).map(|i| i as u8).collect();
        window.extend_delivered(&long);
        assert_eq!(window.history(), MIN_DICT_SIZE);
        assert_eq!(window.byte_at(1), *long.last().unwrap());
    }

    #[test]
    fn test_reset_discards_history() {
        let mut window = Window::new(4096);
        window.put(1);
        drain_all(&mut window);
        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.total(), 0);
        assert!(window.copy_match(1, 1).is_err());
    }
}
