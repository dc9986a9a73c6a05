//! Hash-chain match finder for the LZMA encoder.
//!
//! Input is appended to a contiguous buffer addressed by absolute position
//! (bytes since the start of the block). Positions are inserted into a 3-byte
//! hash chain lazily, right before a search needs them. Old bytes are dropped
//! once they fall out of both the dictionary and the chunk being encoded.

use crate::model::MATCH_LEN_MAX;

/// Hash table size (64K entries).
const HASH_SIZE: usize = 1 << 16;

/// Minimum length a hash-chain match can have.
pub const HASH_MATCH_MIN: usize = 3;

/// Smallest amount of dead history worth compacting away.
const TRIM_MIN: usize = 1 << 20;

/// Hash-chain match finder over a sliding buffer.
#[derive(Debug, Clone)]
pub struct MatchFinder {
    /// Buffered input; `buf[0]` is at absolute position `base`.
    buf: Vec<u8>,
    /// Absolute position of `buf[0]`.
    base: u64,
    /// Next absolute position to insert into the hash chain.
    hashed: u64,
    /// Most recent buffer index + 1 for each hash; 0 is empty.
    head: Vec<u32>,
    /// Previous buffer index + 1 with the same hash, parallel to `buf`.
    chain: Vec<u32>,
    /// Maximum match distance.
    dict_size: usize,
    /// Maximum chain links followed per search.
    depth: usize,
    /// Length at which a search stops early.
    nice_len: usize,
}

impl MatchFinder {
    /// Create a match finder.
    pub fn new(dict_size: usize, depth: usize, nice_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            base: 0,
            hashed: 0,
            head: vec![0; HASH_SIZE],
            chain: Vec::new(),
            dict_size,
            depth: depth.max(1),
            nice_len: nice_len.clamp(HASH_MATCH_MIN, MATCH_LEN_MAX),
        }
    }

    /// Calculate hash for 3 bytes (FNV-1a).
    #[inline]
    fn hash3(data: &[u8]) -> usize {
        let mut h = 2166136261u32;
        h ^= data[0] as u32;
        h = h.wrapping_mul(16777619);
        h ^= data[1] as u32;
        h = h.wrapping_mul(16777619);
        h ^= data[2] as u32;
        h = h.wrapping_mul(16777619);
        (h as usize) & (HASH_SIZE - 1)
    }

    /// Maximum match distance.
    pub fn dict_size(&self) -> usize {
        self.dict_size
    }

    /// Append input.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        self.chain.resize(self.buf.len(), 0);
    }

    /// Absolute position one past the last buffered byte.
    pub fn end(&self) -> u64 {
        self.base + self.buf.len() as u64
    }

    /// Bytes buffered at and after `pos`.
    pub fn available(&self, pos: u64) -> usize {
        (self.end() - pos) as usize
    }

    /// Byte at absolute position `pos`.
    #[inline]
    pub fn byte_at(&self, pos: u64) -> u8 {
        self.buf[(pos - self.base) as usize]
    }

    /// Buffered bytes in `start..start + len`.
    pub fn slice(&self, start: u64, len: usize) -> &[u8] {
        let from = (start - self.base) as usize;
        &self.buf[from..from + len]
    }

    /// Number of bytes at `pos` equal to those `dist` bytes earlier, up to
    /// `max_len`.
    #[inline]
    pub fn match_len(&self, pos: u64, dist: usize, max_len: usize) -> usize {
        let cur = (pos - self.base) as usize;
        let src = cur - dist;
        let max_len = max_len.min(self.buf.len() - cur);
        self.buf[cur..cur + max_len]
            .iter()
            .zip(&self.buf[src..src + max_len])
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Insert every position before `target` that has enough lookahead.
    fn insert_to(&mut self, target: u64) {
        let end = self.end();
        while self.hashed < target && self.hashed + HASH_MATCH_MIN as u64 <= end {
            let idx = (self.hashed - self.base) as usize;
            let h = Self::hash3(&self.buf[idx..]);
            self.chain[idx] = self.head[h];
            self.head[h] = idx as u32 + 1;
            self.hashed += 1;
        }
    }

    /// Longest match at `pos` no longer than `max_len` and no farther than
    /// `history` bytes back. Returns `(length, distance)` with a length of at
    /// least [`HASH_MATCH_MIN`].
    pub fn find_longest(&mut self, pos: u64, max_len: usize, history: usize) -> Option<(usize, usize)> {
        self.insert_to(pos);

        let max_len = max_len.min(self.available(pos)).min(MATCH_LEN_MAX);
        if max_len < HASH_MATCH_MIN {
            return None;
        }

        let cur = (pos - self.base) as usize;
        let mut candidate = self.head[Self::hash3(&self.buf[cur..])];
        let mut best: Option<(usize, usize)> = None;
        let mut links = 0;

        while candidate != 0 && links < self.depth {
            let idx = candidate as usize - 1;
            if idx >= cur {
                break;
            }
            let dist = cur - idx;
            if dist > history {
                break;
            }

            let best_len = best.map_or(HASH_MATCH_MIN - 1, |(len, _)| len);
            // A longer match must also differ from the current best at its end.
            if self.buf[idx + best_len] == self.buf[cur + best_len] {
                let len = self.match_len(pos, dist, max_len);
                if len > best_len {
                    best = Some((len, dist));
                    if len >= self.nice_len || len == max_len {
                        break;
                    }
                }
            }

            candidate = self.chain[idx];
            links += 1;
        }

        best
    }

    /// Drop bytes before `keep_from` once enough have accumulated.
    ///
    /// The caller passes the oldest position it may still read; the
    /// dictionary distance before the encoder's cursor is its concern.
    pub fn trim(&mut self, keep_from: u64) {
        let keep_from = keep_from.min(self.hashed);
        if keep_from <= self.base {
            return;
        }
        let cut = (keep_from - self.base) as usize;
        if cut < TRIM_MIN.max(self.dict_size) {
            return;
        }

        self.buf.drain(..cut);
        self.chain.drain(..cut);
        let cut = cut as u32;
        for link in self.head.iter_mut().chain(self.chain.iter_mut()) {
            *link = link.saturating_sub(cut);
        }
        self.base += cut as u64;
    }

    /// Discard all buffered data and positions.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.chain.clear();
        self.head.fill(0);
        self.base = 0;
        self.hashed = 0;
    }
}
