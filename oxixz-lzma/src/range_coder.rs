//! Binary range coder shared by the LZMA encoder and decoder.
//!
//! Each bit is coded against an adaptive 11-bit probability that moves a
//! 1/32 step toward the observed value. The coder keeps a 32-bit range and
//! renormalizes one byte at a time once the range falls under 2^24.
//!
//! An LZMA2 chunk holds a complete, independently flushed range coder
//! stream: the decoder is loaded with one chunk payload at a time and the
//! encoder is reset between chunks.

use oxixz_core::error::{Result, XzError};

/// Width of an adaptive probability.
pub const PROB_BITS: u32 = 11;

/// Starting probability for every model slot (one half).
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Probability scale; a slot always stays strictly below this.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Adaptation speed as a right shift.
pub const MOVE_BITS: u32 = 5;

/// Payload bytes consumed before the first bit can be decoded.
pub const INIT_BYTES: usize = 5;

const RANGE_TOP: u32 = 1 << 24;

#[inline]
fn adapt(prob: &mut u16, bit: u32) {
    if bit == 0 {
        *prob += (PROB_MAX - *prob) >> MOVE_BITS;
    } else {
        *prob -= *prob >> MOVE_BITS;
    }
}

/// Decodes the range coded payload of one LZMA chunk.
#[derive(Debug, Clone)]
pub struct RangeDecoder {
    payload: Vec<u8>,
    cursor: usize,
    range: u32,
    code: u32,
}

impl RangeDecoder {
    /// Decoder with no payload loaded.
    pub fn new() -> Self {
        Self {
            payload: Vec::new(),
            cursor: 0,
            range: u32::MAX,
            code: 0,
        }
    }

    /// Resize the payload buffer to `len` bytes and hand it out for filling.
    ///
    /// Follow with [`RangeDecoder::init`] once the bytes are in place.
    pub fn chunk_buffer(&mut self, len: usize) -> &mut [u8] {
        self.payload.clear();
        self.payload.resize(len, 0);
        self.cursor = 0;
        &mut self.payload
    }

    /// Load the initial code from the payload head.
    pub fn init(&mut self) -> Result<()> {
        let head = self
            .payload
            .get(..INIT_BYTES)
            .ok_or_else(|| XzError::corrupted(0, "LZMA chunk too short for range coder"))?;
        if head[0] != 0x00 {
            return Err(XzError::corrupted(0, "Invalid range coder start byte"));
        }

        self.code = u32::from_be_bytes([head[1], head[2], head[3], head[4]]);
        self.range = u32::MAX;
        self.cursor = INIT_BYTES;
        Ok(())
    }

    /// Pull in another payload byte if the range has shrunk below 2^24.
    ///
    /// Running out of payload here means the chunk was cut short.
    #[inline]
    pub fn normalize(&mut self) -> Result<()> {
        if self.range >= RANGE_TOP {
            return Ok(());
        }
        let Some(&next) = self.payload.get(self.cursor) else {
            return Err(XzError::truncated("LZMA chunk payload"));
        };
        self.cursor += 1;
        self.range <<= 8;
        self.code = (self.code << 8) | u32::from(next);
        Ok(())
    }

    /// Decode one bit against `prob` and adapt it.
    #[inline]
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        self.normalize()?;

        let bound = (self.range >> PROB_BITS) * u32::from(*prob);
        let bit = if self.code < bound {
            self.range = bound;
            0
        } else {
            self.range -= bound;
            self.code -= bound;
            1
        };
        adapt(prob, bit);
        Ok(bit)
    }

    /// Decode `count` equiprobable bits, high bit first.
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            self.normalize()?;
            self.range >>= 1;
            let bit = u32::from(self.code >= self.range);
            self.code -= self.range & bit.wrapping_neg();
            value = (value << 1) | bit;
        }
        Ok(value)
    }

    /// Decode a `num_bits` wide symbol from a binary tree rooted at `probs[1]`.
    pub fn decode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32> {
        let mut node = 1usize;
        for _ in 0..num_bits {
            node = (node << 1) | self.decode_bit(&mut probs[node])? as usize;
        }
        Ok(node as u32 - (1 << num_bits))
    }

    /// Like [`RangeDecoder::decode_bit_tree`] but the symbol is read low bit first.
    pub fn decode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32> {
        let mut node = 1usize;
        let mut value = 0u32;
        for shift in 0..num_bits {
            let bit = self.decode_bit(&mut probs[node])?;
            node = (node << 1) | bit as usize;
            value |= bit << shift;
        }
        Ok(value)
    }

    /// True once the payload is used up and the code has returned to zero.
    ///
    /// Only meaningful after a last [`RangeDecoder::normalize`] at chunk end.
    pub fn is_finished_ok(&self) -> bool {
        self.cursor == self.payload.len() && self.code == 0
    }
}

impl Default for RangeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces the range coded payload of one LZMA chunk.
#[derive(Debug, Clone)]
pub struct RangeEncoder {
    out: Vec<u8>,
    range: u32,
    /// Bit 32 holds a carry not yet applied to `cache`.
    low: u64,
    /// Last byte held back in case a carry reaches it.
    cache: u8,
    /// `cache` plus the 0xFF bytes queued behind it.
    pending: u64,
}

impl RangeEncoder {
    /// Encoder with an empty output.
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            range: u32::MAX,
            low: 0,
            cache: 0,
            pending: 1,
        }
    }

    /// Start a fresh chunk, keeping the output allocation.
    pub fn reset(&mut self) {
        self.out.clear();
        self.range = u32::MAX;
        self.low = 0;
        self.cache = 0;
        self.pending = 1;
    }

    fn shift_low(&mut self) {
        let settled = self.low < 0xFF00_0000 || self.low >= 1 << 32;
        if settled {
            let carry = (self.low >> 32) as u8;
            self.out.push(self.cache.wrapping_add(carry));
            for _ in 1..self.pending {
                self.out.push(0xFFu8.wrapping_add(carry));
            }
            self.pending = 0;
            self.cache = (self.low >> 24) as u8;
        }
        self.pending += 1;
        self.low = (self.low & 0x00FF_FFFF) << 8;
    }

    #[inline]
    fn normalize(&mut self) {
        if self.range < RANGE_TOP {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode `bit` against `prob` and adapt it.
    #[inline]
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * u32::from(*prob);
        if bit == 0 {
            self.range = bound;
        } else {
            self.low += u64::from(bound);
            self.range -= bound;
        }
        adapt(prob, bit);
        self.normalize();
    }

    /// Encode the low `count` bits of `value` without modelling, high bit first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for shift in (0..count).rev() {
            self.range >>= 1;
            if (value >> shift) & 1 == 1 {
                self.low += u64::from(self.range);
            }
            self.normalize();
        }
    }

    /// Encode a `num_bits` wide symbol through a binary tree rooted at `probs[1]`.
    pub fn encode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut node = 1usize;
        for shift in (0..num_bits).rev() {
            let bit = (value >> shift) & 1;
            self.encode_bit(&mut probs[node], bit);
            node = (node << 1) | bit as usize;
        }
    }

    /// Like [`RangeEncoder::encode_bit_tree`] but low bit first.
    pub fn encode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut node = 1usize;
        for shift in 0..num_bits {
            let bit = (value >> shift) & 1;
            self.encode_bit(&mut probs[node], bit);
            node = (node << 1) | bit as usize;
        }
    }

    /// Output length if the encoder were flushed right now.
    pub fn pending_size(&self) -> usize {
        self.out.len() + self.pending as usize + 4
    }

    /// Push out everything still held in `low` and the cache.
    pub fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
    }

    /// Bytes emitted so far.
    pub fn output(&self) -> &[u8] {
        &self.out
    }

    /// Flush and take the output.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.out
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}
