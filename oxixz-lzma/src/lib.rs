//! # OxiXZ LZMA
//!
//! LZMA and LZMA2 compression and decompression, as used inside XZ blocks.
//!
//! The decoder streams into caller buffers and the encoder accepts input in
//! arbitrary pieces, cutting chunks itself. Both sides share the range coder
//! in [`range_coder`] and the probability tables in [`model`].
//!
//! ## Usage
//!
//! ```rust
//! use oxixz_lzma::{Lzma2Config, LzmaLevel, decode_lzma2, encode_lzma2};
//!
//! let data = b"Hello, LZMA2! Hello, LZMA2! Hello, LZMA2!";
//! let config = Lzma2Config::with_level(LzmaLevel::DEFAULT);
//! let dict_size = config.dict_size;
//!
//! let encoded = encode_lzma2(data, config).unwrap();
//! let decoded = decode_lzma2(&encoded, dict_size).unwrap();
//! assert_eq!(decoded, data);
//! ```
//!
//! ## LZMA2 Format
//!
//! An LZMA2 stream is a sequence of chunks ended by a zero byte. Chunks are
//! either stored verbatim or LZMA-compressed; an LZMA chunk holds at most
//! 2 MiB of output and 64 KiB of range-coded input. Control bytes decide
//! whether the dictionary, the properties or the coder state are reset
//! before the chunk.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod encoder;
pub mod lzma2;
pub mod lzma2_chunk;
pub mod match_finder;
pub mod model;
pub mod range_coder;

pub use decoder::LzmaDecoder;
pub use encoder::LzmaEncoder;
pub use lzma2::{
    Lzma2Decoder, Lzma2Encoder, decode_lzma2, dict_size_from_props, encode_lzma2,
    props_from_dict_size,
};
pub use lzma2_chunk::{ChunkHeader, ChunkType, Lzma2Config, LzmaReset};
pub use model::{LzmaModel, LzmaProperties, State};
pub use range_coder::{RangeDecoder, RangeEncoder};

/// Preset table: dictionary size, match finder chain depth and nice length.
const PRESETS: [(u32, usize, usize); 10] = [
    (256 << 10, 2, 32),
    (1 << 20, 4, 32),
    (2 << 20, 8, 48),
    (4 << 20, 16, 64),
    (4 << 20, 32, 64),
    (8 << 20, 48, 96),
    (8 << 20, 64, 128),
    (16 << 20, 128, 192),
    (32 << 20, 256, 273),
    (64 << 20, 512, 273),
];

/// Compression preset, 0 (fastest) through 9 (smallest output).
///
/// Dictionary sizes follow the `xz` presets; search effort is this crate's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LzmaLevel(u8);

impl LzmaLevel {
    /// Preset 0.
    pub const FAST: Self = Self(0);
    /// Preset 6, what `xz` uses without options.
    pub const DEFAULT: Self = Self(6);
    /// Preset 9.
    pub const BEST: Self = Self(9);

    /// Preset `level`, saturating at 9.
    pub fn new(level: u8) -> Self {
        Self(level.min(Self::BEST.0))
    }

    /// Preset number.
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Dictionary size the preset selects.
    pub fn dict_size(&self) -> u32 {
        PRESETS[usize::from(self.0)].0
    }

    /// Match finder chain depth and the length that ends a search early.
    pub fn search_params(&self) -> (usize, usize) {
        let (_, depth, nice_len) = PRESETS[usize::from(self.0)];
        (depth, nice_len)
    }
}

impl Default for LzmaLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level() {
        assert_eq!(LzmaLevel::FAST.level(), 0);
        assert_eq!(LzmaLevel::DEFAULT.level(), 6);
        assert_eq!(LzmaLevel::BEST.level(), 9);
        assert_eq!(LzmaLevel::default(), LzmaLevel::DEFAULT);
    }

    #[test]
    fn test_level_clamp() {
        assert_eq!(LzmaLevel::new(100).level(), 9);
    }

    #[test]
    fn test_dict_size() {
        assert_eq!(LzmaLevel::FAST.dict_size(), 256 << 10);
        assert_eq!(LzmaLevel::new(4).dict_size(), LzmaLevel::new(3).dict_size());
        assert_eq!(LzmaLevel::DEFAULT.dict_size(), 1 << 23);
        assert_eq!(LzmaLevel::BEST.dict_size(), 1 << 26);
    }

    #[test]
    fn test_search_effort_grows() {
        let mut previous = (0, 0);
        for level in 0..=9 {
            let params = LzmaLevel::new(level).search_params();
            assert!(params.0 > previous.0 && params.1 >= previous.1);
            previous = params;
        }
    }

    #[test]
    fn test_compression_levels() {
        let data = b"Hello World! This is a test of LZMA compression with various levels.".repeat(8);

        for level in 0..=9 {
            let config = Lzma2Config::with_level(LzmaLevel::new(level));
            let dict_size = config.dict_size;
            let compressed = encode_lzma2(&data, config).unwrap();
            let decompressed = decode_lzma2(&compressed, dict_size).unwrap();
            assert_eq!(decompressed, data, "level {level} roundtrip failed");
        }
    }

    #[test]
    fn test_higher_level_not_worse_on_text() {
        let mut data = Vec::new();
        for i in 0..400 {
            data.extend_from_slice(b"The quick brown fox jumps over the lazy dog. ");
            data.extend_from_slice(format!("{}", i * 7919 % 1000).as_bytes());
        }

        let fast = encode_lzma2(&data, Lzma2Config::with_level(LzmaLevel::FAST)).unwrap();
        let best = encode_lzma2(&data, Lzma2Config::with_level(LzmaLevel::BEST)).unwrap();
        assert!(fast.len() < data.len());
        assert!(best.len() < data.len());
        assert_eq!(decode_lzma2(&best, 1 << 26).unwrap(), data);
    }
}
