//! Writer and reader configuration.

use crate::check::CheckType;
use oxixz_core::error::{Result, XzError};
use oxixz_core::window::MIN_DICT_SIZE;
use oxixz_lzma::lzma2_chunk::DICT_SIZE_MAX;
use oxixz_lzma::model::{LCLP_MAX, PB_MAX};
use oxixz_lzma::{Lzma2Config, LzmaLevel, LzmaProperties};

/// Default dictionary size (8 MiB).
pub const DEFAULT_DICT_SIZE: u32 = 1 << 23;

/// Smallest default block size.
const MIN_DEFAULT_BLOCK_SIZE: u64 = 1 << 20;

/// Options for [`XzWriter`](crate::XzWriter) and the compression helpers.
///
/// ```rust
/// use oxixz::{CheckType, XzOptions};
///
/// let options = XzOptions::default()
///     .check(CheckType::Crc32)
///     .dict_size(1 << 20)
///     .level(3);
/// assert!(options.validate().is_ok());
/// assert_eq!(options.effective_block_size(), 3 << 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XzOptions {
    /// Integrity check stored after every block.
    pub check: CheckType,
    /// LZMA2 dictionary size in bytes.
    pub dict_size: u32,
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
    /// Match finder effort, 0..=9.
    pub level: u8,
    /// Uncompressed bytes per block; `None` picks `max(3 * dict_size, 1 MiB)`.
    pub block_size: Option<u64>,
}

impl Default for XzOptions {
    fn default() -> Self {
        Self {
            check: CheckType::Crc64,
            dict_size: DEFAULT_DICT_SIZE,
            lc: 3,
            lp: 0,
            pb: 2,
            level: LzmaLevel::DEFAULT.level(),
            block_size: None,
        }
    }
}

impl XzOptions {
    /// Options for a preset level: effort and dictionary size both follow it.
    pub fn with_level(level: u8) -> Self {
        let preset = LzmaLevel::new(level);
        Self {
            level: preset.level(),
            dict_size: preset.dict_size(),
            ..Self::default()
        }
    }

    /// Set the check type.
    #[must_use]
    pub fn check(mut self, check: CheckType) -> Self {
        self.check = check;
        self
    }

    /// Set the dictionary size.
    #[must_use]
    pub fn dict_size(mut self, dict_size: u32) -> Self {
        self.dict_size = dict_size;
        self
    }

    /// Set the literal context bits.
    #[must_use]
    pub fn lc(mut self, lc: u32) -> Self {
        self.lc = lc;
        self
    }

    /// Set the literal position bits.
    #[must_use]
    pub fn lp(mut self, lp: u32) -> Self {
        self.lp = lp;
        self
    }

    /// Set the position bits.
    #[must_use]
    pub fn pb(mut self, pb: u32) -> Self {
        self.pb = pb;
        self
    }

    /// Set the match finder effort.
    #[must_use]
    pub fn level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Set the block size.
    #[must_use]
    pub fn block_size(mut self, block_size: u64) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Block size in effect.
    pub fn effective_block_size(&self) -> u64 {
        self.block_size
            .unwrap_or_else(|| (3 * u64::from(self.dict_size)).max(MIN_DEFAULT_BLOCK_SIZE))
    }

    /// Reject options outside the supported ranges.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DICT_SIZE as u32..=DICT_SIZE_MAX).contains(&self.dict_size) {
            return Err(XzError::invalid_config(format!(
                "dictionary size {} outside {}..={}",
                self.dict_size, MIN_DICT_SIZE, DICT_SIZE_MAX
            )));
        }
        if self.lc + self.lp > LCLP_MAX {
            return Err(XzError::invalid_config(format!(
                "lc + lp = {} exceeds {LCLP_MAX}",
                self.lc + self.lp
            )));
        }
        if self.pb > PB_MAX {
            return Err(XzError::invalid_config(format!(
                "pb = {} exceeds {PB_MAX}",
                self.pb
            )));
        }
        if self.level > LzmaLevel::BEST.level() {
            return Err(XzError::invalid_config(format!(
                "level {} outside 0..=9",
                self.level
            )));
        }
        if self.block_size == Some(0) {
            return Err(XzError::invalid_config("block size must be non-zero"));
        }
        Ok(())
    }

    /// LZMA2 encoder configuration for these options.
    pub fn lzma2_config(&self) -> Lzma2Config {
        Lzma2Config::with_level(LzmaLevel::new(self.level))
            .dict_size(self.dict_size)
            .properties(LzmaProperties::new(self.lc, self.lp, self.pb))
    }
}

/// Options for [`XzReader`](crate::XzReader).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Stop after the first stream instead of decoding concatenated ones.
    pub single_stream: bool,
    /// Reject streams whose check this codec cannot compute.
    pub strict_check: bool,
}

impl ReaderConfig {
    /// Set single-stream mode.
    #[must_use]
    pub fn single_stream(mut self, single_stream: bool) -> Self {
        self.single_stream = single_stream;
        self
    }

    /// Set strict check handling.
    #[must_use]
    pub fn strict_check(mut self, strict_check: bool) -> Self {
        self.strict_check = strict_check;
        self
    }
}
