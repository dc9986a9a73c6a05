//! LZMA2 chunk headers and encoder configuration.
//!
//! An LZMA2 stream is a sequence of chunks, each introduced by a control
//! byte:
//!
//! | Control       | Meaning                                              |
//! |---------------|------------------------------------------------------|
//! | `0x00`        | end of stream                                        |
//! | `0x01`        | uncompressed chunk, dictionary reset                 |
//! | `0x02`        | uncompressed chunk                                   |
//! | `0x03..=0x7F` | invalid                                              |
//! | `0x80..=0xFF` | LZMA chunk; bits 5-6 select the reset, bits 0-4 hold |
//! |               | bits 16-20 of the uncompressed size minus one        |
//!
//! LZMA chunks carry a 16-bit compressed size, and a properties byte when
//! the reset level includes new properties.

use crate::LzmaLevel;
use crate::model::LzmaProperties;
use oxixz_core::error::{Result, XzError};
use oxixz_core::window::MIN_DICT_SIZE;
use std::io::Read;

/// Maximum uncompressed size for a single LZMA chunk (2MB).
pub const LZMA_CHUNK_MAX_UNCOMPRESSED: usize = 1 << 21;

/// Maximum compressed size for a single LZMA chunk (64KB).
pub const LZMA_CHUNK_MAX_COMPRESSED: usize = 1 << 16;

/// Maximum size of an uncompressed chunk (64KB).
pub const UNCOMPRESSED_CHUNK_MAX: usize = 1 << 16;

/// Default chunk size for LZMA2 encoding (2MB).
pub const DEFAULT_CHUNK_SIZE: usize = LZMA_CHUNK_MAX_UNCOMPRESSED;

/// Largest dictionary LZMA2 can describe (1.5 GiB).
pub const DICT_SIZE_MAX: u32 = 3 << 29;

/// Control byte constants and utilities for LZMA2.
pub mod control {
    /// End of stream marker.
    pub const EOS: u8 = 0x00;

    /// Uncompressed chunk with dictionary reset.
    pub const UNCOMPRESSED_RESET: u8 = 0x01;

    /// Uncompressed chunk without reset.
    pub const UNCOMPRESSED: u8 = 0x02;

    /// LZMA chunk mask (bit 7 set).
    pub const LZMA_MASK: u8 = 0x80;

    /// Reset level field (bits 5-6).
    pub const RESET_MASK: u8 = 0x60;

    /// Shift of the reset level field.
    pub const RESET_SHIFT: u32 = 5;

    /// High bits of uncompressed size mask (bits 0-4).
    pub const SIZE_HIGH_MASK: u8 = 0x1F;

    /// Check if control byte indicates LZMA chunk.
    #[inline]
    pub const fn is_lzma(ctrl: u8) -> bool {
        ctrl & LZMA_MASK != 0
    }

    /// Reset level (0-3) of an LZMA control byte.
    #[inline]
    pub const fn reset_level(ctrl: u8) -> u8 {
        (ctrl & RESET_MASK) >> RESET_SHIFT
    }

    /// Build LZMA control byte.
    #[inline]
    pub const fn build_lzma(uncompressed_size_high: u8, reset_level: u8) -> u8 {
        LZMA_MASK | ((reset_level << RESET_SHIFT) & RESET_MASK) | (uncompressed_size_high & SIZE_HIGH_MASK)
    }
}

/// What an LZMA chunk resets before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LzmaReset {
    /// Continue with the previous state.
    None,
    /// Reset probabilities, state and reps.
    State,
    /// State reset with a new properties byte.
    StateProps,
    /// Dictionary reset, new properties and state reset.
    All,
}

impl LzmaReset {
    fn from_level(level: u8) -> Self {
        match level {
            0 => Self::None,
            1 => Self::State,
            2 => Self::StateProps,
            _ => Self::All,
        }
    }

    fn level(self) -> u8 {
        self as u8
    }

    /// Whether the chunk carries a properties byte.
    pub fn has_props(self) -> bool {
        self >= Self::StateProps
    }

    /// Whether the chunk resets the LZMA state.
    pub fn resets_state(self) -> bool {
        self >= Self::State
    }

    /// Whether the chunk resets the dictionary.
    pub fn resets_dict(self) -> bool {
        self == Self::All
    }
}

/// Chunk type for LZMA2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// End of stream.
    EndOfStream,
    /// Uncompressed chunk.
    Uncompressed {
        /// Whether to reset dictionary.
        reset_dict: bool,
    },
    /// LZMA compressed chunk.
    Lzma {
        /// What to reset before decoding.
        reset: LzmaReset,
    },
}

impl ChunkType {
    /// Parse a control byte into a chunk type.
    pub fn from_control_byte(ctrl: u8) -> Result<Self> {
        match ctrl {
            control::EOS => Ok(Self::EndOfStream),
            control::UNCOMPRESSED_RESET => Ok(Self::Uncompressed { reset_dict: true }),
            control::UNCOMPRESSED => Ok(Self::Uncompressed { reset_dict: false }),
            c if control::is_lzma(c) => Ok(Self::Lzma {
                reset: LzmaReset::from_level(control::reset_level(c)),
            }),
            c => Err(XzError::invalid_header(format!(
                "invalid LZMA2 control byte {c:#04x}"
            ))),
        }
    }

    /// Whether this chunk resets the dictionary.
    pub fn resets_dict(self) -> bool {
        match self {
            Self::EndOfStream => false,
            Self::Uncompressed { reset_dict } => reset_dict,
            Self::Lzma { reset } => reset.resets_dict(),
        }
    }
}

/// Parsed chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Chunk type.
    pub kind: ChunkType,
    /// Uncompressed size of the chunk.
    pub unpacked: usize,
    /// Compressed payload size (LZMA chunks only).
    pub packed: usize,
    /// Properties carried by the chunk.
    pub props: Option<LzmaProperties>,
}

impl ChunkHeader {
    /// End-of-stream header.
    pub const END: Self = Self {
        kind: ChunkType::EndOfStream,
        unpacked: 0,
        packed: 0,
        props: None,
    };

    /// Read a chunk header.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut ctrl = [0u8; 1];
        reader.read_exact(&mut ctrl)?;
        let kind = ChunkType::from_control_byte(ctrl[0])?;

        match kind {
            ChunkType::EndOfStream => Ok(Self::END),
            ChunkType::Uncompressed { .. } => {
                let mut size = [0u8; 2];
                reader.read_exact(&mut size)?;
                Ok(Self {
                    kind,
                    unpacked: u16::from_be_bytes(size) as usize + 1,
                    packed: 0,
                    props: None,
                })
            }
            ChunkType::Lzma { reset } => {
                let mut sizes = [0u8; 4];
                reader.read_exact(&mut sizes)?;
                let high = (ctrl[0] & control::SIZE_HIGH_MASK) as usize;
                let unpacked = ((high << 16) | u16::from_be_bytes([sizes[0], sizes[1]]) as usize) + 1;
                let packed = u16::from_be_bytes([sizes[2], sizes[3]]) as usize + 1;

                let props = if reset.has_props() {
                    let mut byte = [0u8; 1];
                    reader.read_exact(&mut byte)?;
                    Some(LzmaProperties::from_byte(byte[0])?)
                } else {
                    None
                };

                Ok(Self {
                    kind,
                    unpacked,
                    packed,
                    props,
                })
            }
        }
    }

    /// Append the encoded header to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        match self.kind {
            ChunkType::EndOfStream => out.push(control::EOS),
            ChunkType::Uncompressed { reset_dict } => {
                out.push(if reset_dict {
                    control::UNCOMPRESSED_RESET
                } else {
                    control::UNCOMPRESSED
                });
                out.extend_from_slice(&((self.unpacked - 1) as u16).to_be_bytes());
            }
            ChunkType::Lzma { reset } => {
                let unpacked = self.unpacked - 1;
                out.push(control::build_lzma((unpacked >> 16) as u8, reset.level()));
                out.extend_from_slice(&(unpacked as u16).to_be_bytes());
                out.extend_from_slice(&((self.packed - 1) as u16).to_be_bytes());
                if let Some(props) = self.props {
                    out.push(props.to_byte());
                }
            }
        }
    }
}

/// LZMA2 encoder configuration.
#[derive(Debug, Clone)]
pub struct Lzma2Config {
    /// Uncompressed bytes per LZMA chunk.
    pub chunk_size: usize,
    /// LZMA properties.
    pub props: LzmaProperties,
    /// Compression level.
    pub level: LzmaLevel,
    /// Dictionary size.
    pub dict_size: u32,
}

impl Default for Lzma2Config {
    fn default() -> Self {
        Self::with_level(LzmaLevel::DEFAULT)
    }
}

impl Lzma2Config {
    /// Create a new configuration with the given compression level.
    pub fn with_level(level: LzmaLevel) -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            props: LzmaProperties::default(),
            level,
            dict_size: level.dict_size(),
        }
    }

    /// Set the chunk size (clamped to the LZMA chunk limits).
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, LZMA_CHUNK_MAX_UNCOMPRESSED);
        self
    }

    /// Set LZMA properties.
    #[must_use]
    pub fn properties(mut self, props: LzmaProperties) -> Self {
        self.props = props;
        self
    }

    /// Set dictionary size.
    #[must_use]
    pub fn dict_size(mut self, size: u32) -> Self {
        self.dict_size = size;
        self
    }

    /// Check the configuration against the LZMA2 limits.
    pub fn validate(&self) -> Result<()> {
        self.props
            .validate()
            .map_err(|e| XzError::invalid_config(e.to_string()))?;
        if !(MIN_DICT_SIZE as u32..=DICT_SIZE_MAX).contains(&self.dict_size) {
            return Err(XzError::invalid_config(format!(
                "dictionary size {} outside {}..={}",
                self.dict_size, MIN_DICT_SIZE, DICT_SIZE_MAX
            )));
        }
        if self.chunk_size == 0 || self.chunk_size > LZMA_CHUNK_MAX_UNCOMPRESSED {
            return Err(XzError::invalid_config(format!(
                "chunk size {} outside 1..={}",
                self.chunk_size, LZMA_CHUNK_MAX_UNCOMPRESSED
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxixz_core::error::ErrorKind;

    #[test]
    fn test_control_byte_building() {
        assert_eq!(control::build_lzma(0, 0), 0x80);
        assert_eq!(control::build_lzma(0, 1), 0xA0);
        assert_eq!(control::build_lzma(0, 2), 0xC0);
        assert_eq!(control::build_lzma(0, 3), 0xE0);
        assert_eq!(control::build_lzma(0x1F, 3), 0xFF);
    }

    #[test]
    fn test_chunk_type_parsing() {
        assert_eq!(
            ChunkType::from_control_byte(0x00).unwrap(),
            ChunkType::EndOfStream
        );
        assert_eq!(
            ChunkType::from_control_byte(0x01).unwrap(),
            ChunkType::Uncompressed { reset_dict: true }
        );
        assert_eq!(
            ChunkType::from_control_byte(0x02).unwrap(),
            ChunkType::Uncompressed { reset_dict: false }
        );
        assert_eq!(
            ChunkType::from_control_byte(0x9F).unwrap(),
            ChunkType::Lzma {
                reset: LzmaReset::None
            }
        );
        assert_eq!(
            ChunkType::from_control_byte(0xA0).unwrap(),
            ChunkType::Lzma {
                reset: LzmaReset::State
            }
        );
        assert_eq!(
            ChunkType::from_control_byte(0xC0).unwrap(),
            ChunkType::Lzma {
                reset: LzmaReset::StateProps
            }
        );
        assert_eq!(
            ChunkType::from_control_byte(0xE0).unwrap(),
            ChunkType::Lzma {
                reset: LzmaReset::All
            }
        );
    }

    #[test]
    fn test_invalid_control_bytes() {
        for ctrl in [0x03u8, 0x10, 0x7F] {
            let err = ChunkType::from_control_byte(ctrl).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
        }
    }

    #[test]
    fn test_reset_levels() {
        assert!(!LzmaReset::None.resets_state());
        assert!(LzmaReset::State.resets_state());
        assert!(!LzmaReset::State.has_props());
        assert!(LzmaReset::StateProps.has_props());
        assert!(!LzmaReset::StateProps.resets_dict());
        assert!(LzmaReset::All.resets_dict());
    }

    #[test]
    fn test_header_read_write() {
        let header = ChunkHeader {
            kind: ChunkType::Lzma {
                reset: LzmaReset::All,
            },
            unpacked: LZMA_CHUNK_MAX_UNCOMPRESSED,
            packed: 1234,
            props: Some(LzmaProperties::default()),
        };
        let mut bytes = Vec::new();
        header.write(&mut bytes);
        assert_eq!(bytes, [0xFF, 0xFF, 0xFF, 0x04, 0xD1, 0x5D]);
        assert_eq!(ChunkHeader::read(&mut &bytes[..]).unwrap(), header);

        let header = ChunkHeader {
            kind: ChunkType::Uncompressed { reset_dict: false },
            unpacked: 11,
            packed: 0,
            props: None,
        };
        let mut bytes = Vec::new();
        header.write(&mut bytes);
        assert_eq!(bytes, [0x02, 0x00, 0x0A]);
        assert_eq!(ChunkHeader::read(&mut &bytes[..]).unwrap(), header);
    }

    #[test]
    fn test_header_truncated() {
        let err = ChunkHeader::read(&mut &[0xE0u8, 0x00][..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn test_header_bad_props() {
        let err = ChunkHeader::read(&mut &[0xC0u8, 0, 0, 0, 5, 225][..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_lzma2_config() {
        let config = Lzma2Config::default();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.validate().is_ok());

        let config = Lzma2Config::with_level(LzmaLevel::BEST).chunk_size(1024);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.level, LzmaLevel::BEST);

        assert!(Lzma2Config::default().dict_size(1024).validate().is_err());
        assert!(
            Lzma2Config::default()
                .properties(LzmaProperties::new(4, 1, 2))
                .validate()
                .is_err()
        );
    }
}
