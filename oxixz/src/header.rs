//! Stream header and footer.
//!
//! Both are 12 bytes. The header is magic, flags and a CRC32 of the flags;
//! the footer is a CRC32, the backward size (index size), the same flags
//! and the footer magic.

use crate::check::{CHECK_ID_MAX, CheckType};
use oxixz_core::crc::Crc32;
use oxixz_core::error::{Result, XzError};

/// Stream header magic: 0xFD, '7', 'z', 'X', 'Z', 0x00.
pub const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];

/// Stream footer magic: 'Y', 'Z'.
pub const XZ_FOOTER_MAGIC: [u8; 2] = [0x59, 0x5A];

/// Size of the stream header and of the stream footer.
pub const STREAM_HEADER_SIZE: usize = 12;

/// Largest backward size representable in the footer.
pub const BACKWARD_SIZE_MAX: u64 = 1 << 34;

/// Stream flags shared by the header and footer.
///
/// Only the check id is defined. It is kept raw so streams using a check
/// this codec cannot compute can still be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFlags {
    /// Check id (0..=15).
    pub check_id: u8,
}

impl StreamFlags {
    /// Flags for a known check type.
    pub fn new(check: CheckType) -> Self {
        Self {
            check_id: check.id(),
        }
    }

    /// The check type, if this codec implements it.
    pub fn check_type(self) -> Option<CheckType> {
        CheckType::from_id(self.check_id)
    }

    /// Encode to the two flag bytes.
    pub fn encode(self) -> [u8; 2] {
        [0x00, self.check_id]
    }

    /// Decode the two flag bytes.
    pub fn decode(bytes: [u8; 2]) -> Result<Self> {
        if bytes[0] != 0x00 || bytes[1] > CHECK_ID_MAX {
            return Err(XzError::unsupported(format!(
                "stream flags {:02x} {:02x}",
                bytes[0], bytes[1]
            )));
        }
        Ok(Self { check_id: bytes[1] })
    }
}

/// Stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// Stream flags.
    pub flags: StreamFlags,
}

impl StreamHeader {
    /// Create a header.
    pub fn new(flags: StreamFlags) -> Self {
        Self { flags }
    }

    /// Encode to 12 bytes.
    pub fn encode(&self) -> [u8; STREAM_HEADER_SIZE] {
        let mut out = [0u8; STREAM_HEADER_SIZE];
        out[..6].copy_from_slice(&XZ_MAGIC);
        let flags = self.flags.encode();
        out[6..8].copy_from_slice(&flags);
        out[8..12].copy_from_slice(&Crc32::compute(&flags).to_le_bytes());
        out
    }

    /// Decode 12 bytes.
    pub fn decode(bytes: &[u8; STREAM_HEADER_SIZE]) -> Result<Self> {
        if bytes[..6] != XZ_MAGIC {
            return Err(XzError::invalid_magic(XZ_MAGIC, &bytes[..6]));
        }

        let stored = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let computed = Crc32::compute(&bytes[6..8]);
        if stored != computed {
            return Err(XzError::crc_mismatch("stream header", stored, computed));
        }

        let flags = StreamFlags::decode([bytes[6], bytes[7]])?;
        Ok(Self { flags })
    }
}

/// Stream footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFooter {
    /// Stream flags; must match the header.
    pub flags: StreamFlags,
    /// Size of the index in bytes (a multiple of four).
    pub index_size: u64,
}

impl StreamFooter {
    /// Create a footer for an index of `index_size` bytes.
    pub fn new(flags: StreamFlags, index_size: u64) -> Self {
        Self { flags, index_size }
    }

    /// Encode to 12 bytes.
    pub fn encode(&self) -> [u8; STREAM_HEADER_SIZE] {
        debug_assert!(self.index_size % 4 == 0 && self.index_size >= 8);
        let mut out = [0u8; STREAM_HEADER_SIZE];
        let backward = (self.index_size / 4 - 1) as u32;
        out[4..8].copy_from_slice(&backward.to_le_bytes());
        out[8..10].copy_from_slice(&self.flags.encode());
        out[10..12].copy_from_slice(&XZ_FOOTER_MAGIC);
        let crc = Crc32::compute(&out[4..10]);
        out[..4].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Decode 12 bytes.
    pub fn decode(bytes: &[u8; STREAM_HEADER_SIZE]) -> Result<Self> {
        if bytes[10..12] != XZ_FOOTER_MAGIC {
            return Err(XzError::invalid_magic(XZ_FOOTER_MAGIC, &bytes[10..12]));
        }

        let stored = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let computed = Crc32::compute(&bytes[4..10]);
        if stored != computed {
            return Err(XzError::crc_mismatch("stream footer", stored, computed));
        }

        let backward = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let flags = StreamFlags::decode([bytes[8], bytes[9]])?;
        Ok(Self {
            flags,
            index_size: (u64::from(backward) + 1) * 4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes() {
        let header = StreamHeader::new(StreamFlags::new(CheckType::Crc64));
        assert_eq!(
            header.encode(),
            [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00, 0x04, 0xE6, 0xD6, 0xB4, 0x46]
        );

        let header = StreamHeader::new(StreamFlags::new(CheckType::Crc32));
        assert_eq!(&header.encode()[6..], &[0x00, 0x01, 0x69, 0x22, 0xDE, 0x36]);
    }

    #[test]
    fn test_header_roundtrip() {
        for check in [
            CheckType::None,
            CheckType::Crc32,
            CheckType::Crc64,
            CheckType::Sha256,
        ] {
            let header = StreamHeader::new(StreamFlags::new(check));
            let decoded = StreamHeader::decode(&header.encode()).unwrap();
            assert_eq!(decoded, header);
            assert_eq!(decoded.flags.check_type(), Some(check));
        }
    }

    #[test]
    fn test_header_bad_magic() {
        let mut bytes = StreamHeader::new(StreamFlags::new(CheckType::Crc64)).encode();
        bytes[1] = 0x38;
        let err = StreamHeader::decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), oxixz_core::ErrorKind::Format);
    }

    #[test]
    fn test_header_bad_crc() {
        let mut bytes = StreamHeader::new(StreamFlags::new(CheckType::Crc64)).encode();
        bytes[9] ^= 0x01;
        assert!(matches!(
            StreamHeader::decode(&bytes),
            Err(XzError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_reserved_flag_bits() {
        assert!(StreamFlags::decode([0x01, 0x04]).is_err());
        assert!(StreamFlags::decode([0x00, 0x14]).is_err());
        assert_eq!(StreamFlags::decode([0x00, 0x07]).unwrap().check_id, 7);
    }

    #[test]
    fn test_footer_roundtrip() {
        let footer = StreamFooter::new(StreamFlags::new(CheckType::Crc64), 12);
        let bytes = footer.encode();
        assert_eq!(&bytes[4..], &[0x02, 0x00, 0x00, 0x00, 0x00, 0x04, 0x59, 0x5A]);
        assert_eq!(StreamFooter::decode(&bytes).unwrap(), footer);
    }

    #[test]
    fn test_footer_bad_magic() {
        let mut bytes = StreamFooter::new(StreamFlags::new(CheckType::Crc32), 8).encode();
        bytes[11] = 0;
        assert!(matches!(
            StreamFooter::decode(&bytes),
            Err(XzError::InvalidMagic { .. })
        ));
    }
}
