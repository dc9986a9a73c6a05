//! Block integrity checks.
//!
//! The stream flags select one check for every block of a stream. The id
//! space has 16 values; only four are defined, but the size of every id is
//! fixed by its group so a reader can skip checks it cannot compute.

use oxixz_core::crc::{Crc32, Crc64};
use oxixz_core::error::{Result, XzError};
use sha2::{Digest, Sha256};

/// Largest check field, in bytes.
pub const CHECK_SIZE_MAX: usize = 64;

/// Highest valid check id.
pub const CHECK_ID_MAX: u8 = 0x0F;

/// Check types this codec can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CheckType {
    /// No check.
    None = 0x00,
    /// CRC-32.
    Crc32 = 0x01,
    /// CRC-64.
    #[default]
    Crc64 = 0x04,
    /// SHA-256.
    Sha256 = 0x0A,
}

impl CheckType {
    /// Look up a check type by its id.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Crc32),
            0x04 => Some(Self::Crc64),
            0x0A => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Check id as stored in the stream flags.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Size of the check field in bytes.
    pub fn size(self) -> usize {
        check_size(self.id())
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Crc32 => "CRC32",
            Self::Crc64 => "CRC64",
            Self::Sha256 => "SHA-256",
        }
    }
}

/// Size of the check field for any id in `0..=15`.
///
/// Ids come in groups of three sharing a size: 1-3 use 4 bytes, 4-6 use 8,
/// 7-9 use 16, 10-12 use 32 and 13-15 use 64.
pub fn check_size(id: u8) -> usize {
    match id {
        0 => 0,
        1..=3 => 4,
        4..=6 => 8,
        7..=9 => 16,
        10..=12 => 32,
        _ => CHECK_SIZE_MAX,
    }
}

/// Running check over a block's uncompressed data.
#[derive(Clone)]
pub enum Check {
    /// No check; finalizes to an empty value.
    None,
    /// CRC-32.
    Crc32(Crc32),
    /// CRC-64.
    Crc64(Crc64),
    /// SHA-256.
    Sha256(Sha256),
    /// Check id this codec cannot compute; the stored value is skipped.
    Skipped {
        /// The check id from the stream flags.
        id: u8,
    },
}

impl Check {
    /// Start a check for a stream's check id.
    ///
    /// Unknown ids in range yield [`Check::Skipped`] unless `strict` is set,
    /// in which case they are rejected.
    pub fn for_id(id: u8, strict: bool) -> Result<Self> {
        match CheckType::from_id(id) {
            Some(check) => Ok(Self::new(check)),
            None if id > CHECK_ID_MAX => Err(XzError::invalid_header(format!(
                "check id {id:#04x} out of range"
            ))),
            None if strict => Err(XzError::unsupported(format!("check id {id:#04x}"))),
            None => Ok(Self::Skipped { id }),
        }
    }

    /// Start a check of the given type.
    pub fn new(check: CheckType) -> Self {
        match check {
            CheckType::None => Self::None,
            CheckType::Crc32 => Self::Crc32(Crc32::new()),
            CheckType::Crc64 => Self::Crc64(Crc64::new()),
            CheckType::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    /// Size of the stored check in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Crc32(_) => 4,
            Self::Crc64(_) => 8,
            Self::Sha256(_) => 32,
            Self::Skipped { id } => check_size(*id),
        }
    }

    /// Whether the stored value can be verified.
    pub fn is_verifiable(&self) -> bool {
        !matches!(self, Self::Skipped { .. })
    }

    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Crc32(_) => "CRC32",
            Self::Crc64(_) => "CRC64",
            Self::Sha256(_) => "SHA-256",
            Self::Skipped { .. } => "unknown",
        }
    }

    /// Feed uncompressed bytes.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::None | Self::Skipped { .. } => {}
            Self::Crc32(crc) => crc.update(data),
            Self::Crc64(crc) => crc.update(data),
            Self::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Finish the check and return its stored form (little-endian for CRCs).
    ///
    /// The check is reset to its initial state so it can be reused for the
    /// next block.
    pub fn finalize_reset(&mut self) -> Vec<u8> {
        match self {
            Self::None | Self::Skipped { .. } => Vec::new(),
            Self::Crc32(crc) => std::mem::take(crc).finalize().to_le_bytes().to_vec(),
            Self::Crc64(crc) => std::mem::take(crc).finalize().to_le_bytes().to_vec(),
            Self::Sha256(hasher) => hasher.finalize_reset().to_vec(),
        }
    }

    /// Compare a stored check value with the computed one.
    ///
    /// Resets the running state like [`Check::finalize_reset`].
    pub fn verify(&mut self, stored: &[u8]) -> Result<()> {
        if !self.is_verifiable() {
            return Ok(());
        }
        let computed = self.finalize_reset();
        if computed != stored {
            return Err(XzError::check_mismatch(self.name(), stored, computed));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped { id } => write!(f, "Check::Skipped({id:#04x})"),
            other => write!(f, "Check::{}", other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_ids() {
        for check in [
            CheckType::None,
            CheckType::Crc32,
            CheckType::Crc64,
            CheckType::Sha256,
        ] {
            assert_eq!(CheckType::from_id(check.id()), Some(check));
        }
        assert_eq!(CheckType::from_id(0x02), None);
        assert_eq!(CheckType::default(), CheckType::Crc64);
    }

    #[test]
    fn test_check_sizes() {
        let expected = [0, 4, 4, 4, 8, 8, 8, 16, 16, 16, 32, 32, 32, 64, 64, 64];
        for (id, size) in expected.iter().enumerate() {
            assert_eq!(check_size(id as u8), *size, "id {id}");
        }
        assert_eq!(CheckType::Sha256.size(), 32);
    }

    #[test]
    fn test_crc32_value_little_endian() {
        let mut check = Check::new(CheckType::Crc32);
        check.update(b"123456789");
        assert_eq!(check.finalize_reset(), 0xCBF43926u32.to_le_bytes());
    }

    #[test]
    fn test_crc64_value_little_endian() {
        let mut check = Check::new(CheckType::Crc64);
        check.update(b"1234");
        check.update(b"56789");
        assert_eq!(check.finalize_reset(), 0x995DC9BBDF1939FAu64.to_le_bytes());
    }

    #[test]
    fn test_sha256_value() {
        let mut check = Check::new(CheckType::Sha256);
        check.update(b"abc");
        let digest = check.finalize_reset();
        assert_eq!(digest.len(), 32);
        assert_eq!(&digest[..4], &[0xba, 0x78, 0x16, 0xbf]);
    }

    #[test]
    fn test_finalize_resets_state() {
        let mut check = Check::new(CheckType::Crc32);
        check.update(b"first block");
        let _ = check.finalize_reset();
        check.update(b"123456789");
        assert_eq!(check.finalize_reset(), 0xCBF43926u32.to_le_bytes());
    }

    #[test]
    fn test_verify_mismatch() {
        let mut check = Check::new(CheckType::Crc64);
        check.update(b"data");
        let err = check.verify(&[0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), oxixz_core::ErrorKind::IntegrityCheck);
    }

    #[test]
    fn test_unknown_ids() {
        let check = Check::for_id(0x02, false).unwrap();
        assert!(!check.is_verifiable());
        assert_eq!(check.size(), 4);

        let err = Check::for_id(0x0E, true).unwrap_err();
        assert_eq!(err.kind(), oxixz_core::ErrorKind::UnsupportedFeature);

        assert!(Check::for_id(0x10, false).is_err());
    }
}
