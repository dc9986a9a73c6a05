//! Error types for OxiXZ operations.
//!
//! Every layer of the codec (range coder, LZMA, LZMA2, XZ container) reports
//! failures through [`XzError`]. Each variant belongs to exactly one
//! [`ErrorKind`], which is what callers normally match on.
//!
//! The streaming facades implement `std::io::Read` and `std::io::Write`, so
//! codec errors travel through `io::Error` on those paths. Converting the
//! `io::Error` back with [`XzError::from_io`] (or `From`) recovers the
//! original value.

use std::fmt;
use std::io;
use thiserror::Error;

/// Coarse classification of an [`XzError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: bad magic, CRC mismatch on a header, invalid field
    /// value, invalid properties, bad chunk sequence.
    Format,
    /// The input ended before a structurally required field was complete.
    TruncatedInput,
    /// Valid input using a feature this codec does not implement.
    UnsupportedFeature,
    /// A back-reference pointed before the start of the dictionary window.
    DistanceTooFar,
    /// The check stored after a block did not match the decoded data.
    IntegrityCheck,
    /// Writer options were rejected.
    InvalidConfig,
    /// The underlying reader or writer failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Format => "format error",
            Self::TruncatedInput => "truncated input",
            Self::UnsupportedFeature => "unsupported feature",
            Self::DistanceTooFar => "distance too far",
            Self::IntegrityCheck => "integrity check failed",
            Self::InvalidConfig => "invalid configuration",
            Self::Io => "I/O error",
        };
        f.write_str(name)
    }
}

/// The main error type for OxiXZ operations.
#[derive(Debug, Error)]
pub enum XzError {
    /// I/O error from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Invalid magic bytes in a stream header or footer.
    #[error("Invalid magic number: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual magic bytes found.
        found: Vec<u8>,
    },

    /// CRC32 mismatch on a stream header, block header, index or footer.
    #[error("CRC mismatch in {structure}: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// The structure whose CRC failed.
        structure: &'static str,
        /// CRC stored in the input.
        expected: u32,
        /// CRC computed over the input.
        computed: u32,
    },

    /// Invalid header field.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Invalid LZMA properties byte or dictionary size byte.
    #[error("Invalid properties: {message}")]
    InvalidProperties {
        /// Description of the problem.
        message: String,
    },

    /// Corrupted compressed data.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The input ended in the middle of a structure.
    #[error("Unexpected end of input while reading {context}")]
    Truncated {
        /// What was being read.
        context: &'static str,
    },

    /// A valid feature this codec cannot handle.
    #[error("Unsupported feature: {feature}")]
    Unsupported {
        /// Description of the feature.
        feature: String,
    },

    /// Match distance beyond the available history.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    DistanceTooFar {
        /// The distance requested (1-based).
        distance: usize,
        /// Bytes of history available.
        history_size: usize,
    },

    /// Block check mismatch.
    #[error("{check} check mismatch: expected {expected:02x?}, computed {computed:02x?}")]
    CheckMismatch {
        /// Name of the check algorithm.
        check: &'static str,
        /// Check value stored in the block.
        expected: Vec<u8>,
        /// Check value computed over the decoded data.
        computed: Vec<u8>,
    },

    /// Rejected writer options.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the rejected option.
        message: String,
    },
}

/// Result type alias for OxiXZ operations.
pub type Result<T> = std::result::Result<T, XzError>;

impl XzError {
    /// Create an invalid magic error.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(structure: &'static str, expected: u32, computed: u32) -> Self {
        Self::CrcMismatch {
            structure,
            expected,
            computed,
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an invalid properties error.
    pub fn invalid_properties(message: impl Into<String>) -> Self {
        Self::InvalidProperties {
            message: message.into(),
        }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create a truncated input error.
    pub fn truncated(context: &'static str) -> Self {
        Self::Truncated { context }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// Create a distance too far error.
    pub fn distance_too_far(distance: usize, history_size: usize) -> Self {
        Self::DistanceTooFar {
            distance,
            history_size,
        }
    }

    /// Create a check mismatch error.
    pub fn check_mismatch(
        check: &'static str,
        expected: impl Into<Vec<u8>>,
        computed: impl Into<Vec<u8>>,
    ) -> Self {
        Self::CheckMismatch {
            check,
            expected: expected.into(),
            computed: computed.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidMagic { .. }
            | Self::CrcMismatch { .. }
            | Self::InvalidHeader { .. }
            | Self::InvalidProperties { .. }
            | Self::CorruptedData { .. } => ErrorKind::Format,
            Self::Truncated { .. } => ErrorKind::TruncatedInput,
            Self::Unsupported { .. } => ErrorKind::UnsupportedFeature,
            Self::DistanceTooFar { .. } => ErrorKind::DistanceTooFar,
            Self::CheckMismatch { .. } => ErrorKind::IntegrityCheck,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
        }
    }

    /// Recover an error that travelled through an `io::Error`.
    ///
    /// Errors produced by this crate come back unchanged. An
    /// `UnexpectedEof` from the source becomes [`XzError::Truncated`];
    /// anything else is wrapped as [`XzError::Io`].
    pub fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<XzError>()) {
            return match err.downcast::<XzError>() {
                Ok(inner) => inner,
                Err(err) => Self::Io(err),
            };
        }
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::truncated("input stream")
        } else {
            Self::Io(err)
        }
    }
}

impl From<io::Error> for XzError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err)
    }
}

impl From<XzError> for io::Error {
    fn from(err: XzError) -> Self {
        match err {
            XzError::Io(inner) => inner,
            other => {
                let kind = match other.kind() {
                    ErrorKind::TruncatedInput => io::ErrorKind::UnexpectedEof,
                    ErrorKind::InvalidConfig => io::ErrorKind::InvalidInput,
                    ErrorKind::UnsupportedFeature => io::ErrorKind::Unsupported,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XzError::invalid_magic(vec![0xFD, 0x37], vec![0x1F, 0x8B]);
        assert!(err.to_string().contains("Invalid magic"));

        let err = XzError::crc_mismatch("stream header", 0x12345678, 0xDEADBEEF);
        assert!(err.to_string().contains("stream header"));

        let err = XzError::unsupported("filter 0x03");
        assert!(err.to_string().contains("filter 0x03"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(XzError::corrupted(0, "x").kind(), ErrorKind::Format);
        assert_eq!(XzError::invalid_properties("x").kind(), ErrorKind::Format);
        assert_eq!(XzError::truncated("x").kind(), ErrorKind::TruncatedInput);
        assert_eq!(
            XzError::distance_too_far(5, 2).kind(),
            ErrorKind::DistanceTooFar
        );
        assert_eq!(
            XzError::check_mismatch("CRC32", [0u8; 4], [1u8; 4]).kind(),
            ErrorKind::IntegrityCheck
        );
        assert_eq!(XzError::invalid_config("x").kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_io_round_trip_preserves_error() {
        let io_err: io::Error = XzError::distance_too_far(10, 3).into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        let back = XzError::from_io(io_err);
        assert!(matches!(
            back,
            XzError::DistanceTooFar {
                distance: 10,
                history_size: 3
            }
        ));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: XzError = io_err.into();
        assert!(matches!(err, XzError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);

        let back: io::Error = err.into();
        assert_eq!(back.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_eof_becomes_truncated() {
        let io_err = io::Error::from(io::ErrorKind::UnexpectedEof);
        let err = XzError::from(io_err);
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }
}
