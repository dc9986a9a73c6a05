//! Stream index.
//!
//! The index follows the last block: an indicator byte of zero, the record
//! count, one (unpadded size, uncompressed size) record per block, zero
//! padding to a multiple of four and a CRC32 over everything before it.

use std::io::Read;

use crate::block::padding_for;
use crate::vli::{decode_vli_with, encoded_len, write_vli};
use oxixz_core::crc::Crc32;
use oxixz_core::error::{Result, XzError};

/// Byte that introduces the index where a block header would start.
pub const INDEX_INDICATOR: u8 = 0x00;

/// Sizes of one block as recorded in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Block header + compressed data + check, without block padding.
    pub unpadded_size: u64,
    /// Decompressed size of the block.
    pub uncompressed_size: u64,
}

impl IndexRecord {
    /// Size the block occupies in the stream, padding included.
    pub fn padded_size(&self) -> u64 {
        self.unpadded_size + padding_for(self.unpadded_size) as u64
    }
}

/// Index of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    records: Vec<IndexRecord>,
}

impl Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, record: IndexRecord) {
        self.records.push(record);
    }

    /// Records in block order.
    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the stream has no blocks.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total decompressed size of the stream.
    pub fn uncompressed_size(&self) -> u64 {
        self.records.iter().map(|r| r.uncompressed_size).sum()
    }

    /// Size of the encoded index, CRC32 included.
    pub fn encoded_size(&self) -> u64 {
        let mut size = 1 + encoded_len(self.records.len() as u64);
        for record in &self.records {
            size += encoded_len(record.unpadded_size) + encoded_len(record.uncompressed_size);
        }
        let size = size as u64;
        size + padding_for(size) as u64 + 4
    }

    /// Encode the index.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![INDEX_INDICATOR];
        write_vli(self.records.len() as u64, &mut out);
        for record in &self.records {
            write_vli(record.unpadded_size, &mut out);
            write_vli(record.uncompressed_size, &mut out);
        }
        out.resize(out.len() + padding_for(out.len() as u64), 0);

        let crc = Crc32::compute(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Read an index whose indicator byte has already been consumed.
    ///
    /// Returns the index and its encoded size.
    pub fn read_after_indicator<R: Read>(src: &mut R) -> Result<(Self, u64)> {
        let mut crc = Crc32::new();
        crc.update(&[INDEX_INDICATOR]);
        let mut size = 1u64;

        let mut next_byte = || -> Result<u8> {
            let mut byte = [0u8; 1];
            src.read_exact(&mut byte)?;
            crc.update(&byte);
            size += 1;
            Ok(byte[0])
        };

        let count = decode_vli_with(&mut next_byte)?;
        let mut records = Vec::new();
        for _ in 0..count {
            let unpadded_size = decode_vli_with(&mut next_byte)?;
            let uncompressed_size = decode_vli_with(&mut next_byte)?;
            if unpadded_size == 0 {
                return Err(XzError::invalid_header("index record with zero unpadded size"));
            }
            records.push(IndexRecord {
                unpadded_size,
                uncompressed_size,
            });
        }

        let mut padding = [0u8; 3];
        let padding = &mut padding[..padding_for(size)];
        src.read_exact(padding)?;
        if padding.iter().any(|&b| b != 0) {
            return Err(XzError::invalid_header("non-zero index padding"));
        }
        crc.update(padding);
        size += padding.len() as u64;

        let mut stored = [0u8; 4];
        src.read_exact(&mut stored)?;
        let stored = u32::from_le_bytes(stored);
        let computed = crc.finalize();
        if stored != computed {
            return Err(XzError::crc_mismatch("index", stored, computed));
        }

        Ok((Self { records }, size + 4))
    }

    /// Check that this index describes exactly the blocks that were decoded.
    pub fn verify(&self, decoded: &[IndexRecord]) -> Result<()> {
        if self.records.len() != decoded.len() {
            return Err(XzError::invalid_header(format!(
                "index lists {} blocks, stream has {}",
                self.records.len(),
                decoded.len()
            )));
        }
        for (i, (listed, actual)) in self.records.iter().zip(decoded).enumerate() {
            if listed != actual {
                return Err(XzError::invalid_header(format!(
                    "index record {i} is {listed:?}, block was {actual:?}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxixz_core::ErrorKind;

    fn sample() -> Index {
        let mut index = Index::new();
        index.push(IndexRecord {
            unpadded_size: 35,
            uncompressed_size: 11,
        });
        index.push(IndexRecord {
            unpadded_size: 70_000,
            uncompressed_size: 1 << 20,
        });
        index
    }

    #[test]
    fn test_empty_index_bytes() {
        let index = Index::new();
        let bytes = index.encode();
        assert_eq!(bytes, [0x00, 0x00, 0x00, 0x00, 0x1C, 0xDF, 0x44, 0x21]);
        assert_eq!(index.encoded_size(), 8);
    }

    #[test]
    fn test_single_record_matches_reference() {
        let mut index = Index::new();
        index.push(IndexRecord {
            unpadded_size: 0x23,
            uncompressed_size: 0x0B,
        });
        assert_eq!(
            index.encode(),
            [0x00, 0x01, 0x23, 0x0B, 0xC2, 0x1B, 0xFD, 0x09]
        );
    }

    #[test]
    fn test_roundtrip() {
        let index = sample();
        let bytes = index.encode();
        assert_eq!(bytes.len() as u64, index.encoded_size());
        assert_eq!(bytes.len() % 4, 0);

        let mut src = &bytes[1..];
        let (read, size) = Index::read_after_indicator(&mut src).unwrap();
        assert_eq!(read, index);
        assert_eq!(size, bytes.len() as u64);
        assert!(src.is_empty());
        assert_eq!(read.uncompressed_size(), 11 + (1 << 20));
    }

    #[test]
    fn test_bad_crc() {
        let mut bytes = sample().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;
        let mut src = &bytes[1..];
        assert!(matches!(
            Index::read_after_indicator(&mut src),
            Err(XzError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = sample().encode();
        let mut src = &bytes[1..bytes.len() - 2];
        let err = Index::read_after_indicator(&mut src).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn test_verify() {
        let index = sample();
        assert!(index.verify(index.records()).is_ok());
        assert!(index.verify(&index.records()[..1]).is_err());

        let mut other = index.records().to_vec();
        other[1].uncompressed_size += 1;
        assert_eq!(index.verify(&other).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_padded_size() {
        let record = IndexRecord {
            unpadded_size: 35,
            uncompressed_size: 0,
        };
        assert_eq!(record.padded_size(), 36);
    }
}
