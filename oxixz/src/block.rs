//! Blocks: header, LZMA2 payload, padding and check.
//!
//! The only supported filter chain is a single LZMA2 filter. Headers
//! written here never carry size fields, since blocks are produced in a
//! streaming fashion; headers read here may carry either size, and the
//! declared values are checked against what was actually decoded.

use std::io::{self, Read};

use crate::check::{Check, CheckType};
use crate::index::IndexRecord;
use crate::vli::{read_vli, write_vli};
use oxixz_core::crc::Crc32;
use oxixz_core::error::{Result, XzError};
use oxixz_lzma::{Lzma2Config, Lzma2Decoder, Lzma2Encoder, dict_size_from_props};
use tracing::{debug, trace};

/// Filter id of LZMA2.
pub const FILTER_LZMA2: u64 = 0x21;

/// Largest block header, in bytes.
pub const BLOCK_HEADER_SIZE_MAX: usize = 1024;

/// Block flag: compressed size field present.
const FLAG_COMPRESSED_SIZE: u8 = 0x40;
/// Block flag: uncompressed size field present.
const FLAG_UNCOMPRESSED_SIZE: u8 = 0x80;
/// Block flag: reserved bits.
const FLAG_RESERVED: u8 = 0x3C;
/// Block flag: number of filters minus one.
const FLAG_FILTER_COUNT: u8 = 0x03;

/// Zero bytes needed to bring `len` to a multiple of four.
pub(crate) fn padding_for(len: u64) -> usize {
    ((4 - len % 4) % 4) as usize
}

/// Total header length announced by the header size byte.
pub fn header_size_from_byte(byte: u8) -> usize {
    (byte as usize + 1) * 4
}

/// Block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Declared compressed size.
    pub compressed_size: Option<u64>,
    /// Declared uncompressed size.
    pub uncompressed_size: Option<u64>,
    /// LZMA2 dictionary size byte.
    pub dict_props: u8,
}

impl BlockHeader {
    /// Header for a streamed block with no size fields.
    pub fn new(dict_props: u8) -> Self {
        Self {
            compressed_size: None,
            uncompressed_size: None,
            dict_props,
        }
    }

    /// Dictionary size declared by the LZMA2 filter properties.
    pub fn dict_size(&self) -> Result<u32> {
        dict_size_from_props(self.dict_props)
    }

    /// Encode the header, including the size byte and the CRC32.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8];

        let mut flags = 0u8;
        if self.compressed_size.is_some() {
            flags |= FLAG_COMPRESSED_SIZE;
        }
        if self.uncompressed_size.is_some() {
            flags |= FLAG_UNCOMPRESSED_SIZE;
        }
        out.push(flags);

        if let Some(size) = self.compressed_size {
            write_vli(size, &mut out);
        }
        if let Some(size) = self.uncompressed_size {
            write_vli(size, &mut out);
        }

        write_vli(FILTER_LZMA2, &mut out);
        write_vli(1, &mut out);
        out.push(self.dict_props);

        out.resize(out.len() + padding_for(out.len() as u64), 0);
        out[0] = ((out.len() + 4) / 4 - 1) as u8;

        let crc = Crc32::compute(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Decode a complete header, starting with its size byte.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let size = match bytes.first() {
            Some(&0) | None => return Err(XzError::invalid_header("empty block header")),
            Some(&byte) => header_size_from_byte(byte),
        };
        if bytes.len() != size {
            return Err(XzError::invalid_header(format!(
                "block header is {} bytes, size byte says {size}",
                bytes.len()
            )));
        }

        let body = &bytes[..size - 4];
        let stored = u32::from_le_bytes([
            bytes[size - 4],
            bytes[size - 3],
            bytes[size - 2],
            bytes[size - 1],
        ]);
        let computed = Crc32::compute(body);
        if stored != computed {
            return Err(XzError::crc_mismatch("block header", stored, computed));
        }

        let flags = body[1];
        if flags & FLAG_RESERVED != 0 {
            return Err(XzError::unsupported(format!(
                "reserved block flags {flags:#04x}"
            )));
        }

        let mut pos = 2;
        let compressed_size = if flags & FLAG_COMPRESSED_SIZE != 0 {
            let value = read_vli(body, &mut pos)?;
            if value == 0 {
                return Err(XzError::invalid_header("declared compressed size is zero"));
            }
            Some(value)
        } else {
            None
        };
        let uncompressed_size = if flags & FLAG_UNCOMPRESSED_SIZE != 0 {
            Some(read_vli(body, &mut pos)?)
        } else {
            None
        };

        let filters = (flags & FLAG_FILTER_COUNT) as usize + 1;
        let mut dict_props = None;
        for _ in 0..filters {
            let id = read_vli(body, &mut pos)?;
            let props_len = read_vli(body, &mut pos)?;
            if id != FILTER_LZMA2 {
                return Err(XzError::unsupported(format!("filter {id:#x}")));
            }
            if props_len != 1 {
                return Err(XzError::invalid_header(format!(
                    "LZMA2 filter properties are {props_len} bytes"
                )));
            }
            let props = *body
                .get(pos)
                .ok_or_else(|| XzError::invalid_header("filter properties overrun header"))?;
            pos += 1;
            if props & 0xC0 != 0 {
                return Err(XzError::invalid_properties(format!(
                    "reserved bits in LZMA2 dictionary byte {props:#04x}"
                )));
            }
            dict_size_from_props(props)?;
            dict_props = Some(props);
        }
        if filters != 1 {
            return Err(XzError::unsupported(format!("filter chain of {filters} filters")));
        }

        if body[pos..].iter().any(|&b| b != 0) {
            return Err(XzError::unsupported("non-zero block header padding"));
        }

        Ok(Self {
            compressed_size,
            uncompressed_size,
            dict_props: dict_props.unwrap_or_default(),
        })
    }
}

/// Read adapter counting the bytes pulled through it.
struct Counted<'a, R> {
    inner: &'a mut R,
    count: &'a mut u64,
}

impl<R: Read> Read for Counted<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        *self.count += n as u64;
        Ok(n)
    }
}

/// Decoder for one block body, after its header.
#[derive(Debug)]
pub struct BlockDecoder {
    header: BlockHeader,
    header_size: u64,
    lzma2: Lzma2Decoder,
    check: Check,
    compressed: u64,
    uncompressed: u64,
}

impl BlockDecoder {
    /// Prepare to decode the block described by `header`.
    pub fn new(header: BlockHeader, header_size: usize, check: Check) -> Result<Self> {
        let dict_size = header.dict_size()?;
        Ok(Self {
            header,
            header_size: header_size as u64,
            lzma2: Lzma2Decoder::new(dict_size),
            check,
            compressed: 0,
            uncompressed: 0,
        })
    }

    /// Uncompressed bytes produced so far.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed
    }

    /// Whether the LZMA2 end marker has been read.
    pub fn is_finished(&self) -> bool {
        self.lzma2.is_finished()
    }

    /// Decode into `out`. Returns 0 once the payload is exhausted.
    pub fn read<R: Read>(&mut self, src: &mut R, out: &mut [u8]) -> Result<usize> {
        let mut counted = Counted {
            inner: src,
            count: &mut self.compressed,
        };
        let n = self.lzma2.read(&mut counted, out)?;

        self.uncompressed += n as u64;
        self.check.update(&out[..n]);

        if let Some(declared) = self.header.compressed_size.filter(|&d| self.compressed > d) {
            return Err(XzError::corrupted(
                self.compressed,
                format!("block data exceeds declared compressed size {declared}"),
            ));
        }
        if let Some(declared) = self
            .header
            .uncompressed_size
            .filter(|&d| self.uncompressed > d)
        {
            return Err(XzError::corrupted(
                self.compressed,
                format!("block output exceeds declared uncompressed size {declared}"),
            ));
        }
        Ok(n)
    }

    /// Consume padding and check after the payload and verify the block.
    pub fn finish<R: Read>(&mut self, src: &mut R) -> Result<IndexRecord> {
        if let Some(declared) = self.header.compressed_size.filter(|&d| d != self.compressed) {
            return Err(XzError::corrupted(
                self.compressed,
                format!("block compressed size {} != declared {declared}", self.compressed),
            ));
        }
        if let Some(declared) = self
            .header
            .uncompressed_size
            .filter(|&d| d != self.uncompressed)
        {
            return Err(XzError::corrupted(
                self.compressed,
                format!(
                    "block uncompressed size {} != declared {declared}",
                    self.uncompressed
                ),
            ));
        }

        let mut padding = [0u8; 3];
        let padding = &mut padding[..padding_for(self.compressed)];
        src.read_exact(padding)?;
        if padding.iter().any(|&b| b != 0) {
            return Err(XzError::corrupted(self.compressed, "non-zero block padding"));
        }

        let mut stored = vec![0u8; self.check.size()];
        src.read_exact(&mut stored)?;
        self.check.verify(&stored)?;

        let record = IndexRecord {
            unpadded_size: self.header_size + self.compressed + stored.len() as u64,
            uncompressed_size: self.uncompressed,
        };
        debug!(
            compressed = self.compressed,
            uncompressed = self.uncompressed,
            "block decoded"
        );
        Ok(record)
    }
}

/// Encoder producing complete blocks one after another.
#[derive(Debug)]
pub struct BlockEncoder {
    lzma2: Lzma2Encoder,
    check: Check,
    header_size: u64,
    compressed: u64,
    uncompressed: u64,
    open: bool,
}

impl BlockEncoder {
    /// Create a block encoder.
    pub fn new(config: Lzma2Config, check: CheckType) -> Result<Self> {
        Ok(Self {
            lzma2: Lzma2Encoder::new(config)?,
            check: Check::new(check),
            header_size: 0,
            compressed: 0,
            uncompressed: 0,
            open: false,
        })
    }

    /// Whether a block has been started and not finished.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Uncompressed bytes in the open block.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed
    }

    /// Compress `data` into the open block, starting one if needed.
    pub fn write(&mut self, data: &[u8], out: &mut Vec<u8>) {
        if !self.open {
            let header = BlockHeader::new(self.lzma2.dict_props()).encode();
            self.header_size = header.len() as u64;
            out.extend_from_slice(&header);
            self.compressed = 0;
            self.uncompressed = 0;
            self.open = true;
        }

        let start = out.len();
        self.lzma2.write(data, out);
        self.compressed += (out.len() - start) as u64;
        self.uncompressed += data.len() as u64;
        self.check.update(data);
    }

    /// Close the open block: end marker, padding and check.
    pub fn finish(&mut self, out: &mut Vec<u8>) -> IndexRecord {
        let start = out.len();
        self.lzma2.finish(out);
        self.compressed += (out.len() - start) as u64;

        out.resize(out.len() + padding_for(self.compressed), 0);
        let check = self.check.finalize_reset();
        out.extend_from_slice(&check);
        self.open = false;

        trace!(
            compressed = self.compressed,
            uncompressed = self.uncompressed,
            "block encoded"
        );
        IndexRecord {
            unpadded_size: self.header_size + self.compressed + check.len() as u64,
            uncompressed_size: self.uncompressed,
        }
    }
}

/// Encode `data` as one complete block.
pub fn encode_block(
    data: &[u8],
    config: Lzma2Config,
    check: CheckType,
) -> Result<(Vec<u8>, IndexRecord)> {
    let mut encoder = BlockEncoder::new(config, check)?;
    let mut out = Vec::with_capacity(data.len() / 2 + 64);
    encoder.write(data, &mut out);
    let record = encoder.finish(&mut out);
    Ok((out, record))
}
