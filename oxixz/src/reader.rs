//! Streaming XZ decompression.

use std::io::{self, Read};

use crate::block::{BlockDecoder, BlockHeader, header_size_from_byte};
use crate::check::Check;
use crate::header::{STREAM_HEADER_SIZE, StreamFlags, StreamFooter, StreamHeader};
use crate::index::{INDEX_INDICATOR, Index, IndexRecord};
use crate::options::ReaderConfig;
use oxixz_core::error::{Result, XzError};
use tracing::debug;

/// Where the reader is within the input.
#[derive(Debug)]
enum ReaderState {
    /// Expecting the first stream header.
    StreamHeader,
    /// Expecting a block header or the index indicator.
    BlockOrIndex,
    /// Inside a block.
    Block(Box<BlockDecoder>),
    /// After a stream footer: padding, another stream or the end.
    StreamPadding,
    /// All input decoded.
    Done,
    /// An error was reported; nothing more will be produced.
    Failed,
}

/// XZ decompressor implementing [`Read`].
///
/// Input is pulled from the source in small pieces, so wrap unbuffered
/// sources such as files in a [`std::io::BufReader`].
///
/// ```rust
/// use std::io::Read;
/// use oxixz::{XzOptions, XzReader, compress};
///
/// let packed = compress(b"streamed", &XzOptions::default()).unwrap();
/// let mut reader = XzReader::new(&packed[..]);
/// let mut text = String::new();
/// reader.read_to_string(&mut text).unwrap();
/// assert_eq!(text, "streamed");
/// ```
#[derive(Debug)]
pub struct XzReader<R: Read> {
    src: R,
    config: ReaderConfig,
    state: ReaderState,
    flags: StreamFlags,
    records: Vec<IndexRecord>,
    streams: u64,
}

impl<R: Read> XzReader<R> {
    /// Create a reader decoding all concatenated streams of `src`.
    pub fn new(src: R) -> Self {
        Self::with_config(src, ReaderConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(src: R, config: ReaderConfig) -> Self {
        Self {
            src,
            config,
            state: ReaderState::StreamHeader,
            flags: StreamFlags { check_id: 0 },
            records: Vec::new(),
            streams: 0,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Number of streams fully decoded so far.
    pub fn streams_decoded(&self) -> u64 {
        self.streams
    }

    /// Get a reference to the source.
    pub fn get_ref(&self) -> &R {
        &self.src
    }

    /// Get a mutable reference to the source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.src
    }

    /// Consume the reader and return the source.
    ///
    /// In single-stream mode the source is left just after the first
    /// stream's footer.
    pub fn into_inner(self) -> R {
        self.src
    }

    fn decode(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match &mut self.state {
                ReaderState::Done => return Ok(0),
                ReaderState::Failed => {
                    return Err(XzError::Io(io::Error::other(
                        "xz decoding already failed",
                    )));
                }
                ReaderState::StreamHeader => {
                    let mut bytes = [0u8; STREAM_HEADER_SIZE];
                    self.src.read_exact(&mut bytes)?;
                    self.begin_stream(&bytes)?;
                }
                ReaderState::BlockOrIndex => {
                    let mut first = [0u8; 1];
                    self.src.read_exact(&mut first)?;
                    if first[0] == INDEX_INDICATOR {
                        self.end_stream()?;
                    } else {
                        self.begin_block(first[0])?;
                    }
                }
                ReaderState::Block(block) => {
                    let n = block.read(&mut self.src, buf)?;
                    if n > 0 {
                        return Ok(n);
                    }
                    let record = block.finish(&mut self.src)?;
                    self.records.push(record);
                    self.state = ReaderState::BlockOrIndex;
                }
                ReaderState::StreamPadding => self.skip_padding()?,
            }
        }
    }

    fn begin_stream(&mut self, bytes: &[u8; STREAM_HEADER_SIZE]) -> Result<()> {
        let header = StreamHeader::decode(bytes)?;
        Check::for_id(header.flags.check_id, self.config.strict_check)?;
        debug!(
            stream = self.streams,
            check_id = header.flags.check_id,
            "xz stream header"
        );

        self.flags = header.flags;
        self.records.clear();
        self.state = ReaderState::BlockOrIndex;
        Ok(())
    }

    fn begin_block(&mut self, size_byte: u8) -> Result<()> {
        let size = header_size_from_byte(size_byte);
        let mut bytes = vec![0u8; size];
        bytes[0] = size_byte;
        self.src.read_exact(&mut bytes[1..])?;

        let header = BlockHeader::decode(&bytes)?;
        let check = Check::for_id(self.flags.check_id, self.config.strict_check)?;
        debug!(
            block = self.records.len(),
            header_size = size,
            dict_props = header.dict_props,
            "xz block header"
        );

        self.state = ReaderState::Block(Box::new(BlockDecoder::new(header, size, check)?));
        Ok(())
    }

    fn end_stream(&mut self) -> Result<()> {
        let (index, index_size) = Index::read_after_indicator(&mut self.src)?;
        index.verify(&self.records)?;
        debug!(blocks = index.len(), index_size, "xz index");

        let mut bytes = [0u8; STREAM_HEADER_SIZE];
        self.src.read_exact(&mut bytes)?;
        let footer = StreamFooter::decode(&bytes)?;
        if footer.flags != self.flags {
            return Err(XzError::invalid_header(
                "stream footer flags differ from header",
            ));
        }
        if footer.index_size != index_size {
            return Err(XzError::invalid_header(format!(
                "backward size {} does not match index size {index_size}",
                footer.index_size
            )));
        }

        self.streams += 1;
        self.records.clear();
        self.state = if self.config.single_stream {
            ReaderState::Done
        } else {
            ReaderState::StreamPadding
        };
        Ok(())
    }

    fn skip_padding(&mut self) -> Result<()> {
        let mut group = [0u8; 4];
        let n = read_full(&mut self.src, &mut group)?;
        match n {
            0 => {
                debug!(streams = self.streams, "xz input finished");
                self.state = ReaderState::Done;
            }
            4 if group == [0; 4] => {}
            4 => {
                let mut bytes = [0u8; STREAM_HEADER_SIZE];
                bytes[..4].copy_from_slice(&group);
                self.src.read_exact(&mut bytes[4..])?;
                self.begin_stream(&bytes)?;
            }
            _ if group[..n].iter().all(|&b| b == 0) => {
                return Err(XzError::invalid_header(
                    "stream padding is not a multiple of four bytes",
                ));
            }
            _ => return Err(XzError::truncated("stream header")),
        }
        Ok(())
    }
}

impl<R: Read> Read for XzReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.decode(buf).map_err(|err| {
            self.state = ReaderState::Failed;
            err.into()
        })
    }
}

/// Read until `buf` is full or the source ends.
fn read_full<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
