//! Streaming XZ compression.

use std::io::{self, Write};

use crate::block::BlockEncoder;
use crate::header::{StreamFlags, StreamFooter, StreamHeader};
use crate::index::Index;
use crate::options::XzOptions;
use oxixz_core::error::Result;
use tracing::debug;

/// Uncompressed bytes handed to the block encoder per step, bounding the
/// compressed bytes buffered between writes to the sink.
const WRITE_STEP: u64 = 1 << 20;

/// XZ compressor implementing [`Write`].
///
/// The stream header is written on construction. Call [`XzWriter::finish`]
/// to write the final block, the index and the footer; dropping the writer
/// without finishing leaves an incomplete stream.
///
/// If the sink fails, the compressed bytes it did not take stay buffered
/// and are sent again by the next `write`, `flush` or `finish`.
///
/// ```rust
/// use std::io::Write;
/// use oxixz::{XzOptions, XzWriter, decompress};
///
/// let mut writer = XzWriter::new(Vec::new(), XzOptions::default()).unwrap();
/// writer.write_all(b"Hello ").unwrap();
/// writer.write_all(b"world").unwrap();
/// let packed = writer.finish().unwrap();
/// assert_eq!(decompress(&packed).unwrap(), b"Hello world");
/// ```
#[derive(Debug)]
pub struct XzWriter<W: Write> {
    sink: W,
    flags: StreamFlags,
    block: BlockEncoder,
    block_size: u64,
    index: Index,
    buf: Vec<u8>,
}

impl<W: Write> XzWriter<W> {
    /// Validate `options`, write the stream header and return the writer.
    pub fn new(mut sink: W, options: XzOptions) -> Result<Self> {
        options.validate()?;
        let block = BlockEncoder::new(options.lzma2_config(), options.check)?;
        let flags = StreamFlags::new(options.check);

        sink.write_all(&StreamHeader::new(flags).encode())?;
        debug!(
            check = options.check.name(),
            dict_size = options.dict_size,
            level = options.level,
            "xz stream started"
        );

        Ok(Self {
            sink,
            flags,
            block,
            block_size: options.effective_block_size(),
            index: Index::new(),
            buf: Vec::new(),
        })
    }

    /// Get a reference to the sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Blocks completed so far.
    pub fn blocks_written(&self) -> usize {
        self.index.len()
    }

    /// Mutable reference to the sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Encode the next step of `data` into the output buffer, returning how
    /// many input bytes it consumed.
    fn encode_step(&mut self, data: &[u8]) -> usize {
        let used = if self.block.is_open() {
            self.block.uncompressed_size()
        } else {
            0
        };
        let take = (self.block_size - used)
            .min(WRITE_STEP)
            .min(data.len() as u64) as usize;

        self.block.write(&data[..take], &mut self.buf);
        if used + take as u64 == self.block_size {
            self.finish_block();
        }
        take
    }

    fn finish_block(&mut self) {
        let record = self.block.finish(&mut self.buf);
        debug!(
            block = self.index.len(),
            unpadded = record.unpadded_size,
            uncompressed = record.uncompressed_size,
            "xz block finished"
        );
        self.index.push(record);
    }

    /// Write buffered output to the sink.
    ///
    /// Bytes the sink accepted are dropped from the buffer even when a later
    /// write fails, so a retry resumes where the sink stopped.
    fn flush_buf(&mut self) -> io::Result<()> {
        while !self.buf.is_empty() {
            match self.sink.write(&self.buf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.buf.drain(..n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Finish the stream and return the sink.
    pub fn finish(mut self) -> Result<W> {
        if self.block.is_open() {
            self.finish_block();
        }

        let index = self.index.encode();
        self.buf.extend_from_slice(&index);
        let footer = StreamFooter::new(self.flags, index.len() as u64);
        self.buf.extend_from_slice(&footer.encode());
        debug!(
            blocks = self.index.len(),
            index_size = index.len(),
            "xz stream finished"
        );

        self.flush_buf()?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

impl<W: Write> Write for XzWriter<W> {
    /// Accepts at most one block step of `data` per call.
    ///
    /// Output still pending from an earlier failed write is sent first; if
    /// that fails no input is taken. Once input is encoded it counts as
    /// written, and a sink error on its output is reported by the next call.
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.flush_buf()?;
        if data.is_empty() {
            return Ok(0);
        }

        let taken = self.encode_step(data);
        if let Err(err) = self.flush_buf() {
            debug!(error = %err, pending = self.buf.len(), "xz output deferred");
        }
        Ok(taken)
    }

    /// Flushes compressed output already produced; input still buffered by
    /// the encoder stays buffered until more data or [`XzWriter::finish`].
    fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()?;
        self.sink.flush()
    }
}
