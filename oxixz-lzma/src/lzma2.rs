//! LZMA2 codec for XZ files.
//!
//! LZMA2 is a container format around LZMA that provides:
//! - Support for uncompressible chunks (stored as-is)
//! - Dictionary/state reset capability
//! - Chunk-based format for better streaming
//!
//! Both directions are incremental. [`Lzma2Decoder::read`] pulls exactly the
//! bytes it needs from the source and fills the caller's buffer;
//! [`Lzma2Encoder::write`] accepts input in pieces of any size and appends
//! finished chunks to an output buffer.

use crate::decoder::LzmaDecoder;
use crate::encoder::LzmaEncoder;
use crate::lzma2_chunk::{
    ChunkHeader, ChunkType, LZMA_CHUNK_MAX_COMPRESSED, Lzma2Config, LzmaReset,
    UNCOMPRESSED_CHUNK_MAX,
};
use crate::model::MATCH_LEN_MAX;
use crate::range_coder::{RangeDecoder, RangeEncoder};
use oxixz_core::error::{Result, XzError};
use oxixz_core::window::Window;
use std::io::Read;
use tracing::trace;

/// Input is handed to the match finder in pieces of at most this size.
const FEED_PIECE: usize = 1 << 20;

/// Headroom kept below [`LZMA_CHUNK_MAX_COMPRESSED`] for the next symbol.
const CHUNK_MARGIN: usize = 64;

/// Largest LZMA2 dictionary properties byte.
const DICT_PROPS_MAX: u8 = 40;

/// Where the decoder is within the chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// Next byte is a control byte.
    Control,
    /// Copying an uncompressed chunk.
    Uncompressed { remaining: usize },
    /// Decoding an LZMA chunk whose payload is loaded.
    Lzma { remaining: usize },
    /// End marker seen.
    Finished,
}

/// Streaming LZMA2 decoder.
#[derive(Debug)]
pub struct Lzma2Decoder {
    /// Dictionary window shared by all chunks.
    window: Window,
    /// LZMA symbol decoder.
    lzma: LzmaDecoder,
    /// Range decoder over the current chunk payload.
    rc: RangeDecoder,
    /// Chunk sequence position.
    state: ChunkState,
    /// The next chunk must reset the dictionary.
    need_dict_reset: bool,
    /// The next LZMA chunk must carry properties.
    need_props: bool,
}

impl Lzma2Decoder {
    /// Create a new LZMA2 decoder with the given dictionary size.
    pub fn new(dict_size: u32) -> Self {
        Self {
            window: Window::new(dict_size as usize),
            lzma: LzmaDecoder::new(Default::default()),
            rc: RangeDecoder::new(),
            state: ChunkState::Control,
            need_dict_reset: true,
            need_props: true,
        }
    }

    /// Whether the end-of-stream chunk has been read.
    pub fn is_finished(&self) -> bool {
        self.state == ChunkState::Finished
    }

    /// Decode into `out`, reading chunks from `src` as needed.
    ///
    /// Returns 0 once the end marker has been read (or `out` is empty).
    pub fn read<R: Read>(&mut self, src: &mut R, out: &mut [u8]) -> Result<usize> {
        let mut written = 0;

        while written < out.len() {
            match self.state {
                ChunkState::Finished => break,
                ChunkState::Control => {
                    let header = ChunkHeader::read(src)?;
                    self.start_chunk(src, header)?;
                }
                ChunkState::Uncompressed { remaining } => {
                    let n = remaining.min(out.len() - written);
                    let dst = &mut out[written..written + n];
                    src.read_exact(dst)?;
                    self.window.extend_delivered(dst);
                    written += n;
                    self.state = if remaining == n {
                        ChunkState::Control
                    } else {
                        ChunkState::Uncompressed {
                            remaining: remaining - n,
                        }
                    };
                }
                ChunkState::Lzma { remaining } => {
                    let limit = remaining
                        .min(out.len() - written)
                        .min(self.window.avail());
                    let n = self.lzma.decode(&mut self.rc, &mut self.window, limit)?;
                    written += self.window.drain(&mut out[written..]);
                    if remaining == n {
                        self.finish_lzma_chunk()?;
                        self.state = ChunkState::Control;
                    } else {
                        self.state = ChunkState::Lzma {
                            remaining: remaining - n,
                        };
                    }
                }
            }
        }

        Ok(written)
    }

    /// Apply the resets of a new chunk and load its payload.
    fn start_chunk<R: Read>(&mut self, src: &mut R, header: ChunkHeader) -> Result<()> {
        trace!(kind = ?header.kind, unpacked = header.unpacked, packed = header.packed, "lzma2 chunk");

        if header.kind.resets_dict() {
            self.window.reset();
            self.need_dict_reset = false;
            self.need_props = true;
        } else if self.need_dict_reset && header.kind != ChunkType::EndOfStream {
            return Err(XzError::invalid_header(
                "first LZMA2 chunk does not reset the dictionary",
            ));
        }

        match header.kind {
            ChunkType::EndOfStream => self.state = ChunkState::Finished,
            ChunkType::Uncompressed { .. } => {
                self.state = ChunkState::Uncompressed {
                    remaining: header.unpacked,
                };
            }
            ChunkType::Lzma { reset } => {
                if let Some(props) = header.props {
                    self.lzma.set_props(props);
                    self.need_props = false;
                } else if self.need_props {
                    return Err(XzError::invalid_header(
                        "LZMA2 chunk without properties after a dictionary reset",
                    ));
                } else if reset.resets_state() {
                    self.lzma.reset_state();
                }

                src.read_exact(self.rc.chunk_buffer(header.packed))?;
                self.rc.init()?;
                self.state = ChunkState::Lzma {
                    remaining: header.unpacked,
                };
            }
        }
        Ok(())
    }

    /// Verify that an LZMA chunk ended exactly where its header said.
    fn finish_lzma_chunk(&mut self) -> Result<()> {
        self.rc.normalize()?;
        if self.lzma.has_pending_match() {
            return Err(XzError::corrupted(
                self.window.total(),
                "match runs past the end of an LZMA2 chunk",
            ));
        }
        if !self.rc.is_finished_ok() {
            return Err(XzError::corrupted(
                self.window.total(),
                "LZMA2 chunk payload does not end with the decoded data",
            ));
        }
        Ok(())
    }
}

/// Streaming LZMA2 encoder.
#[derive(Debug)]
pub struct Lzma2Encoder {
    /// Configuration.
    config: Lzma2Config,
    /// LZMA symbol encoder with the buffered input.
    lzma: LzmaEncoder,
    /// Range encoder for the open chunk.
    rc: RangeEncoder,
    /// Absolute position of the open chunk's first byte.
    chunk_start: u64,
    /// Uncompressed bytes in the open chunk.
    chunk_unc: usize,
    /// The next chunk must reset the dictionary.
    need_dict_reset: bool,
    /// The next LZMA chunk must carry properties.
    need_props: bool,
    /// The next LZMA chunk must reset the state.
    need_state_reset: bool,
}

impl Lzma2Encoder {
    /// Create an encoder from a validated configuration.
    pub fn new(config: Lzma2Config) -> Result<Self> {
        config.validate()?;
        let lzma = LzmaEncoder::new(config.props, config.dict_size, config.level);
        Ok(Self {
            config,
            lzma,
            rc: RangeEncoder::new(),
            chunk_start: 0,
            chunk_unc: 0,
            need_dict_reset: true,
            need_props: true,
            need_state_reset: true,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &Lzma2Config {
        &self.config
    }

    /// Dictionary size.
    pub fn dict_size(&self) -> u32 {
        self.config.dict_size
    }

    /// Dictionary properties byte for the filter flags.
    pub fn dict_props(&self) -> u8 {
        props_from_dict_size(self.config.dict_size)
    }

    /// Compress `data`, appending finished chunks to `out`.
    pub fn write(&mut self, data: &[u8], out: &mut Vec<u8>) {
        for piece in data.chunks(FEED_PIECE) {
            self.lzma.feed(piece);
            self.encode_buffered(out, false);
        }
    }

    /// Flush all buffered input and append the end marker.
    ///
    /// The encoder is then ready for a new, independent LZMA2 stream.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        self.encode_buffered(out, true);
        ChunkHeader::END.write(out);

        self.lzma.reset();
        self.chunk_start = 0;
        self.chunk_unc = 0;
        self.need_dict_reset = true;
        self.need_props = true;
        self.need_state_reset = true;
    }

    fn encode_buffered(&mut self, out: &mut Vec<u8>, finishing: bool) {
        loop {
            let ahead = self.lzma.lookahead();
            // Keep a full match plus one byte of lookahead until the end.
            if ahead == 0 || (!finishing && ahead <= MATCH_LEN_MAX) {
                break;
            }

            if self.chunk_unc == 0 {
                self.begin_chunk();
            }

            let limit = self.config.chunk_size - self.chunk_unc;
            self.chunk_unc += self.lzma.encode_symbol(&mut self.rc, limit);

            if self.chunk_unc >= self.config.chunk_size
                || self.rc.pending_size() + CHUNK_MARGIN > LZMA_CHUNK_MAX_COMPRESSED
            {
                self.flush_chunk(out);
            }
        }

        if finishing && self.chunk_unc > 0 {
            self.flush_chunk(out);
        }
    }

    fn begin_chunk(&mut self) {
        if self.need_dict_reset || self.need_props || self.need_state_reset {
            self.lzma.reset_state();
        }
        self.rc.reset();
        self.chunk_start = self.lzma.position();
    }

    /// Close the open chunk, storing it uncompressed if LZMA did not help.
    fn flush_chunk(&mut self, out: &mut Vec<u8>) {
        self.rc.flush();
        let packed = self.rc.output().len();
        let unpacked = self.chunk_unc;

        if packed >= unpacked || packed > LZMA_CHUNK_MAX_COMPRESSED {
            trace!(unpacked, packed, "lzma2 chunk stored uncompressed");
            let raw = self.lzma.raw(self.chunk_start, unpacked);
            for piece in raw.chunks(UNCOMPRESSED_CHUNK_MAX) {
                let header = ChunkHeader {
                    kind: ChunkType::Uncompressed {
                        reset_dict: self.need_dict_reset,
                    },
                    unpacked: piece.len(),
                    packed: 0,
                    props: None,
                };
                header.write(out);
                out.extend_from_slice(piece);
                self.need_dict_reset = false;
            }
            self.need_state_reset = true;
        } else {
            let reset = if self.need_dict_reset {
                LzmaReset::All
            } else if self.need_props {
                LzmaReset::StateProps
            } else if self.need_state_reset {
                LzmaReset::State
            } else {
                LzmaReset::None
            };
            trace!(unpacked, packed, ?reset, "lzma2 chunk");

            let header = ChunkHeader {
                kind: ChunkType::Lzma { reset },
                unpacked,
                packed,
                props: reset.has_props().then(|| self.lzma.props()),
            };
            header.write(out);
            out.extend_from_slice(self.rc.output());
            self.need_dict_reset = false;
            self.need_props = false;
            self.need_state_reset = false;
        }

        self.chunk_unc = 0;
        self.lzma.release_before(self.lzma.position());
    }
}

/// Decode a complete LZMA2 stream.
pub fn decode_lzma2(data: &[u8], dict_size: u32) -> Result<Vec<u8>> {
    let mut src = data;
    let mut decoder = Lzma2Decoder::new(dict_size);
    let mut output = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = decoder.read(&mut src, &mut buf)?;
        if n == 0 {
            break;
        }
        output.extend_from_slice(&buf[..n]);
    }

    Ok(output)
}

/// Encode data to LZMA2 format.
pub fn encode_lzma2(data: &[u8], config: Lzma2Config) -> Result<Vec<u8>> {
    let mut encoder = Lzma2Encoder::new(config)?;
    let mut output = Vec::new();
    encoder.write(data, &mut output);
    encoder.finish(&mut output);
    Ok(output)
}

/// Get dictionary size from LZMA2 properties byte.
///
/// Formula: `(2 | (props & 1)) << (props / 2 + 11)`; 40 means `u32::MAX`.
pub fn dict_size_from_props(props: u8) -> Result<u32> {
    if props > DICT_PROPS_MAX {
        return Err(XzError::invalid_properties(format!(
            "LZMA2 dictionary size byte {props} exceeds {DICT_PROPS_MAX}"
        )));
    }
    if props == DICT_PROPS_MAX {
        return Ok(u32::MAX);
    }

    let base = 2 | (props as u32 & 1);
    Ok(base << (props / 2 + 11))
}

/// Encode dictionary size to LZMA2 properties byte.
///
/// Picks the smallest encodable size that is at least `dict_size`.
pub fn props_from_dict_size(dict_size: u32) -> u8 {
    (0..DICT_PROPS_MAX)
        .find(|&props| matches!(dict_size_from_props(props), Ok(size) if size >= dict_size))
        .unwrap_or(DICT_PROPS_MAX)
}
