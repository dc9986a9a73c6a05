//! # OxiXZ
//!
//! Reader and writer for the XZ container format with LZMA2 compression,
//! interoperable with the reference `xz` tool.
//!
//! ## Features
//!
//! - **Pure Rust** implementation on top of `oxixz-lzma`
//! - **Streaming** [`XzReader`] / [`XzWriter`] implementing `io::Read` / `io::Write`
//! - CRC32, CRC64, SHA-256 and "none" integrity checks
//! - Concatenated streams and stream padding
//! - Multi-block output with a configurable block size
//! - Optional block-parallel compression (`parallel` feature)
//!
//! ## Example
//!
//! ```rust
//! use oxixz::{CheckType, XzOptions, compress, decompress};
//!
//! let options = XzOptions::default().check(CheckType::Crc32);
//! let packed = compress(b"Hello world", &options).unwrap();
//! assert_eq!(&packed[..6], &oxixz::XZ_MAGIC);
//! assert_eq!(decompress(&packed).unwrap(), b"Hello world");
//! ```
//!
//! ## Stream Layout
//!
//! ```text
//! ┌───────────────┬─────────┬─────┬─────────┬───────┬───────────────┐
//! │ Stream header │ Block 0 │ ... │ Block n │ Index │ Stream footer │
//! └───────────────┴─────────┴─────┴─────────┴───────┴───────────────┘
//! ```
//!
//! Each block is a header naming the LZMA2 filter, the LZMA2 payload, zero
//! padding to four bytes and the check. Errors surface as
//! [`XzError`]; through `io::Read`/`io::Write` they travel inside an
//! `io::Error` and come back with [`XzError::from_io`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod check;
pub mod header;
pub mod index;
pub mod options;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod reader;
pub mod vli;
pub mod writer;

use std::io::{Read, Write};

pub use check::CheckType;
pub use header::{XZ_FOOTER_MAGIC, XZ_MAGIC};
pub use options::{ReaderConfig, XzOptions};
#[cfg(feature = "parallel")]
pub use parallel::compress_parallel;
pub use reader::XzReader;
pub use writer::XzWriter;

pub use oxixz_core::error::{ErrorKind, Result, XzError};

/// Compress `data` into a single XZ stream.
pub fn compress(data: &[u8], options: &XzOptions) -> Result<Vec<u8>> {
    let mut writer = XzWriter::new(Vec::with_capacity(data.len() / 2 + 64), options.clone())?;
    writer.write_all(data)?;
    writer.finish()
}

/// Decompress every XZ stream in `data`.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = XzReader::new(data);
    let mut output = Vec::new();
    reader.read_to_end(&mut output)?;
    Ok(output)
}
