//! # OxiXZ Core
//!
//! Core components shared by the OxiXZ codec crates.
//!
//! - [`crc`]: CRC-32 and CRC-64 checksums
//! - [`window`]: Sliding dictionary window for LZMA decompression
//! - [`error`]: Error types and the error taxonomy
//!
//! ## Architecture
//!
//! OxiXZ is designed as a layered protocol stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Container (oxixz)                                   │
//! │     Stream header, blocks, index, footer, Read/Write    │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec (oxixz-lzma)                                  │
//! │     Range coder, LZMA model, LZMA2 chunks               │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Core (this crate)                                   │
//! │     Window, CRC, errors                                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxixz_core::crc::{Crc32, Crc64};
//! use oxixz_core::window::Window;
//!
//! let mut window = Window::new(4096);
//! window.put(b'a');
//! window.copy_match(1, 3).unwrap();
//!
//! let mut out = [0u8; 4];
//! assert_eq!(window.drain(&mut out), 4);
//! assert_eq!(&out, b"aaaa");
//!
//! assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
//! assert_eq!(Crc64::compute(b"123456789"), 0x995DC9BBDF1939FA);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crc;
pub mod error;
pub mod window;

pub use crc::{Crc32, Crc64};
pub use error::{ErrorKind, Result, XzError};
pub use window::Window;
