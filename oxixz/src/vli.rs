//! Variable-length integers.
//!
//! Little-endian groups of 7 bits; the high bit of each byte says another
//! byte follows. At most 9 bytes, so values stay below 2^63, and the last
//! byte of a multi-byte encoding may not be zero.

use oxixz_core::error::{Result, XzError};

/// Maximum encoded length in bytes.
pub const VLI_BYTES_MAX: usize = 9;

/// Largest encodable value.
pub const VLI_MAX: u64 = u64::MAX / 2;

/// Number of bytes `value` encodes to.
pub fn encoded_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Append the encoding of `value` to `out`.
pub fn write_vli(mut value: u64, out: &mut Vec<u8>) {
    debug_assert!(value <= VLI_MAX);
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Decode a VLI, pulling bytes from `next_byte`.
pub fn decode_vli_with<F>(mut next_byte: F) -> Result<u64>
where
    F: FnMut() -> Result<u8>,
{
    let mut value = 0u64;
    for i in 0..VLI_BYTES_MAX {
        let byte = next_byte()?;
        value |= u64::from(byte & 0x7F) << (i * 7);

        if byte & 0x80 == 0 {
            if i > 0 && byte == 0 {
                return Err(XzError::invalid_header("non-minimal variable-length integer"));
            }
            return Ok(value);
        }
    }
    Err(XzError::invalid_header("variable-length integer longer than 9 bytes"))
}

/// Decode a VLI from `input` at `*pos`, advancing `pos`.
///
/// Running off the end of `input` is a format error: callers use this on
/// fields whose total length is already known.
pub fn read_vli(input: &[u8], pos: &mut usize) -> Result<u64> {
    decode_vli_with(|| {
        let byte = *input
            .get(*pos)
            .ok_or_else(|| XzError::invalid_header("variable-length integer overruns field"))?;
        *pos += 1;
        Ok(byte)
    })
}
