//! CRC implementations used by the XZ container.
//!
//! - **CRC-32 (ISO 3309)**: stream header, block header, index and footer
//!   fields, and the optional CRC32 block check.
//! - **CRC-64/ECMA-182**: the default block check.
//!
//! Both use slicing-by-8 for inputs of 16 bytes or more and a single table
//! otherwise.

const CRC32_POLY: u32 = 0xEDB88320;
const CRC64_POLY: u64 = 0xC96C5795D7870F42;

/// Builds slicing-by-8 tables for a reflected polynomial; table 0 is the
/// classic bytewise table and table `t` advances table `t - 1` by one byte.
macro_rules! slicing_tables {
    ($ty:ty, $poly:expr) => {{
        let mut tables = [[0 as $ty; 256]; 8];
        let mut i = 0usize;
        while i < 256 {
            let mut crc = i as $ty;
            let mut bit = 0;
            while bit < 8 {
                let mask = (0 as $ty).wrapping_sub(crc & 1);
                crc = (crc >> 1) ^ ($poly & mask);
                bit += 1;
            }
            tables[0][i] = crc;
            i += 1;
        }

        let mut t = 1;
        while t < 8 {
            let mut i = 0usize;
            while i < 256 {
                let prev = tables[t - 1][i];
                tables[t][i] = tables[0][(prev & 0xFF) as usize] ^ (prev >> 8);
                i += 1;
            }
            t += 1;
        }
        tables
    }};
}

static CRC32_TABLES: [[u32; 256]; 8] = slicing_tables!(u32, CRC32_POLY);
static CRC64_TABLES: [[u64; 256]; 8] = slicing_tables!(u64, CRC64_POLY);

/// CRC-32 calculator (ISO 3309).
///
/// - Polynomial: 0x04C11DB7 (reflected: 0xEDB88320)
/// - Initial value and final XOR: 0xFFFFFFFF
///
/// # Example
///
/// ```
/// use oxixz_core::crc::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"Hello, World!");
/// assert_eq!(crc.finalize(), 0xEC4AC3D0);
/// ```
#[derive(Debug, Clone)]
pub struct Crc32 {
    crc: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self { crc: 0xFFFFFFFF }
    }

    /// Reset the CRC to its initial state.
    pub fn reset(&mut self) {
        self.crc = 0xFFFFFFFF;
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.crc = if data.len() >= 16 {
            crc32_slice8(self.crc, data)
        } else {
            crc32_bytewise(self.crc, data)
        };
    }

    /// Get the current CRC value (without finalizing).
    #[inline(always)]
    pub fn value(&self) -> u32 {
        self.crc ^ 0xFFFFFFFF
    }

    /// Finalize and return the CRC value.
    #[inline(always)]
    pub fn finalize(self) -> u32 {
        self.crc ^ 0xFFFFFFFF
    }

    /// Compute CRC-32 for a slice in one call.
    #[inline]
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn crc32_bytewise(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = CRC32_TABLES[0][((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

#[inline]
fn crc32_slice8(mut crc: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let lo = crc ^ u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        crc = CRC32_TABLES[7][(lo & 0xFF) as usize]
            ^ CRC32_TABLES[6][((lo >> 8) & 0xFF) as usize]
            ^ CRC32_TABLES[5][((lo >> 16) & 0xFF) as usize]
            ^ CRC32_TABLES[4][(lo >> 24) as usize]
            ^ CRC32_TABLES[3][chunk[4] as usize]
            ^ CRC32_TABLES[2][chunk[5] as usize]
            ^ CRC32_TABLES[1][chunk[6] as usize]
            ^ CRC32_TABLES[0][chunk[7] as usize];
    }
    crc32_bytewise(crc, chunks.remainder())
}

/// CRC-64/ECMA-182 calculator, as used by the XZ CRC64 check.
///
/// - Polynomial: 0x42F0E1EBA9EA3693 (reflected: 0xC96C5795D7870F42)
/// - Initial value and final XOR: 0xFFFFFFFFFFFFFFFF
///
/// # Example
///
/// ```
/// use oxixz_core::crc::Crc64;
///
/// let mut crc = Crc64::new();
/// crc.update(b"123456789");
/// assert_eq!(crc.finalize(), 0x995DC9BBDF1939FA);
/// ```
#[derive(Debug, Clone)]
pub struct Crc64 {
    crc: u64,
}

impl Crc64 {
    /// Create a new CRC-64 calculator.
    pub fn new() -> Self {
        Self {
            crc: 0xFFFFFFFFFFFFFFFF,
        }
    }

    /// Reset the CRC to its initial state.
    pub fn reset(&mut self) {
        self.crc = 0xFFFFFFFFFFFFFFFF;
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.crc = if data.len() >= 16 {
            crc64_slice8(self.crc, data)
        } else {
            crc64_bytewise(self.crc, data)
        };
    }

    /// Get the current CRC value (without finalizing).
    pub fn value(&self) -> u64 {
        self.crc ^ 0xFFFFFFFFFFFFFFFF
    }

    /// Finalize and return the CRC value.
    pub fn finalize(self) -> u64 {
        self.crc ^ 0xFFFFFFFFFFFFFFFF
    }

    /// Compute CRC-64 for a slice in one call.
    pub fn compute(data: &[u8]) -> u64 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc64 {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn crc64_bytewise(mut crc: u64, data: &[u8]) -> u64 {
    for &byte in data {
        crc = CRC64_TABLES[0][((crc ^ byte as u64) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

#[inline]
fn crc64_slice8(mut crc: u64, data: &[u8]) -> u64 {
    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let x = crc ^ u64::from_le_bytes(word);
        crc = CRC64_TABLES[7][(x & 0xFF) as usize]
            ^ CRC64_TABLES[6][((x >> 8) & 0xFF) as usize]
            ^ CRC64_TABLES[5][((x >> 16) & 0xFF) as usize]
            ^ CRC64_TABLES[4][((x >> 24) & 0xFF) as usize]
            ^ CRC64_TABLES[3][((x >> 32) & 0xFF) as usize]
            ^ CRC64_TABLES[2][((x >> 40) & 0xFF) as usize]
            ^ CRC64_TABLES[1][((x >> 48) & 0xFF) as usize]
            ^ CRC64_TABLES[0][(x >> 56) as usize];
    }
    crc64_bytewise(crc, chunks.remainder())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty() {
        assert_eq!(Crc32::compute(b""), 0x00000000);
    }

    #[test]
    fn test_crc32_check() {
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_crc32_incremental() {
        let mut crc = Crc32::new();
        crc.update(b"Hello");
        crc.update(b", ");
        crc.update(b"World!");
        assert_eq!(crc.finalize(), 0xEC4AC3D0);
    }

    #[test]
    fn test_crc32_stream_flags() {
        // CRC32 of the stream flags 00 04 (CRC64 check) as written by xz.
        assert_eq!(Crc32::compute(&[0x00, 0x04]), 0x46B4D6E6);
        assert_eq!(Crc32::compute(&[0x00, 0x01]), 0x36DE2269);
    }

    #[test]
    fn test_crc32_table_correctness() {
        assert_eq!(CRC32_TABLES[0][0], 0x00000000);
        assert_eq!(CRC32_TABLES[0][1], 0x77073096);
        assert_eq!(CRC32_TABLES[0][255], 0x2D02EF8D);
    }

    #[test]
    fn test_crc32_various_sizes() {
        for size in [1, 7, 8, 15, 16, 17, 31, 32, 63, 64, 127, 128, 255, 256] {
            let data: Vec<u8> = (0..size).map(|i| (i * 7 + size) as u8).collect();
            let mut bytewise = Crc32::new();
            for &byte in &data {
                bytewise.update(&[byte]);
            }
            assert_eq!(
                Crc32::compute(&data),
                bytewise.finalize(),
                "CRC mismatch for size {}",
                size
            );
        }
    }

    #[test]
    fn test_crc64_empty() {
        assert_eq!(Crc64::compute(b""), 0);
    }

    #[test]
    fn test_crc64_check() {
        assert_eq!(Crc64::compute(b"123456789"), 0x995DC9BBDF1939FA);
    }

    #[test]
    fn test_crc64_incremental() {
        let mut crc = Crc64::new();
        crc.update(b"12345");
        crc.update(b"6789");
        assert_eq!(crc.value(), 0x995DC9BBDF1939FA);
        crc.reset();
        crc.update(b"123456789");
        assert_eq!(crc.finalize(), 0x995DC9BBDF1939FA);
    }

    #[test]
    fn test_crc64_table_correctness() {
        assert_eq!(CRC64_TABLES[0][0], 0);
        assert_eq!(CRC64_TABLES[0][1], 0xB32E4CBE03A75F6F);
        for t in 1..8 {
            for i in 0..256 {
                let prev = CRC64_TABLES[t - 1][i];
                let expected = CRC64_TABLES[0][(prev & 0xFF) as usize] ^ (prev >> 8);
                assert_eq!(CRC64_TABLES[t][i], expected, "table {} entry {}", t, i);
            }
        }
    }

    #[test]
    fn test_crc64_large_data() {
        let data = vec![0x42u8; 1024];
        let mut chunked = Crc64::new();
        for chunk in data.chunks(17) {
            chunked.update(chunk);
        }
        assert_eq!(Crc64::compute(&data), chunked.finalize());
    }
}
