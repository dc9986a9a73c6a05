//! Block-parallel compression (requires the `parallel` feature).

use rayon::prelude::*;

use crate::block::encode_block;
use crate::header::{StreamFlags, StreamFooter, StreamHeader};
use crate::index::{Index, IndexRecord};
use crate::options::XzOptions;
use oxixz_core::error::Result;
use tracing::debug;

/// Compress `data` into one XZ stream, encoding blocks on the rayon pool.
///
/// The input is split at the configured block size and every block gets its
/// own LZMA2 encoder. The output is byte-identical to [`crate::compress`]
/// with the same options.
pub fn compress_parallel(data: &[u8], options: &XzOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let flags = StreamFlags::new(options.check);
    let block_size = usize::try_from(options.effective_block_size()).unwrap_or(usize::MAX);
    let config = options.lzma2_config();

    let blocks: Vec<(Vec<u8>, IndexRecord)> = data
        .par_chunks(block_size)
        .map(|chunk| encode_block(chunk, config.clone(), options.check))
        .collect::<Result<_>>()?;
    debug!(blocks = blocks.len(), "xz blocks compressed in parallel");

    let body: usize = blocks.iter().map(|(bytes, _)| bytes.len()).sum();
    let mut output = Vec::with_capacity(body + 64);
    output.extend_from_slice(&StreamHeader::new(flags).encode());

    let mut index = Index::new();
    for (bytes, record) in blocks {
        output.extend_from_slice(&bytes);
        index.push(record);
    }

    let index_bytes = index.encode();
    output.extend_from_slice(&index_bytes);
    output.extend_from_slice(&StreamFooter::new(flags, index_bytes.len() as u64).encode());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compress, decompress};

    #[test]
    fn test_matches_sequential_output() {
        let mut data = Vec::new();
        for i in 0..20_000u32 {
            data.extend_from_slice(format!("line {} of parallel input\n", i % 977).as_bytes());
        }
        let options = XzOptions::default().dict_size(1 << 16).block_size(100_000);

        let parallel = compress_parallel(&data, &options).unwrap();
        let sequential = compress(&data, &options).unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(decompress(&parallel).unwrap(), data);
    }

    #[test]
    fn test_empty_input() {
        let packed = compress_parallel(b"", &XzOptions::default()).unwrap();
        assert_eq!(packed.len(), 32);
        assert!(decompress(&packed).unwrap().is_empty());
    }
}
