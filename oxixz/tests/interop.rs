//! Decoding streams produced by the reference `xz` tool.

use std::io::{Read, Write};
use std::process::{Command, Stdio};

use oxixz::{CheckType, ReaderConfig, XzOptions, XzReader, compress, decompress};

const LOREM: &[u8] = include_bytes!("data/lorem.txt");
const WORDS: &[u8] = include_bytes!("data/words.txt");

#[test]
fn test_hello_default_preset() {
    let packed = include_bytes!("data/hello.xz");
    assert_eq!(decompress(packed).unwrap(), b"Hello world");
}

#[test]
fn test_crc32_check() {
    let packed = include_bytes!("data/lorem_crc32.xz");
    assert_eq!(packed[7], CheckType::Crc32.id());
    assert_eq!(decompress(packed).unwrap(), LOREM);
}

#[test]
fn test_crc64_check() {
    let packed = include_bytes!("data/lorem_crc64.xz");
    assert_eq!(decompress(packed).unwrap(), LOREM);
}

#[test]
fn test_sha256_check() {
    let packed = include_bytes!("data/lorem_sha256.xz");
    assert_eq!(packed[7], CheckType::Sha256.id());
    assert_eq!(decompress(packed).unwrap(), LOREM);
}

#[test]
fn test_no_check() {
    let packed = include_bytes!("data/lorem_none.xz");
    assert_eq!(packed[7], CheckType::None.id());
    assert_eq!(decompress(packed).unwrap(), LOREM);
}

#[test]
fn test_multiple_blocks() {
    let packed = include_bytes!("data/lorem_blocks.xz");
    assert_eq!(decompress(packed).unwrap(), LOREM);
}

#[test]
fn test_sizes_in_block_headers() {
    // Written by the multi-threaded encoder, which stores both sizes.
    let packed = include_bytes!("data/lorem_sized.xz");
    assert_eq!(decompress(packed).unwrap(), LOREM);
}

#[test]
fn test_multiple_lzma_chunks() {
    let packed = include_bytes!("data/words.xz");
    assert_eq!(decompress(packed).unwrap(), WORDS);
}

#[test]
fn test_concatenated_with_padding() {
    let packed = include_bytes!("data/concat.xz");
    let mut expected = b"Hello world".to_vec();
    expected.extend_from_slice(LOREM);
    assert_eq!(decompress(packed).unwrap(), expected);

    let mut reader = XzReader::with_config(&packed[..], ReaderConfig::default().single_stream(true));
    let mut first = Vec::new();
    reader.read_to_end(&mut first).unwrap();
    assert_eq!(first, b"Hello world");
}

#[test]
fn test_hello_world_bytes_match_xz() {
    let packed = compress(b"Hello world", &XzOptions::default()).unwrap();
    assert_eq!(&packed[..], &include_bytes!("data/hello.xz")[..]);
}

/// Pipe our output through the system `xz`, when one is installed.
fn system_xz_decompress(packed: &[u8]) -> Option<Vec<u8>> {
    let mut child = Command::new("xz")
        .args(["-dc"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let mut stdin = child.stdin.take()?;
    let input = packed.to_vec();
    let feeder = std::thread::spawn(move || stdin.write_all(&input));
    let output = child.wait_with_output().ok()?;
    feeder.join().ok()?.ok()?;

    assert!(output.status.success(), "xz rejected our stream");
    Some(output.stdout)
}

#[test]
fn test_system_xz_accepts_output() {
    for options in [
        XzOptions::default(),
        XzOptions::default().check(CheckType::Sha256).level(1),
        XzOptions::default()
            .check(CheckType::None)
            .dict_size(1 << 16)
            .block_size(50_000),
        XzOptions::default().lc(0).lp(2).pb(0),
    ] {
        let packed = compress(WORDS, &options).unwrap();
        let Some(unpacked) = system_xz_decompress(&packed) else {
            return;
        };
        assert_eq!(unpacked, WORDS, "{options:?}");
    }
}
