//! Compress/decompress round trips through the public API.

use std::io::{Read, Write};

use oxixz::{CheckType, XzOptions, XzReader, XzWriter, compress, decompress};
use proptest::prelude::*;

fn text(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut i = 0u32;
    while out.len() < len {
        out.extend_from_slice(format!("record {} says {} ", i, i.wrapping_mul(2654435761) % 97).as_bytes());
        i += 1;
    }
    out.truncate(len);
    out
}

fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect()
}

#[test]
fn test_empty_input() {
    let packed = compress(b"", &XzOptions::default()).unwrap();
    assert_eq!(packed.len(), 32);
    assert_eq!(decompress(&packed).unwrap(), b"");
}

#[test]
fn test_single_byte() {
    let packed = compress(b"A", &XzOptions::default()).unwrap();
    assert_eq!(decompress(&packed).unwrap(), b"A");
}

#[test]
fn test_short_repeats() {
    let input = b"abcdeabcdeXYZ".repeat(4);
    let packed = compress(&input, &XzOptions::default()).unwrap();
    assert_eq!(decompress(&packed).unwrap(), input);
}

#[test]
fn test_all_zeros_compresses_well() {
    let input = vec![0u8; 100_000];
    let packed = compress(&input, &XzOptions::default()).unwrap();
    assert!(packed.len() < 1000);
    assert_eq!(decompress(&packed).unwrap(), input);
}

#[test]
fn test_incompressible_input() {
    let input = noise(200_000, 99);
    let packed = compress(&input, &XzOptions::default()).unwrap();
    // Stored chunks cost three bytes per 64 KiB plus the container.
    assert!(packed.len() < input.len() + 200);
    assert_eq!(decompress(&packed).unwrap(), input);
}

#[test]
fn test_every_level() {
    let input = text(30_000);
    for level in 0..=9 {
        let options = XzOptions::default().level(level).dict_size(1 << 16);
        let packed = compress(&input, &options).unwrap();
        assert!(packed.len() < input.len() / 2, "level {level}");
        assert_eq!(decompress(&packed).unwrap(), input, "level {level}");
    }
}

#[test]
fn test_literal_context_settings() {
    let input = text(20_000);
    for (lc, lp, pb) in [(0, 0, 0), (4, 0, 4), (0, 4, 2), (1, 3, 1), (2, 2, 0)] {
        let options = XzOptions::default().lc(lc).lp(lp).pb(pb).dict_size(1 << 16);
        let packed = compress(&input, &options).unwrap();
        assert_eq!(decompress(&packed).unwrap(), input, "lc={lc} lp={lp} pb={pb}");
    }
}

#[test]
fn test_beyond_one_chunk() {
    // More than 2 MiB forces several LZMA chunks inside one block.
    let mut input = text(1 << 20);
    input.extend_from_slice(&noise(600_000, 3));
    input.extend_from_slice(&text(1 << 20));
    let options = XzOptions::default().level(1).dict_size(1 << 20).block_size(1 << 24);
    let packed = compress(&input, &options).unwrap();
    assert_eq!(decompress(&packed).unwrap(), input);
}

#[test]
fn test_small_blocks() {
    let input = text(50_000);
    let options = XzOptions::default().dict_size(1 << 16).block_size(1000);
    let packed = compress(&input, &options).unwrap();
    assert_eq!(decompress(&packed).unwrap(), input);
}

#[test]
fn test_split_writes_give_identical_output() {
    let input = text(80_000);
    let options = XzOptions::default().dict_size(1 << 16).check(CheckType::Crc32);
    let whole = compress(&input, &options).unwrap();

    let mut writer = XzWriter::new(Vec::new(), options).unwrap();
    for piece in input.chunks(777) {
        writer.write_all(piece).unwrap();
    }
    assert_eq!(writer.finish().unwrap(), whole);
}

#[test]
fn test_concatenated_streams() {
    let first = text(5_000);
    let second = noise(3_000, 5);
    let mut packed = compress(&first, &XzOptions::default().check(CheckType::Sha256)).unwrap();
    packed.extend_from_slice(&[0u8; 12]);
    packed.extend_from_slice(&compress(&second, &XzOptions::default().check(CheckType::None)).unwrap());
    packed.extend_from_slice(&[0u8; 4]);

    let mut expected = first;
    expected.extend_from_slice(&second);
    assert_eq!(decompress(&packed).unwrap(), expected);
}

#[test]
fn test_reader_into_small_buffers() {
    let input = text(40_000);
    let packed = compress(&input, &XzOptions::default().block_size(9_999)).unwrap();
    let mut reader = XzReader::new(&packed[..]);
    let mut out = Vec::new();
    let mut buf = [0u8; 1];
    while reader.read(&mut buf).unwrap() == 1 {
        out.push(buf[0]);
    }
    assert_eq!(out, input);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let packed = compress(&data, &XzOptions::default().dict_size(1 << 16)).unwrap();
        prop_assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn prop_roundtrip_low_entropy(
        data in proptest::collection::vec(0u8..4, 0..20_000),
        block_size in 500u64..8_000,
    ) {
        let options = XzOptions::default().dict_size(1 << 16).block_size(block_size);
        let packed = compress(&data, &options).unwrap();
        prop_assert_eq!(decompress(&packed).unwrap(), data);
    }
}
