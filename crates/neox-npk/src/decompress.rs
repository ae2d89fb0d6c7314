//! Decompression for NPK entry payloads.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::{CodecError, CompressionMethod};

/// Decompress `data` with the given method.
///
/// `expected_len` is the decoded size from the index row. Stream decoders
/// stop one byte past it so oversized payloads are caught by the caller's
/// length check instead of being inflated in full.
pub fn decompress(
    method: CompressionMethod,
    data: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, CodecError> {
    match method {
        CompressionMethod::Store => Ok(data.to_vec()),
        CompressionMethod::Zlib => decompress_zlib(data, expected_len),
        CompressionMethod::Lz4 => decompress_lz4(data, expected_len),
        CompressionMethod::Zstd => decompress_zstd(data, expected_len),
        CompressionMethod::Unknown(tag) => Err(CodecError::Unsupported(tag)),
    }
}

fn read_bounded<R: Read>(
    reader: R,
    expected_len: usize,
    method: &'static str,
) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::with_capacity(expected_len);
    reader
        .take(expected_len as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| CodecError::Corrupt {
            method,
            message: e.to_string(),
        })?;
    Ok(output)
}

/// Decompress a zlib stream.
pub fn decompress_zlib(data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
    read_bounded(ZlibDecoder::new(data), expected_len, "zlib")
}

/// Decompress a Zstandard frame.
pub fn decompress_zstd(data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
    let decoder = zstd::Decoder::new(data).map_err(|e| CodecError::Corrupt {
        method: "zstd",
        message: e.to_string(),
    })?;
    read_bounded(decoder, expected_len, "zstd")
}

/// Decompress a raw LZ4 block of known decoded size.
pub fn decompress_lz4(data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
    lz4_flex::block::decompress(data, expected_len).map_err(|e| CodecError::Corrupt {
        method: "lz4",
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"Hello, NeoX! Hello, NeoX! Hello, NeoX! This is a compression test.";

    #[test]
    fn test_store_is_identity() {
        let out = decompress(CompressionMethod::Store, TEXT, TEXT.len()).unwrap();
        assert_eq!(out, TEXT);
    }

    #[test]
    fn test_zlib() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(TEXT).unwrap();
        let compressed = encoder.finish().unwrap();

        let out = decompress(CompressionMethod::Zlib, &compressed, TEXT.len()).unwrap();
        assert_eq!(out, TEXT);
    }

    #[test]
    fn test_zstd() {
        let compressed = zstd::encode_all(TEXT, 3).unwrap();
        let out = decompress(CompressionMethod::Zstd, &compressed, TEXT.len()).unwrap();
        assert_eq!(out, TEXT);
    }

    #[test]
    fn test_lz4_block() {
        let compressed = lz4_flex::block::compress(TEXT);
        let out = decompress(CompressionMethod::Lz4, &compressed, TEXT.len()).unwrap();
        assert_eq!(out, TEXT);
    }

    #[test]
    fn test_oversized_stream_is_bounded() {
        let big = vec![0u8; 10_000];
        let compressed = zstd::encode_all(&big[..], 3).unwrap();
        let out = decompress(CompressionMethod::Zstd, &compressed, 100).unwrap();
        assert_eq!(out.len(), 101);
    }

    #[test]
    fn test_corrupt_zlib() {
        let result = decompress(CompressionMethod::Zlib, b"not zlib at all", 32);
        assert!(matches!(result, Err(CodecError::Corrupt { method: "zlib", .. })));
    }

    #[test]
    fn test_unknown_method() {
        let result = decompress(CompressionMethod::Unknown(42), TEXT, TEXT.len());
        assert!(matches!(result, Err(CodecError::Unsupported(42))));
    }
}
