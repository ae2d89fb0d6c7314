//! Error types for the NPK crate.
//!
//! Errors are split by blast radius: a [`FormatError`] means the archive as a
//! whole cannot be read, while [`DecodeError`] and [`CodecError`] only affect a
//! single entry and leave the rest of the catalog usable.

use thiserror::Error;

use crate::Wrapping;

/// Archive-level failures raised while opening a catalog.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Buffer is too short to hold the fixed header.
    #[error("truncated header: need {needed} bytes, buffer has {len}")]
    TruncatedHeader { needed: usize, len: usize },

    /// Unknown container signature.
    #[error("bad archive signature: {0:02x?}")]
    BadSignature([u8; 4]),

    /// The index table runs past the end of the buffer.
    #[error("truncated index: {count} rows of {row_width} bytes at offset {offset:#x} exceed buffer length {len}")]
    TruncatedIndex {
        offset: u64,
        count: u32,
        row_width: usize,
        len: usize,
    },

    /// Container-encrypted archive opened without a key.
    #[error("archive index is encrypted and no key was supplied")]
    MissingArchiveKey,

    /// The fixed index cipher could not be initialised.
    #[error("index cipher error: {0}")]
    IndexCipher(String),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] neox_common::Error),
}

/// Per-entry failures raised while materializing a payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The entry's byte range lies outside the archive buffer.
    #[error("entry data out of bounds: {offset:#x}+{len} exceeds buffer length {buffer_len}")]
    OutOfBounds {
        offset: u32,
        len: u32,
        buffer_len: usize,
    },

    /// The entry is encrypted and no key was supplied.
    #[error("entry is encrypted and no key was supplied")]
    MissingKey,

    /// Encryption tag this reader does not understand.
    #[error("unsupported encryption method: {0}")]
    UnsupportedEncryption(u16),

    /// Decompression failed.
    #[error("{0}")]
    Codec(#[from] CodecError),

    /// Decoded length disagrees with the index row.
    #[error("decoded size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u32, actual: usize },
}

/// Compression codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Compression tag this reader does not understand.
    #[error("unsupported compression method: {0}")]
    Unsupported(u16),

    /// The compressed stream is malformed.
    #[error("{method} decompression error: {message}")]
    Corrupt {
        method: &'static str,
        message: String,
    },
}

/// Failures removing a script wrapper from a decoded payload.
#[derive(Debug, Error)]
pub enum UnwrapError {
    /// Wrapper that is recognised but cannot be removed.
    #[error("{} payloads are not unpacked", .0.name())]
    Unsupported(Wrapping),

    /// The ROTOR body did not inflate.
    #[error("rotor inflate error: {0}")]
    Inflate(#[from] std::io::Error),

    /// The ROTOR body inflated past the expansion limit.
    #[error("rotor payload inflates past {limit} bytes")]
    TooLarge { limit: u64 },

    /// NXS3 payload too short for its header and key block.
    #[error("truncated nxs3 payload: {len} bytes")]
    Truncated { len: usize },

    /// The NXS3 key block did not verify against the public key.
    #[error("nxs3 key block: {0}")]
    KeyBlock(&'static str),

    /// The embedded NXS3 public key did not parse.
    #[error("nxs3 public key: {0}")]
    PublicKey(String),
}

/// Result type for archive-level operations.
pub type Result<T> = std::result::Result<T, FormatError>;
