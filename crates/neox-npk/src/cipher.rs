//! Cipher layers used by NPK archives.
//!
//! Three independent layers exist:
//!
//! - the container stream of `EXPK` archives, a repeating-key XOR over the
//!   index block and every payload
//! - per-entry XOR schemes selected by the index row's encryption tag
//! - an RC4-encrypted index, selected by hash mode 3
//!
//! All XOR schemes derive the key byte from the position in the buffer only,
//! so applying a scheme twice restores the input.

use rc4::consts::U36;
use rc4::{KeyInit, Rc4, StreamCipher};
use thiserror::Error;
use tracing::trace;

use crate::{DecodeError, EncryptionMethod, FormatError};

/// Number of leading bytes covered by the keyed entry scheme and the
/// threshold above which windowed schemes pick a sub-range.
const XOR_WINDOW: usize = 0x80;

/// Fixed RC4 key for hash-mode-3 indices.
const INDEX_RC4_KEY: &[u8; 36] = b"61ea476e-8201-11e5-864b-fcaa147137b7";

/// Errors constructing a [`CipherKey`].
#[derive(Debug, Error)]
pub enum KeyError {
    /// Keys must contain at least one byte.
    #[error("cipher key must not be empty")]
    Empty,

    /// Hex string could not be decoded.
    #[error("invalid hex key: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// An externally supplied XOR key.
///
/// The key is owned by the caller and lent to each decode call; archives and
/// descriptors never store it.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey {
    bytes: Vec<u8>,
}

impl CipherKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, KeyError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self { bytes })
    }

    /// Parse a hex-encoded key such as `"96a0ff"`.
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        Self::new(hex::decode(text.trim())?)
    }

    /// Expand a single-byte engine key into its 255-byte stream.
    ///
    /// The engine keys entries with one integer; the byte at position `i` is
    /// `(seed + i) mod 256`, repeating every 255 bytes.
    pub fn from_seed(seed: u8) -> Self {
        Self {
            bytes: (0u8..0xFF).map(|i| seed.wrapping_add(i)).collect(),
        }
    }

    /// Raw key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty keys are rejected at construction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// XOR `data` with `key`, treating `data[0]` as stream position `start`.
pub fn xor_in_place(data: &mut [u8], key: &CipherKey, start: usize) {
    let key = key.as_bytes();
    let len = key.len();
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[(start + i) % len];
    }
}

/// Remove an entry-level cipher in place.
///
/// `crc` and `original_len` come from the index row; the windowed schemes
/// derive their key and range from them.
pub fn decrypt_entry(
    data: &mut [u8],
    method: EncryptionMethod,
    crc: u32,
    original_len: u32,
    key: Option<&CipherKey>,
) -> Result<(), DecodeError> {
    match method {
        EncryptionMethod::None => {}
        EncryptionMethod::KeyedXor => {
            let key = key.ok_or(DecodeError::MissingKey)?;
            let end = data.len().min(XOR_WINDOW);
            xor_in_place(&mut data[..end], key, 0);
        }
        EncryptionMethod::CrcXor => crc_xor(data, crc, original_len),
        EncryptionMethod::IncrementalXor => incremental_xor(data, crc, original_len),
        EncryptionMethod::Unknown(tag) => return Err(DecodeError::UnsupportedEncryption(tag)),
    }
    trace!(method = method.name(), len = data.len(), "entry cipher removed");
    Ok(())
}

/// Clamp a `(start, size)` window to the buffer.
fn window(len: usize, start: usize, size: usize) -> std::ops::Range<usize> {
    let start = start.min(len);
    start..start.saturating_add(size).min(len)
}

fn crc_xor(data: &mut [u8], crc: u32, original_len: u32) {
    let base = crc ^ original_len;
    let len = data.len();
    let range = if len > XOR_WINDOW {
        let start = (crc >> 1) as usize % (len - XOR_WINDOW);
        let size = ((2 * original_len as u64) % 0x60 + 0x20) as usize;
        window(len, start, size)
    } else {
        0..len
    };

    for (j, byte) in data[range].iter_mut().enumerate() {
        *byte ^= ((j % XOR_WINDOW) as u32).wrapping_add(base) as u8;
    }
}

fn incremental_xor(data: &mut [u8], crc: u32, original_len: u32) {
    let mut key = ((original_len ^ crc) & 0xFF) as u8;
    let len = data.len();
    let range = if len > XOR_WINDOW {
        let start = (original_len >> 1) as usize % (len - XOR_WINDOW);
        let size = ((crc << 1) % 0x60 + 0x20) as usize;
        window(len, start, size)
    } else {
        0..len
    };

    for byte in &mut data[range] {
        *byte ^= key;
        key = key.wrapping_add(1);
    }
}

/// Decrypt an RC4-encrypted index block in place.
pub fn decrypt_index(data: &mut [u8]) -> Result<(), FormatError> {
    let mut cipher: Rc4<U36> = Rc4::new_from_slice(INDEX_RC4_KEY)
        .map_err(|_| FormatError::IndexCipher("failed to create RC4 cipher".to_string()))?;
    cipher.apply_keystream(data);
    trace!(len = data.len(), "index RC4 layer removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_key_from_seed() {
        let key = CipherKey::from_seed(0x96);
        assert_eq!(key.len(), 255);
        assert_eq!(key.as_bytes()[0], 0x96);
        assert_eq!(key.as_bytes()[1], 0x97);
        assert_eq!(key.as_bytes()[0x6A], 0x00);
    }

    #[test]
    fn test_key_from_hex() {
        let key = CipherKey::from_hex("01ff").unwrap();
        assert_eq!(key.as_bytes(), &[0x01, 0xFF]);
        assert!(matches!(CipherKey::from_hex("zz"), Err(KeyError::Hex(_))));
        assert!(matches!(CipherKey::from_hex(""), Err(KeyError::Empty)));
    }

    #[test]
    fn test_xor_involution() {
        let key = CipherKey::new(vec![0x11, 0x22, 0x33]).unwrap();
        let original = sample(100);
        let mut data = original.clone();

        xor_in_place(&mut data, &key, 5);
        assert_ne!(data, original);
        xor_in_place(&mut data, &key, 5);
        assert_eq!(data, original);
    }

    #[test]
    fn test_xor_position_not_content() {
        let key = CipherKey::new(vec![0xAA, 0x55]).unwrap();
        let mut zeros = vec![0u8; 4];
        xor_in_place(&mut zeros, &key, 1);
        assert_eq!(zeros, vec![0x55, 0xAA, 0x55, 0xAA]);
    }

    #[test]
    fn test_keyed_xor_touches_first_window_only() {
        let key = CipherKey::from_seed(1);
        let original = sample(300);
        let mut data = original.clone();

        decrypt_entry(&mut data, EncryptionMethod::KeyedXor, 0, 300, Some(&key)).unwrap();
        assert_ne!(data[..0x80], original[..0x80]);
        assert_eq!(data[0x80..], original[0x80..]);
    }

    #[test]
    fn test_keyed_xor_requires_key() {
        let mut data = sample(16);
        let result = decrypt_entry(&mut data, EncryptionMethod::KeyedXor, 0, 16, None);
        assert!(matches!(result, Err(DecodeError::MissingKey)));
    }

    #[test]
    fn test_crc_xor_small_payload() {
        let original = sample(16);
        let mut data = original.clone();
        decrypt_entry(&mut data, EncryptionMethod::CrcXor, 0x10, 0x03, None).unwrap();

        // base = 0x10 ^ 0x03 = 0x13, key byte j = j + 0x13
        for (j, (&plain, &out)) in original.iter().zip(&data).enumerate() {
            assert_eq!(out, plain ^ (j as u8 + 0x13));
        }
    }

    #[test]
    fn test_windowed_schemes_are_involutions() {
        for method in [EncryptionMethod::CrcXor, EncryptionMethod::IncrementalXor] {
            for len in [0usize, 1, 0x80, 0x81, 0x200, 0x1000] {
                let original = sample(len);
                let mut data = original.clone();
                decrypt_entry(&mut data, method, 0xCAFE_BABE, len as u32, None).unwrap();
                decrypt_entry(&mut data, method, 0xCAFE_BABE, len as u32, None).unwrap();
                assert_eq!(data, original, "{method:?} len {len}");
            }
        }
    }

    #[test]
    fn test_incremental_xor_window() {
        let len = 0x200usize;
        let crc = 0x0000_0010u32;
        let original_len = 0x100u32;
        let mut data = vec![0u8; len];
        decrypt_entry(&mut data, EncryptionMethod::IncrementalXor, crc, original_len, None)
            .unwrap();

        // start = (0x100 >> 1) % 0x180 = 0x80, size = 0x20 % 0x60 + 0x20 = 0x40
        let start = 0x80;
        let key0 = ((original_len ^ crc) & 0xFF) as u8;
        assert!(data[..start].iter().all(|&b| b == 0));
        assert_eq!(data[start], key0);
        assert_eq!(data[start + 1], key0.wrapping_add(1));
        assert_eq!(data[start + 0x3F], key0.wrapping_add(0x3F));
        assert!(data[start + 0x40..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unknown_encryption_rejected() {
        let mut data = sample(8);
        let result = decrypt_entry(&mut data, EncryptionMethod::Unknown(9), 0, 8, None);
        assert!(matches!(result, Err(DecodeError::UnsupportedEncryption(9))));
    }

    #[test]
    fn test_rc4_index_roundtrip() {
        let original = sample(56);
        let mut data = original.clone();
        decrypt_index(&mut data).unwrap();
        assert_ne!(data, original);
        decrypt_index(&mut data).unwrap();
        assert_eq!(data, original);
    }
}
