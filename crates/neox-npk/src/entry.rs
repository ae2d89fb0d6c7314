//! NPK index rows.

use std::borrow::Cow;

use neox_common::BinaryReader;

/// Compression methods found in NPK index rows.
///
/// Tags the reader does not know are preserved so they can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// No compression (stored).
    Store,
    /// zlib stream.
    Zlib,
    /// Raw LZ4 block; the decoded size comes from the index row.
    Lz4,
    /// Zstandard frame.
    Zstd,
    /// Unrecognised tag.
    Unknown(u16),
}

impl CompressionMethod {
    /// Canonical tag for this method. The LZ4 alias 5 reports as 2.
    pub fn tag(self) -> u16 {
        match self {
            Self::Store => 0,
            Self::Zlib => 1,
            Self::Lz4 => 2,
            Self::Zstd => 3,
            Self::Unknown(tag) => tag,
        }
    }

    /// Short lowercase name for listings.
    pub fn name(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Zlib => "zlib",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Store,
            1 => Self::Zlib,
            2 | 5 => Self::Lz4,
            3 => Self::Zstd,
            other => Self::Unknown(other),
        }
    }
}

/// Per-entry encryption schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionMethod {
    /// Plain payload.
    None,
    /// First 0x80 bytes XORed with the supplied key.
    KeyedXor,
    /// A window XORed with a key derived from the CRC and original length.
    CrcXor,
    /// A window XORed with an incrementing single-byte key.
    IncrementalXor,
    /// Unrecognised tag.
    Unknown(u16),
}

impl EncryptionMethod {
    /// Canonical tag for this method. The CRC XOR alias 3 reports as 2.
    pub fn tag(self) -> u16 {
        match self {
            Self::None => 0,
            Self::KeyedXor => 1,
            Self::CrcXor => 2,
            Self::IncrementalXor => 4,
            Self::Unknown(tag) => tag,
        }
    }

    /// Short lowercase name for listings.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::KeyedXor => "xor",
            Self::CrcXor => "crc-xor",
            Self::IncrementalXor => "inc-xor",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<u16> for EncryptionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::KeyedXor,
            2 | 3 => Self::CrcXor,
            4 => Self::IncrementalXor,
            other => Self::Unknown(other),
        }
    }
}

/// Index row width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowWidth {
    /// 28-byte rows with a 32-bit signature.
    Standard,
    /// 32-byte rows with a 64-bit signature.
    Wide,
}

impl RowWidth {
    /// Row size in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Standard => 28,
            Self::Wide => 32,
        }
    }
}

/// Metadata for one archive entry.
///
/// Descriptors never own payload bytes; they only locate them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Row number in the index
    pub index: usize,
    /// File signature (path hash)
    pub signature: u64,
    /// Absolute payload offset
    pub offset: u32,
    /// Stored (compressed/encrypted) length
    pub stored_len: u32,
    /// Decoded length
    pub original_len: u32,
    /// CRC-32 of the stored bytes
    pub zcrc: u32,
    /// CRC-32 of the decoded bytes, zero when absent
    pub crc: u32,
    pub compression: CompressionMethod,
    pub encryption: EncryptionMethod,
    /// Whether the payload carries the container cipher layer
    pub sealed: bool,
    /// Name from the archive's name table, if any
    pub name: Option<String>,
}

impl EntryDescriptor {
    /// Parse one index row.
    pub(crate) fn read_row(
        reader: &mut BinaryReader<'_>,
        index: usize,
        width: RowWidth,
        sealed: bool,
    ) -> neox_common::Result<Self> {
        let signature = match width {
            RowWidth::Standard => reader.read_u32()? as u64,
            RowWidth::Wide => reader.read_u64()?,
        };

        Ok(Self {
            index,
            signature,
            offset: reader.read_u32()?,
            stored_len: reader.read_u32()?,
            original_len: reader.read_u32()?,
            zcrc: reader.read_u32()?,
            crc: reader.read_u32()?,
            compression: reader.read_u16()?.into(),
            encryption: reader.read_u16()?.into(),
            sealed,
            name: None,
        })
    }

    /// One past the last payload byte.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.stored_len as u64
    }

    /// Whether the payload needs decompression.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compression != CompressionMethod::Store
    }

    /// Whether the payload carries any cipher layer.
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.sealed || self.encryption != EncryptionMethod::None
    }

    /// Name from the name table, or the hex signature.
    pub fn display_name(&self) -> Cow<'_, str> {
        match &self.name {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("{:08x}", self.signature)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(signature: u32, zip: u16, enc: u16) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [signature, 64, 10, 12, 0xAAAA, 0xBBBB] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&zip.to_le_bytes());
        out.extend_from_slice(&enc.to_le_bytes());
        out
    }

    #[test]
    fn test_read_standard_row() {
        let data = row(0xDEADBEEF, 1, 0);
        assert_eq!(data.len(), RowWidth::Standard.size());

        let mut reader = BinaryReader::new(&data);
        let entry = EntryDescriptor::read_row(&mut reader, 7, RowWidth::Standard, false).unwrap();

        assert_eq!(entry.index, 7);
        assert_eq!(entry.signature, 0xDEADBEEF);
        assert_eq!(entry.offset, 64);
        assert_eq!(entry.stored_len, 10);
        assert_eq!(entry.original_len, 12);
        assert_eq!(entry.zcrc, 0xAAAA);
        assert_eq!(entry.crc, 0xBBBB);
        assert_eq!(entry.compression, CompressionMethod::Zlib);
        assert_eq!(entry.encryption, EncryptionMethod::None);
        assert_eq!(entry.end(), 74);
        assert_eq!(entry.display_name(), "deadbeef");
    }

    #[test]
    fn test_read_wide_row() {
        let mut data = 0x0123_4567_89AB_CDEFu64.to_le_bytes().to_vec();
        data.extend_from_slice(&row(0, 0, 0)[4..]);
        assert_eq!(data.len(), RowWidth::Wide.size());

        let mut reader = BinaryReader::new(&data);
        let entry = EntryDescriptor::read_row(&mut reader, 0, RowWidth::Wide, false).unwrap();
        assert_eq!(entry.signature, 0x0123_4567_89AB_CDEF);
        assert_eq!(entry.offset, 64);
    }

    #[test]
    fn test_method_aliases() {
        assert_eq!(CompressionMethod::from(5), CompressionMethod::Lz4);
        assert_eq!(EncryptionMethod::from(3), EncryptionMethod::CrcXor);
        assert_eq!(CompressionMethod::from(5).tag(), 2);
        assert_eq!(EncryptionMethod::from(3).tag(), 2);
    }

    #[test]
    fn test_unknown_tags_preserved() {
        assert_eq!(CompressionMethod::from(9), CompressionMethod::Unknown(9));
        assert_eq!(CompressionMethod::Unknown(9).tag(), 9);
        assert_eq!(EncryptionMethod::from(77), EncryptionMethod::Unknown(77));
        assert_eq!(EncryptionMethod::Unknown(77).tag(), 77);
    }

    #[test]
    fn test_display_name_prefers_table_name() {
        let data = row(1, 0, 0);
        let mut reader = BinaryReader::new(&data);
        let mut entry =
            EntryDescriptor::read_row(&mut reader, 0, RowWidth::Standard, false).unwrap();
        entry.name = Some("ui/icon.png".into());
        assert_eq!(entry.display_name(), "ui/icon.png");
    }
}
